//! Device handle adapter.
//!
//! A [`Device`] is a non-owning reference to a native device: an identity
//! token plus a lazily resolved display name. Programs store devices by
//! value and compare them by identity only.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use crate::native::ComputeApi;
use crate::status::StatusError;

/// Opaque native device (`cl_device_id`) identity token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DeviceId(usize);

impl DeviceId {
    /// The null device.
    pub const NULL: Self = Self(0);

    /// Wrap a raw native token.
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// The raw native token.
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// Whether this is the null device.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() { f.write_str("device<null>") } else { write!(f, "device@{:#x}", self.0) }
    }
}

/// A compute device referenced by identity.
///
/// Equality and hashing consider only the identity token, so two handles
/// to the same native device dedupe regardless of whether their names
/// have been resolved.
#[derive(Clone)]
pub struct Device {
    id: DeviceId,
    name: OnceLock<String>,
}

impl Device {
    /// A device whose name will be resolved on first display use.
    pub const fn new(id: DeviceId) -> Self {
        Self { id, name: OnceLock::new() }
    }

    /// A device whose name is already known, e.g. from enumeration.
    pub fn with_name(id: DeviceId, name: impl Into<String>) -> Self {
        let device = Self::new(id);
        let _ = device.name.set(name.into());
        device
    }

    /// Identity token.
    pub const fn id(&self) -> DeviceId {
        self.id
    }

    /// The cached name, if it has been resolved.
    pub fn cached_name(&self) -> Option<&str> {
        self.name.get().map(String::as_str)
    }

    /// Resolve the device name through `api`, caching the first success.
    pub fn name(&self, api: &dyn ComputeApi) -> Result<&str, StatusError> {
        if let Some(name) = self.name.get() {
            return Ok(name);
        }
        if self.id.is_null() {
            return Err(StatusError::InvalidDevice);
        }
        let resolved = api.device_name(self.id)?;
        Ok(self.name.get_or_init(|| resolved))
    }

    /// A display label that never fails.
    ///
    /// Uses the trimmed device name when it resolves to something
    /// non-empty; any error or panic during resolution yields the
    /// identity-derived label instead.
    pub fn label(&self, api: &dyn ComputeApi) -> String {
        let resolved = panic::catch_unwind(AssertUnwindSafe(|| {
            self.name(api).map(|name| name.trim().to_owned())
        }));
        match resolved {
            Ok(Ok(name)) if !name.is_empty() => name,
            _ => self.id.to_string(),
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("id", &self.id).field("name", &self.cached_name()).finish()
    }
}

impl From<DeviceId> for Device {
    fn from(id: DeviceId) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeApi;

    #[test]
    fn equality_is_by_identity() {
        let a = Device::with_name(DeviceId::from_raw(0x10), "GPU0");
        let b = Device::new(DeviceId::from_raw(0x10));
        let c = Device::with_name(DeviceId::from_raw(0x20), "GPU0");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn synthetic_label_is_hex() {
        assert_eq!(DeviceId::from_raw(0xabc).to_string(), "device@0xabc");
        assert_eq!(DeviceId::NULL.to_string(), "device<null>");
    }

    #[test]
    fn name_is_resolved_once_and_cached() {
        let api = FakeApi::new();
        let id = api.add_device("Arc A770");
        let device = Device::new(id);
        assert_eq!(device.cached_name(), None);
        assert_eq!(device.name(&api).unwrap(), "Arc A770");
        assert_eq!(device.cached_name(), Some("Arc A770"));
        assert_eq!(api.device_name_calls(), 1);
        assert_eq!(device.label(&api), "Arc A770");
        assert_eq!(api.device_name_calls(), 1);
    }

    #[test]
    fn label_falls_back_on_error() {
        let api = FakeApi::new();
        let device = Device::new(DeviceId::from_raw(0x77));
        assert_eq!(device.label(&api), "device@0x77");
    }

    #[test]
    fn label_falls_back_on_blank_name() {
        let api = FakeApi::new();
        let device = Device::with_name(DeviceId::from_raw(0x78), "   ");
        assert_eq!(device.label(&api), "device@0x78");
    }

    #[test]
    fn label_survives_panicking_driver() {
        let api = FakeApi::new();
        let id = api.add_device("never seen");
        api.panic_on_device_name(id);
        let device = Device::new(id);
        assert_eq!(device.label(&api), id.to_string());
    }

    #[test]
    fn null_device_name_is_invalid() {
        let api = FakeApi::new();
        assert_eq!(Device::new(DeviceId::NULL).name(&api), Err(StatusError::InvalidDevice));
    }
}
