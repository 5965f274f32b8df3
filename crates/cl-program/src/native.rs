//! The native compute API seam.
//!
//! [`ComputeApi`] exposes exactly the native calls the program subsystem
//! needs. Production code binds it to the system OpenCL library (see the
//! `opencl` feature); tests substitute `fake::FakeApi` (feature
//! `test-utils`). Handles are opaque pointer-sized tokens; a zero token is
//! the null handle.

use std::ffi::CStr;
use std::fmt;

use crate::device::DeviceId;
use crate::status::StatusError;

macro_rules! raw_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// The null handle.
            pub const NULL: Self = Self(0);

            /// Wrap a raw native token.
            pub const fn from_raw(raw: usize) -> Self {
                Self(raw)
            }

            /// The raw native token.
            pub const fn as_raw(self) -> usize {
                self.0
            }

            /// Whether this is the null handle.
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }
    };
}

raw_handle! {
    /// Native compiled-unit (`cl_program`) handle.
    ProgramHandle
}

raw_handle! {
    /// Native kernel (`cl_kernel`) handle.
    KernelHandle
}

/// Selector for [`ComputeApi::program_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramInfo {
    /// Array of associated device handles, in native byte order.
    Devices,
}

/// Selector for [`ComputeApi::program_build_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramBuildInfo {
    /// Build status for the device, as a native-endian `cl_int`.
    Status,
    /// Null-terminated compiler log.
    Log,
}

/// Per-device outcome of the most recent build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStatus {
    /// The last build for the device succeeded.
    Success,
    /// No build has been attempted for the device.
    None,
    /// The last build for the device failed.
    Error,
    /// A build is still running.
    InProgress,
    /// A value outside the native set.
    Unknown(i32),
}

impl BuildStatus {
    /// Translate the native `cl_build_status` value.
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Success,
            -1 => Self::None,
            -2 => Self::Error,
            -3 => Self::InProgress,
            other => Self::Unknown(other),
        }
    }

    /// The native `cl_build_status` value.
    pub const fn raw(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::None => -1,
            Self::Error => -2,
            Self::InProgress => -3,
            Self::Unknown(raw) => raw,
        }
    }
}

/// Native calls used by [`crate::Program`] and [`crate::Kernel`].
///
/// Info queries return the raw bytes the native layer reports. The binding
/// performs the native size-then-fetch exchange; an empty buffer means the
/// native layer reported a size of zero.
pub trait ComputeApi: Send + Sync {
    /// Compile and link `program` for `devices`, blocking until done.
    ///
    /// An empty device slice builds for every device associated with the
    /// program. `None` options means no compiler options.
    fn build_program(
        &self,
        program: ProgramHandle,
        devices: &[DeviceId],
        options: Option<&CStr>,
    ) -> Result<(), StatusError>;

    /// Create a kernel for the entry point `name`.
    fn create_kernel(&self, program: ProgramHandle, name: &CStr) -> Result<KernelHandle, StatusError>;

    /// Drop one native reference to `kernel`.
    fn release_kernel(&self, kernel: KernelHandle) -> Result<(), StatusError>;

    /// Drop one native reference to `program`.
    fn release_program(&self, program: ProgramHandle) -> Result<(), StatusError>;

    /// Query program-wide information.
    fn program_info(&self, program: ProgramHandle, param: ProgramInfo) -> Result<Vec<u8>, StatusError>;

    /// Query per-device build information.
    fn program_build_info(
        &self,
        program: ProgramHandle,
        device: DeviceId,
        param: ProgramBuildInfo,
    ) -> Result<Vec<u8>, StatusError>;

    /// Resolve the human-readable device name.
    ///
    /// Broken drivers have been seen to panic here; callers that only
    /// need a display label go through [`crate::Device::label`].
    fn device_name(&self, device: DeviceId) -> Result<String, StatusError>;
}

/// Strip everything from the first NUL byte on and decode lossily.
pub(crate) fn c_bytes_to_string(mut bytes: Vec<u8>) -> String {
    if let Some(end) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(end);
    }
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handles() {
        assert!(ProgramHandle::NULL.is_null());
        assert!(!ProgramHandle::from_raw(0x10).is_null());
        assert_eq!(KernelHandle::from_raw(0xbeef).as_raw(), 0xbeef);
    }

    #[test]
    fn handle_display_is_hex() {
        assert_eq!(ProgramHandle::from_raw(255).to_string(), "0xff");
    }

    #[test]
    fn c_bytes_trimmed_at_nul() {
        assert_eq!(c_bytes_to_string(b"warning: x\0\0junk".to_vec()), "warning: x");
        assert_eq!(c_bytes_to_string(b"no terminator".to_vec()), "no terminator");
        assert_eq!(c_bytes_to_string(vec![0]), "");
    }

    #[test]
    fn build_status_round_trips_native_values() {
        assert_eq!(BuildStatus::from_raw(0), BuildStatus::Success);
        assert_eq!(BuildStatus::from_raw(-2), BuildStatus::Error);
        assert_eq!(BuildStatus::from_raw(-9), BuildStatus::Unknown(-9));
        assert_eq!(BuildStatus::InProgress.raw(), -3);
    }

    #[test]
    fn c_bytes_invalid_utf8_is_lossy() {
        let s = c_bytes_to_string(vec![b'a', 0xff, b'b', 0]);
        assert!(s.starts_with('a') && s.ends_with('b'));
    }
}
