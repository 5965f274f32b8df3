//! Program entity: build orchestration, kernel extraction, and build logs.

use std::ffi::CString;
use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::BuildConfig;
use crate::device::{Device, DeviceId};
use crate::diagnostics;
use crate::error::Result;
use crate::kernel::Kernel;
use crate::native::{BuildStatus, ComputeApi, ProgramBuildInfo, ProgramHandle, ProgramInfo, c_bytes_to_string};
use crate::status::StatusError;

const DEVICE_ID_SIZE: usize = size_of::<DeviceId>();

/// An owned native compiled unit.
///
/// The handle is released exactly once, either by [`Program::release`]
/// or when the value is dropped. Every operation after release fails
/// with [`StatusError::InvalidProgram`].
///
/// Mutating operations take `&mut self`, so the borrow checker enforces
/// the external serialization `build` and `release` require; log queries
/// take `&self` and may run concurrently.
pub struct Program {
    api: Arc<dyn ComputeApi>,
    handle: Option<ProgramHandle>,
    devices: Vec<Device>,
}

impl Program {
    /// Take ownership of a native program created elsewhere.
    pub fn from_raw(api: Arc<dyn ComputeApi>, handle: ProgramHandle) -> std::result::Result<Self, StatusError> {
        if handle.is_null() {
            return Err(StatusError::InvalidProgram);
        }
        Ok(Self { api, handle: Some(handle), devices: Vec::new() })
    }

    /// The native handle, or `None` once released.
    pub const fn handle(&self) -> Option<ProgramHandle> {
        self.handle
    }

    /// Whether the native handle has been released.
    pub const fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Devices recorded by the last successful build, in build order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// The native layer this program talks to.
    pub fn api(&self) -> &dyn ComputeApi {
        self.api.as_ref()
    }

    fn live_handle(&self) -> std::result::Result<ProgramHandle, StatusError> {
        self.handle.ok_or(StatusError::InvalidProgram)
    }

    /// Release the native handle and forget cached devices.
    ///
    /// Idempotent; never fails. A failure status from the native release
    /// is logged and otherwise ignored.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(program = %handle, "releasing program");
            if let Err(status) = self.api.release_program(handle) {
                warn!(program = %handle, %status, "native program release reported failure");
            }
        }
        self.devices.clear();
    }

    /// Build the program for `devices` with compiler `options`, blocking
    /// until the native compiler finishes.
    ///
    /// An empty `devices` slice builds for every associated device. On
    /// success an explicit device list replaces the cached one; otherwise,
    /// if nothing is cached yet, the associated devices are discovered
    /// and cached, and a discovery failure is ignored. On failure the
    /// error carries per-device compiler logs where any could be fetched.
    pub fn build(&mut self, devices: &[Device], options: &str) -> Result<()> {
        let handle = self.live_handle()?;
        let c_options = if options.is_empty() {
            None
        } else {
            Some(CString::new(options).map_err(|_| StatusError::InvalidBuildOptions)?)
        };
        let ids: Vec<DeviceId> = devices.iter().map(Device::id).collect();

        debug!(program = %handle, devices = ids.len(), options, "building program");
        if let Err(status) = self.api.build_program(handle, &ids, c_options.as_deref()) {
            let err = diagnostics::build_failure(self, status, devices);
            warn!(program = %handle, %status, with_logs = err.is_build_log(), "program build failed");
            return Err(err);
        }

        if !devices.is_empty() {
            self.devices = devices.to_vec();
        } else if self.devices.is_empty() {
            match self.associated_devices() {
                Ok(found) => self.devices = found,
                Err(status) => debug!(program = %handle, %status, "device discovery after build failed"),
            }
        }
        debug!(program = %handle, devices = self.devices.len(), "program built");
        Ok(())
    }

    /// Build with options rendered from `config`.
    pub fn build_with(&mut self, devices: &[Device], config: &BuildConfig) -> Result<()> {
        self.build(devices, &config.options_string())
    }

    /// Create a kernel for the entry point `name`.
    ///
    /// Name validity is checked natively. The kernel stays valid after
    /// this program is released.
    pub fn create_kernel(&self, name: &str) -> std::result::Result<Kernel, StatusError> {
        let handle = self.live_handle()?;
        let c_name = CString::new(name).map_err(|_| StatusError::InvalidKernelName)?;
        let kernel = self.api.create_kernel(handle, &c_name)?;
        debug!(program = %handle, kernel = %kernel, name, "kernel created");
        Ok(Kernel::new(Arc::clone(&self.api), kernel, name.to_owned()))
    }

    /// Fetch the compiler log for `device` from the last build.
    ///
    /// Returns an empty string when the native layer has no log. The
    /// trailing null terminator is stripped.
    pub fn build_log(&self, device: &Device) -> std::result::Result<String, StatusError> {
        let handle = self.live_handle()?;
        if device.id().is_null() {
            return Err(StatusError::InvalidDevice);
        }
        let bytes = self.api.program_build_info(handle, device.id(), ProgramBuildInfo::Log)?;
        if bytes.is_empty() {
            return Ok(String::new());
        }
        Ok(c_bytes_to_string(bytes))
    }

    /// Outcome of the most recent build for `device`.
    pub fn build_status(&self, device: &Device) -> std::result::Result<BuildStatus, StatusError> {
        let handle = self.live_handle()?;
        if device.id().is_null() {
            return Err(StatusError::InvalidDevice);
        }
        let bytes = self.api.program_build_info(handle, device.id(), ProgramBuildInfo::Status)?;
        let raw: [u8; size_of::<i32>()] = bytes.as_slice().try_into().map_err(|_| StatusError::Internal)?;
        Ok(BuildStatus::from_raw(i32::from_ne_bytes(raw)))
    }

    /// Fetch the compiler log for each device, keeping individual failures.
    pub fn build_logs(&self, devices: &[Device]) -> Vec<(Device, std::result::Result<String, StatusError>)> {
        devices.iter().map(|device| (device.clone(), self.build_log(device))).collect()
    }

    /// Ask the native layer which devices are associated with this program.
    ///
    /// A program with no associated devices yields an empty list, not an
    /// error. Null entries in the native array are dropped; names are left
    /// for lazy resolution.
    pub fn associated_devices(&self) -> std::result::Result<Vec<Device>, StatusError> {
        let handle = self.live_handle()?;
        let buf = self.api.program_info(handle, ProgramInfo::Devices)?;
        if buf.is_empty() {
            return Ok(Vec::new());
        }
        if DEVICE_ID_SIZE == 0 {
            return Err(StatusError::Internal);
        }

        Ok(buf
            .chunks_exact(DEVICE_ID_SIZE)
            .map(|chunk| {
                let mut raw = [0u8; DEVICE_ID_SIZE];
                raw.copy_from_slice(chunk);
                DeviceId::from_raw(usize::from_ne_bytes(raw))
            })
            .filter(|id| !id.is_null())
            .map(Device::new)
            .collect())
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program").field("handle", &self.handle).field("devices", &self.devices).finish()
    }
}
