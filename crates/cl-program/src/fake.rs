//! In-memory native layer for tests without GPU hardware.
//!
//! [`FakeApi`] keeps a small model of native programs, devices, kernels,
//! and build logs, and follows the native calling conventions closely
//! enough to exercise every path of [`crate::Program`]: null-terminated
//! logs, per-device build status, null entries in device arrays, and
//! drivers that panic while resolving names.

use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::mem::size_of;
use std::sync::{Mutex, MutexGuard};

use crate::device::{Device, DeviceId};
use crate::native::{BuildStatus, ComputeApi, KernelHandle, ProgramBuildInfo, ProgramHandle, ProgramInfo};
use crate::status::StatusError;

/// Arguments of one recorded `build_program` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCall {
    /// Devices passed to the call, in order.
    pub devices: Vec<DeviceId>,
    /// Options string, `None` when no options were passed.
    pub options: Option<String>,
}

#[derive(Debug, Default)]
struct FakeProgram {
    entry_points: Vec<String>,
    associated: Vec<DeviceId>,
    build_failure: Option<StatusError>,
    info_failure: Option<StatusError>,
    logs: HashMap<DeviceId, Result<Vec<u8>, StatusError>>,
    build_status: HashMap<DeviceId, BuildStatus>,
    built: bool,
    releases: usize,
    builds: Vec<BuildCall>,
}

#[derive(Debug, Default)]
struct FakeState {
    next_handle: usize,
    devices: HashMap<DeviceId, String>,
    panicking_devices: HashSet<DeviceId>,
    programs: HashMap<ProgramHandle, FakeProgram>,
    kernels: HashMap<KernelHandle, (String, usize)>,
    device_name_calls: usize,
}

impl FakeState {
    fn next(&mut self) -> usize {
        self.next_handle += 0x100;
        self.next_handle
    }

    fn live_program(&mut self, program: ProgramHandle) -> Result<&mut FakeProgram, StatusError> {
        match self.programs.get_mut(&program) {
            Some(p) if p.releases == 0 => Ok(p),
            _ => Err(StatusError::InvalidProgram),
        }
    }

    fn program(&mut self, program: ProgramHandle) -> &mut FakeProgram {
        self.programs.entry(program).or_default()
    }
}

/// A scriptable stand-in for the native compute API.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    /// An empty native layer with no devices or programs.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        // A panicking device-name call must not wedge later assertions.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a device with a resolvable name.
    pub fn add_device(&self, name: &str) -> DeviceId {
        let mut state = self.state();
        let id = DeviceId::from_raw(state.next());
        state.devices.insert(id, name.to_owned());
        id
    }

    /// Register a device and return it as an unresolved [`Device`].
    pub fn device(&self, name: &str) -> Device {
        Device::new(self.add_device(name))
    }

    /// Make name resolution for `device` panic.
    pub fn panic_on_device_name(&self, device: DeviceId) {
        self.state().panicking_devices.insert(device);
    }

    /// Create a program exposing the given kernel entry points.
    pub fn add_program(&self, entry_points: &[&str]) -> ProgramHandle {
        let mut state = self.state();
        let handle = ProgramHandle::from_raw(state.next());
        state.program(handle).entry_points = entry_points.iter().map(|s| (*s).to_owned()).collect();
        handle
    }

    /// Set the devices the native layer reports as associated with `program`.
    pub fn set_associated_devices(&self, program: ProgramHandle, devices: &[DeviceId]) {
        self.state().program(program).associated = devices.to_vec();
    }

    /// Make every subsequent build of `program` fail with `status`.
    pub fn fail_build(&self, program: ProgramHandle, status: StatusError) {
        self.state().program(program).build_failure = Some(status);
    }

    /// Let builds of `program` succeed again.
    pub fn clear_build_failure(&self, program: ProgramHandle) {
        self.state().program(program).build_failure = None;
    }

    /// Make program-wide info queries on `program` fail with `status`.
    pub fn fail_program_info(&self, program: ProgramHandle, status: StatusError) {
        self.state().program(program).info_failure = Some(status);
    }

    /// Store a compiler log for `device`; the native copy is null-terminated.
    pub fn set_build_log(&self, program: ProgramHandle, device: DeviceId, log: &str) {
        let mut bytes = log.as_bytes().to_vec();
        bytes.push(0);
        self.state().program(program).logs.insert(device, Ok(bytes));
    }

    /// Make log queries for `device` fail with `status`.
    pub fn fail_build_log(&self, program: ProgramHandle, device: DeviceId, status: StatusError) {
        self.state().program(program).logs.insert(device, Err(status));
    }

    /// Number of native release calls made for `program`.
    pub fn release_count(&self, program: ProgramHandle) -> usize {
        self.state().programs.get(&program).map_or(0, |p| p.releases)
    }

    /// Whether `program` has been released natively.
    pub fn is_released(&self, program: ProgramHandle) -> bool {
        self.release_count(program) > 0
    }

    /// Every `build_program` call made for `program`, in order.
    pub fn build_calls(&self, program: ProgramHandle) -> Vec<BuildCall> {
        self.state().programs.get(&program).map(|p| p.builds.clone()).unwrap_or_default()
    }

    /// Number of native release calls made for `kernel`.
    pub fn kernel_release_count(&self, kernel: KernelHandle) -> usize {
        self.state().kernels.get(&kernel).map_or(0, |(_, releases)| *releases)
    }

    /// Entry-point name `kernel` was created for.
    pub fn kernel_name(&self, kernel: KernelHandle) -> Option<String> {
        self.state().kernels.get(&kernel).map(|(name, _)| name.clone())
    }

    /// Number of `device_name` calls that reached the native layer.
    pub fn device_name_calls(&self) -> usize {
        self.state().device_name_calls
    }
}

impl ComputeApi for FakeApi {
    fn build_program(
        &self,
        program: ProgramHandle,
        devices: &[DeviceId],
        options: Option<&CStr>,
    ) -> Result<(), StatusError> {
        let mut state = self.state();
        let prog = state.live_program(program)?;
        let options = options.map(|o| o.to_string_lossy().into_owned());
        prog.builds.push(BuildCall { devices: devices.to_vec(), options });

        let targets = if devices.is_empty() { prog.associated.clone() } else { devices.to_vec() };
        let (result, device_status) = match prog.build_failure {
            Some(status) => (Err(status), BuildStatus::Error),
            None => (Ok(()), BuildStatus::Success),
        };
        for device in targets {
            prog.build_status.insert(device, device_status);
        }
        prog.built = result.is_ok();
        result
    }

    fn create_kernel(&self, program: ProgramHandle, name: &CStr) -> Result<KernelHandle, StatusError> {
        let mut state = self.state();
        let prog = state.live_program(program)?;
        let name = name.to_string_lossy().into_owned();
        if !prog.built {
            return Err(StatusError::InvalidProgramExecutable);
        }
        if !prog.entry_points.contains(&name) {
            return Err(StatusError::InvalidKernelName);
        }
        let kernel = KernelHandle::from_raw(state.next());
        state.kernels.insert(kernel, (name, 0));
        Ok(kernel)
    }

    fn release_kernel(&self, kernel: KernelHandle) -> Result<(), StatusError> {
        match self.state().kernels.get_mut(&kernel) {
            Some((_, releases)) if *releases == 0 => {
                *releases += 1;
                Ok(())
            }
            Some((_, releases)) => {
                *releases += 1;
                Err(StatusError::InvalidKernel)
            }
            None => Err(StatusError::InvalidKernel),
        }
    }

    fn release_program(&self, program: ProgramHandle) -> Result<(), StatusError> {
        match self.state().programs.get_mut(&program) {
            Some(p) => {
                p.releases += 1;
                if p.releases == 1 { Ok(()) } else { Err(StatusError::InvalidProgram) }
            }
            None => Err(StatusError::InvalidProgram),
        }
    }

    fn program_info(&self, program: ProgramHandle, param: ProgramInfo) -> Result<Vec<u8>, StatusError> {
        let mut state = self.state();
        let prog = state.live_program(program)?;
        if let Some(status) = prog.info_failure {
            return Err(status);
        }
        match param {
            ProgramInfo::Devices => {
                let mut bytes = Vec::with_capacity(prog.associated.len() * size_of::<usize>());
                for device in &prog.associated {
                    bytes.extend_from_slice(&device.as_raw().to_ne_bytes());
                }
                Ok(bytes)
            }
        }
    }

    fn program_build_info(
        &self,
        program: ProgramHandle,
        device: DeviceId,
        param: ProgramBuildInfo,
    ) -> Result<Vec<u8>, StatusError> {
        let mut state = self.state();
        if device.is_null() {
            return Err(StatusError::InvalidDevice);
        }
        let prog = state.live_program(program)?;
        match param {
            ProgramBuildInfo::Log => match prog.logs.get(&device) {
                Some(Ok(bytes)) => Ok(bytes.clone()),
                Some(Err(status)) => Err(*status),
                None => Ok(Vec::new()),
            },
            ProgramBuildInfo::Status => {
                let status = prog.build_status.get(&device).copied().unwrap_or(BuildStatus::None);
                Ok(status.raw().to_ne_bytes().to_vec())
            }
        }
    }

    fn device_name(&self, device: DeviceId) -> Result<String, StatusError> {
        let mut state = self.state();
        state.device_name_calls += 1;
        let panics = state.panicking_devices.contains(&device);
        let name = state.devices.get(&device).cloned();
        drop(state);
        if panics {
            panic!("driver fault while querying name of {device}");
        }
        name.ok_or(StatusError::InvalidDevice)
    }
}
