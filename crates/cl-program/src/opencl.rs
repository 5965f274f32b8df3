//! [`ComputeApi`] backed by the system OpenCL ICD loader through `opencl3`.

use std::ffi::CStr;
use std::mem::size_of;
use std::ptr;

use opencl3::device::{CL_DEVICE_NAME, get_device_data};
use opencl3::kernel::{create_kernel, release_kernel};
use opencl3::program::{
    CL_PROGRAM_BUILD_LOG, CL_PROGRAM_BUILD_STATUS, CL_PROGRAM_DEVICES, build_program, get_program_build_data,
    get_program_data, release_program,
};
use opencl3::types::{cl_device_id, cl_kernel, cl_program, cl_program_build_info, cl_program_info};

use crate::device::DeviceId;
use crate::native::{ComputeApi, KernelHandle, ProgramBuildInfo, ProgramHandle, ProgramInfo, c_bytes_to_string};
use crate::status::StatusError;

fn program_ptr(handle: ProgramHandle) -> cl_program {
    handle.as_raw() as cl_program
}

fn device_ptr(id: DeviceId) -> cl_device_id {
    id.as_raw() as cl_device_id
}

const fn program_param(param: ProgramInfo) -> cl_program_info {
    match param {
        ProgramInfo::Devices => CL_PROGRAM_DEVICES,
    }
}

const fn build_param(param: ProgramBuildInfo) -> cl_program_build_info {
    match param {
        ProgramBuildInfo::Status => CL_PROGRAM_BUILD_STATUS,
        ProgramBuildInfo::Log => CL_PROGRAM_BUILD_LOG,
    }
}

/// Decode a native `cl_device_id[]` buffer.
fn device_list(bytes: &[u8]) -> Vec<cl_device_id> {
    bytes
        .chunks_exact(size_of::<usize>())
        .map(|chunk| {
            let mut raw = [0u8; size_of::<usize>()];
            raw.copy_from_slice(chunk);
            usize::from_ne_bytes(raw) as cl_device_id
        })
        .collect()
}

/// The OpenCL implementation of the native compute API.
///
/// Stateless: every call goes straight to the ICD loader, which owns the
/// process-wide platform state.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenClApi;

impl OpenClApi {
    /// Create the OpenCL binding.
    pub const fn new() -> Self {
        Self
    }
}

impl ComputeApi for OpenClApi {
    fn build_program(
        &self,
        program: ProgramHandle,
        devices: &[DeviceId],
        options: Option<&CStr>,
    ) -> Result<(), StatusError> {
        let program = program_ptr(program);
        let ids: Vec<cl_device_id> = if devices.is_empty() {
            // An empty slice still hands the driver a non-null list pointer,
            // which it rejects; name every associated device instead.
            device_list(&get_program_data(program, CL_PROGRAM_DEVICES).map_err(StatusError::from_code)?)
        } else {
            devices.iter().map(|d| device_ptr(*d)).collect()
        };
        // No callback is registered, so the call blocks until the build completes.
        build_program(program, &ids, options.unwrap_or(c""), None, ptr::null_mut()).map_err(StatusError::from_code)
    }

    fn create_kernel(&self, program: ProgramHandle, name: &CStr) -> Result<KernelHandle, StatusError> {
        let kernel = create_kernel(program_ptr(program), name).map_err(StatusError::from_code)?;
        Ok(KernelHandle::from_raw(kernel as usize))
    }

    fn release_kernel(&self, kernel: KernelHandle) -> Result<(), StatusError> {
        // SAFETY: the caller owns exactly one reference to `kernel` and
        // never uses the handle again.
        unsafe { release_kernel(kernel.as_raw() as cl_kernel) }.map_err(StatusError::from_code)
    }

    fn release_program(&self, program: ProgramHandle) -> Result<(), StatusError> {
        // SAFETY: as in `release_kernel`.
        unsafe { release_program(program_ptr(program)) }.map_err(StatusError::from_code)
    }

    fn program_info(&self, program: ProgramHandle, param: ProgramInfo) -> Result<Vec<u8>, StatusError> {
        get_program_data(program_ptr(program), program_param(param)).map_err(StatusError::from_code)
    }

    fn program_build_info(
        &self,
        program: ProgramHandle,
        device: DeviceId,
        param: ProgramBuildInfo,
    ) -> Result<Vec<u8>, StatusError> {
        get_program_build_data(program_ptr(program), device_ptr(device), build_param(param))
            .map_err(StatusError::from_code)
    }

    fn device_name(&self, device: DeviceId) -> Result<String, StatusError> {
        let bytes = get_device_data(device_ptr(device), CL_DEVICE_NAME).map_err(StatusError::from_code)?;
        Ok(c_bytes_to_string(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires an OpenCL runtime
    fn null_program_is_rejected_by_driver() {
        let api = OpenClApi::new();
        let err = api.build_program(ProgramHandle::NULL, &[DeviceId::from_raw(1)], None).unwrap_err();
        assert_eq!(err, StatusError::InvalidProgram);
    }

    #[test]
    fn device_list_decodes_native_array() {
        let mut bytes = Vec::new();
        for raw in [0x1000usize, 0, 0x2000] {
            bytes.extend_from_slice(&raw.to_ne_bytes());
        }
        let ids: Vec<usize> = device_list(&bytes).into_iter().map(|id| id as usize).collect();
        assert_eq!(ids, vec![0x1000, 0, 0x2000]);
    }
}
