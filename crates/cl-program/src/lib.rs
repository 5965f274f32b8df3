//! Program build, kernel extraction, and build-log diagnostics over a
//! native compute API.
//!
//! This crate provides:
//! - [`Program`]: an owned native compiled unit with idempotent release,
//!   blocking builds, kernel creation, and per-device build logs
//! - [`diagnostics`]: aggregation of per-device compiler logs into a
//!   single [`BuildError`] when a build fails
//! - [`ComputeApi`]: the injected native layer, with an in-memory
//!   `fake::FakeApi` for tests (feature `test-utils`) and an OpenCL
//!   binding behind the `opencl` feature
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cl_program::{Program, StatusError};
//! use cl_program::fake::FakeApi;
//!
//! let api = Arc::new(FakeApi::new());
//! let handle = api.add_program(&["vadd"]);
//! let gpu = api.device("GPU0");
//! api.fail_build(handle, StatusError::BuildProgramFailure);
//! api.set_build_log(handle, gpu.id(), "error: expected ';'\n");
//!
//! let mut program = Program::from_raw(api.clone(), handle)?;
//! let err = program.build(&[gpu], "-cl-std=CL2.0").unwrap_err();
//! assert_eq!(err.to_string(), "status=CL_BUILD_PROGRAM_FAILURE\nGPU0:\nerror: expected ';'");
//! # Ok::<(), StatusError>(())
//! ```

pub mod config;
pub mod device;
pub mod diagnostics;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
mod kernel;
pub mod native;
#[cfg(feature = "opencl")]
pub mod opencl;
mod program;
pub mod status;

// Re-export primary public types.
pub use config::BuildConfig;
pub use device::{Device, DeviceId};
pub use error::{BuildError, Error, Result};
pub use kernel::Kernel;
pub use native::{BuildStatus, ComputeApi, KernelHandle, ProgramBuildInfo, ProgramHandle, ProgramInfo};
#[cfg(feature = "opencl")]
pub use opencl::OpenClApi;
pub use program::Program;
pub use status::{StatusError, check};
