//! Native status codes mapped to structured error kinds.
//!
//! Every non-zero status a native call can return maps onto a
//! [`StatusError`] variant; codes outside the known table land in
//! [`StatusError::Unknown`], so the translation is total.

/// Native success status.
pub const CL_SUCCESS: i32 = 0;

macro_rules! status_codes {
    ($($(#[$doc:meta])* $variant:ident = $code:literal => $name:tt,)*) => {
        /// A native status code translated to an enumerable error kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
        pub enum StatusError {
            $(
                $(#[$doc])*
                #[error($name)]
                $variant,
            )*
            /// A status code outside the known table.
            #[error("unknown status ({0})")]
            Unknown(i32),
            /// A consistency failure inside this layer with no native code.
            #[error("internal error")]
            Internal,
        }

        impl StatusError {
            /// Translate a non-success native code.
            ///
            /// `CL_SUCCESS` has no error kind and maps to `Unknown(0)`;
            /// use [`check`] when the code may be a success.
            pub const fn from_code(code: i32) -> Self {
                match code {
                    $($code => Self::$variant,)*
                    other => Self::Unknown(other),
                }
            }

            /// The native integer code, or `None` for [`StatusError::Internal`].
            pub const fn code(self) -> Option<i32> {
                match self {
                    $(Self::$variant => Some($code),)*
                    Self::Unknown(code) => Some(code),
                    Self::Internal => None,
                }
            }
        }
    };
}

status_codes! {
    DeviceNotFound = -1 => "CL_DEVICE_NOT_FOUND",
    DeviceNotAvailable = -2 => "CL_DEVICE_NOT_AVAILABLE",
    CompilerNotAvailable = -3 => "CL_COMPILER_NOT_AVAILABLE",
    MemObjectAllocationFailure = -4 => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
    OutOfResources = -5 => "CL_OUT_OF_RESOURCES",
    OutOfHostMemory = -6 => "CL_OUT_OF_HOST_MEMORY",
    ProfilingInfoNotAvailable = -7 => "CL_PROFILING_INFO_NOT_AVAILABLE",
    MemCopyOverlap = -8 => "CL_MEM_COPY_OVERLAP",
    ImageFormatMismatch = -9 => "CL_IMAGE_FORMAT_MISMATCH",
    ImageFormatNotSupported = -10 => "CL_IMAGE_FORMAT_NOT_SUPPORTED",
    /// The compiler rejected the program for at least one device.
    BuildProgramFailure = -11 => "CL_BUILD_PROGRAM_FAILURE",
    MapFailure = -12 => "CL_MAP_FAILURE",
    MisalignedSubBufferOffset = -13 => "CL_MISALIGNED_SUB_BUFFER_OFFSET",
    ExecStatusErrorForEventsInWaitList = -14 => "CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST",
    CompileProgramFailure = -15 => "CL_COMPILE_PROGRAM_FAILURE",
    LinkerNotAvailable = -16 => "CL_LINKER_NOT_AVAILABLE",
    LinkProgramFailure = -17 => "CL_LINK_PROGRAM_FAILURE",
    DevicePartitionFailed = -18 => "CL_DEVICE_PARTITION_FAILED",
    KernelArgInfoNotAvailable = -19 => "CL_KERNEL_ARG_INFO_NOT_AVAILABLE",
    InvalidValue = -30 => "CL_INVALID_VALUE",
    InvalidDeviceType = -31 => "CL_INVALID_DEVICE_TYPE",
    InvalidPlatform = -32 => "CL_INVALID_PLATFORM",
    /// A null or foreign device handle was supplied.
    InvalidDevice = -33 => "CL_INVALID_DEVICE",
    InvalidContext = -34 => "CL_INVALID_CONTEXT",
    InvalidQueueProperties = -35 => "CL_INVALID_QUEUE_PROPERTIES",
    InvalidCommandQueue = -36 => "CL_INVALID_COMMAND_QUEUE",
    InvalidHostPtr = -37 => "CL_INVALID_HOST_PTR",
    InvalidMemObject = -38 => "CL_INVALID_MEM_OBJECT",
    InvalidImageFormatDescriptor = -39 => "CL_INVALID_IMAGE_FORMAT_DESCRIPTOR",
    InvalidImageSize = -40 => "CL_INVALID_IMAGE_SIZE",
    InvalidSampler = -41 => "CL_INVALID_SAMPLER",
    InvalidBinary = -42 => "CL_INVALID_BINARY",
    InvalidBuildOptions = -43 => "CL_INVALID_BUILD_OPTIONS",
    /// The program handle is null or has been released.
    InvalidProgram = -44 => "CL_INVALID_PROGRAM",
    InvalidProgramExecutable = -45 => "CL_INVALID_PROGRAM_EXECUTABLE",
    InvalidKernelName = -46 => "CL_INVALID_KERNEL_NAME",
    InvalidKernelDefinition = -47 => "CL_INVALID_KERNEL_DEFINITION",
    InvalidKernel = -48 => "CL_INVALID_KERNEL",
    InvalidArgIndex = -49 => "CL_INVALID_ARG_INDEX",
    InvalidArgValue = -50 => "CL_INVALID_ARG_VALUE",
    InvalidArgSize = -51 => "CL_INVALID_ARG_SIZE",
    InvalidKernelArgs = -52 => "CL_INVALID_KERNEL_ARGS",
    InvalidWorkDimension = -53 => "CL_INVALID_WORK_DIMENSION",
    InvalidWorkGroupSize = -54 => "CL_INVALID_WORK_GROUP_SIZE",
    InvalidWorkItemSize = -55 => "CL_INVALID_WORK_ITEM_SIZE",
    InvalidGlobalOffset = -56 => "CL_INVALID_GLOBAL_OFFSET",
    InvalidEventWaitList = -57 => "CL_INVALID_EVENT_WAIT_LIST",
    InvalidEvent = -58 => "CL_INVALID_EVENT",
    InvalidOperation = -59 => "CL_INVALID_OPERATION",
    InvalidGlObject = -60 => "CL_INVALID_GL_OBJECT",
    InvalidBufferSize = -61 => "CL_INVALID_BUFFER_SIZE",
    InvalidMipLevel = -62 => "CL_INVALID_MIP_LEVEL",
    InvalidGlobalWorkSize = -63 => "CL_INVALID_GLOBAL_WORK_SIZE",
    InvalidProperty = -64 => "CL_INVALID_PROPERTY",
    InvalidImageDescriptor = -65 => "CL_INVALID_IMAGE_DESCRIPTOR",
    InvalidCompilerOptions = -66 => "CL_INVALID_COMPILER_OPTIONS",
    InvalidLinkerOptions = -67 => "CL_INVALID_LINKER_OPTIONS",
    InvalidDevicePartitionCount = -68 => "CL_INVALID_DEVICE_PARTITION_COUNT",
    InvalidPipeSize = -69 => "CL_INVALID_PIPE_SIZE",
    InvalidDeviceQueue = -70 => "CL_INVALID_DEVICE_QUEUE",
    InvalidSpecId = -71 => "CL_INVALID_SPEC_ID",
    MaxSizeRestrictionExceeded = -72 => "CL_MAX_SIZE_RESTRICTION_EXCEEDED",
}

/// Check a native status and convert to `Result<(), StatusError>`.
pub const fn check(code: i32) -> Result<(), StatusError> {
    if code == CL_SUCCESS { Ok(()) } else { Err(StatusError::from_code(code)) }
}
