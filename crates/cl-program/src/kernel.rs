//! Kernel entry points extracted from a built program.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::native::{ComputeApi, KernelHandle};

/// A named kernel created by [`crate::Program::create_kernel`].
///
/// Owns one native kernel reference. The native layer keeps the program's
/// code alive for as long as the kernel exists, so a kernel outlives the
/// [`crate::Program`] it came from.
pub struct Kernel {
    api: Arc<dyn ComputeApi>,
    handle: Option<KernelHandle>,
    name: String,
}

impl Kernel {
    pub(crate) fn new(api: Arc<dyn ComputeApi>, handle: KernelHandle, name: String) -> Self {
        Self { api, handle: Some(handle), name }
    }

    /// Entry-point name the kernel was created for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The native handle, or `None` once released.
    pub const fn handle(&self) -> Option<KernelHandle> {
        self.handle
    }

    /// Whether the native handle has been released.
    pub const fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Release the native kernel. Idempotent.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!(kernel = %handle, name = %self.name, "releasing kernel");
            if let Err(status) = self.api.release_kernel(handle) {
                warn!(kernel = %handle, %status, "native kernel release reported failure");
            }
        }
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel").field("name", &self.name).field("handle", &self.handle).finish()
    }
}
