//! Error types for program build and kernel extraction.

use crate::status::StatusError;

/// A build failure enriched with per-device compiler logs.
///
/// Only produced when at least one device contributed a log section.
/// Renders as a `status=<status>` line followed by each section.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status={status}{}", render_sections(sections))]
pub struct BuildError {
    status: StatusError,
    sections: Vec<String>,
}

impl BuildError {
    pub(crate) fn new(status: StatusError, sections: Vec<String>) -> Self {
        Self { status, sections }
    }

    /// The native status the build failed with.
    pub const fn status(&self) -> StatusError {
        self.status
    }

    /// Per-device sections, in device resolution order.
    pub fn sections(&self) -> &[String] {
        &self.sections
    }
}

fn render_sections(sections: &[String]) -> String {
    sections.iter().map(|section| format!("\n{section}")).collect()
}

/// Errors from [`crate::Program`] and [`crate::Kernel`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A native call failed, or a guard rejected a released program or a
    /// null device.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// The build failed and no device set could be found to fetch logs for.
    #[error("cl: build error ({status}; log unavailable: {reason})")]
    LogUnavailable {
        /// The native build status.
        status: StatusError,
        /// Why the device set could not be determined.
        reason: StatusError,
    },

    /// The build failed with compiler diagnostics.
    #[error(transparent)]
    Build(#[from] BuildError),
}

impl Error {
    /// The operative native status behind this error.
    pub const fn status(&self) -> StatusError {
        match self {
            Self::Status(status) | Self::LogUnavailable { status, .. } => *status,
            Self::Build(build) => build.status(),
        }
    }

    /// Whether this error carries compiler diagnostics.
    pub const fn is_build_log(&self) -> bool {
        matches!(self, Self::Build(_))
    }
}

/// Convenience result type for program operations.
pub type Result<T> = std::result::Result<T, Error>;
