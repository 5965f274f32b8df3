//! Compiler options configuration.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Extra raw compiler options, whitespace separated.
pub const BUILD_OPTIONS_ENV: &str = "CL_PROGRAM_BUILD_OPTIONS";

/// Treat compiler warnings as errors when set to `1` or `true`.
pub const WERROR_ENV: &str = "CL_PROGRAM_WERROR";

/// Structured compiler options for [`crate::Program::build_with`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Raw options appended after everything else, in order.
    pub options: Vec<String>,
    /// Preprocessor definitions, rendered as `-D NAME` or `-D NAME=VALUE`.
    pub defines: Vec<(String, Option<String>)>,
    /// Header search directories, rendered as `-I <dir>`.
    pub include_dirs: Vec<PathBuf>,
    /// Render `-Werror`.
    pub warnings_as_errors: bool,
}

impl BuildConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration seeded from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply environment overrides on top of `self`.
    pub fn with_env(mut self) -> Self {
        if let Ok(extra) = env::var(BUILD_OPTIONS_ENV) {
            self.options.extend(extra.split_whitespace().map(str::to_owned));
        }
        if let Ok(v) = env::var(WERROR_ENV) {
            self.warnings_as_errors = v == "1" || v.eq_ignore_ascii_case("true");
        }
        self
    }

    /// Append a raw option.
    #[must_use]
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Add a preprocessor definition.
    #[must_use]
    pub fn define(mut self, name: impl Into<String>, value: Option<&str>) -> Self {
        self.defines.push((name.into(), value.map(str::to_owned)));
        self
    }

    /// Add a header search directory.
    #[must_use]
    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Set whether warnings fail the build.
    #[must_use]
    pub const fn warnings_as_errors(mut self, enabled: bool) -> Self {
        self.warnings_as_errors = enabled;
        self
    }

    /// Render the native options string.
    ///
    /// Order is defines, include directories, `-Werror`, then raw options.
    pub fn options_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.defines.len() + self.include_dirs.len() + self.options.len() + 1);
        for (name, value) in &self.defines {
            parts.push(match value {
                Some(value) => format!("-D {name}={value}"),
                None => format!("-D {name}"),
            });
        }
        for dir in &self.include_dirs {
            parts.push(format!("-I {}", dir.display()));
        }
        if self.warnings_as_errors {
            parts.push("-Werror".to_owned());
        }
        parts.extend(self.options.iter().cloned());
        parts.join(" ")
    }
}
