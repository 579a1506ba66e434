//! Probe settings: package roots and the runtime identifier.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::runtime::current_runtime_identifier;

/// Environment variable that overrides the package cache root.
pub const PACKAGES_ENV_VAR: &str = "NUGET_PACKAGES";

/// Where and for which runtime the resolver probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Candidate package roots in priority order.
    pub package_roots: Vec<PathBuf>,

    /// Runtime identifier used to pick asset groups.
    pub runtime_identifier: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ProbeSettings {
    /// Settings derived from `NUGET_PACKAGES`, the home directory and the
    /// host platform.
    pub fn from_env() -> Self {
        Self {
            package_roots: default_package_roots(),
            runtime_identifier: current_runtime_identifier(),
        }
    }

    /// Explicit package roots, current runtime identifier.
    pub fn with_package_roots(package_roots: Vec<PathBuf>) -> Self {
        Self {
            package_roots,
            runtime_identifier: current_runtime_identifier(),
        }
    }

    pub fn runtime_identifier(mut self, rid: impl Into<String>) -> Self {
        self.runtime_identifier = rid.into();
        self
    }
}

/// Package roots from the environment.
pub fn default_package_roots() -> Vec<PathBuf> {
    package_roots_from(std::env::var_os(PACKAGES_ENV_VAR), dirs::home_dir())
}

/// Package roots for an optional override and an optional home directory.
///
/// A non-empty override is the only root; otherwise `<home>/.nuget/packages`.
pub fn package_roots_from(override_dir: Option<OsString>, home: Option<PathBuf>) -> Vec<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.is_empty()) {
        return vec![PathBuf::from(dir)];
    }
    home.map(|home| vec![home.join(".nuget").join("packages")])
        .unwrap_or_default()
}
