//! Error types for rvt-deps

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading a dependency manifest.
///
/// Callers usually treat every variant the same way (skip manifest-based
/// resolution), but the variants stay distinct so diagnostics can say why.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// No manifest file at the expected location
    #[error("Dependency manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The document is not valid JSON or does not have the manifest shape
    #[error("Malformed dependency manifest: {0}")]
    Malformed(String),

    /// IO error while reading an existing manifest
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManifestError {
    /// Whether the manifest was present but could not be understood.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ManifestError::Malformed(_))
    }

    /// Whether the manifest file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ManifestError::NotFound(_))
    }
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        ManifestError::Malformed(err.to_string())
    }
}
