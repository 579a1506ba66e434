//! Error types for run configuration, aggregation and output transforms.

use std::path::PathBuf;
use thiserror::Error;

/// Problems found while configuring a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid configuration file '{}': {source}", path.display())]
    InvalidConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown output format '{0}'")]
    UnknownTransform(String),

    #[error("output '{format}' already requested for '{}'", path.display())]
    DuplicateOutput { format: String, path: PathBuf },

    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result aggregation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("a summary for '{0}' was already recorded")]
    Duplicate(String),
}

/// Output transform errors.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("unknown output format '{0}'")]
    UnknownFormat(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<handlebars::RenderError> for TransformError {
    fn from(err: handlebars::RenderError) -> Self {
        TransformError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for TransformError {
    fn from(err: handlebars::TemplateError) -> Self {
        TransformError::Template(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_display() {
        let err = RunError::FileNotFound(PathBuf::from("/bin/A.dll"));
        assert_eq!(err.to_string(), "File not found: /bin/A.dll");
    }

    #[test]
    fn test_invalid_config_keeps_source() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = RunError::InvalidConfig {
            path: PathBuf::from("/bin/xunit.runner.json"),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("xunit.runner.json"));
    }
}
