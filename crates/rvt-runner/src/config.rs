//! Per-assembly configuration (`xunit.runner.json` style).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::RunError;

/// App-domain isolation requested for an assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AppDomainSupport {
    #[default]
    IfAvailable,
    Required,
    Denied,
}

/// Configuration read from an assembly's JSON config file.
///
/// Every field is optional; the `*_or_default` accessors give the
/// framework default when a value is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_domain: Option<AppDomainSupport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic_messages: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_diagnostic_messages: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_running_test_seconds: Option<u32>,

    /// `0` means one thread per processor, `-1` means unlimited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_threads: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelize_assembly: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelize_test_collections: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_enumerate_theories: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_copy: Option<bool>,
}

impl AssemblyConfig {
    /// Read a config file. Unknown keys are ignored.
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let content = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => RunError::FileNotFound(path.to_path_buf()),
            _ => RunError::Io(err),
        })?;
        Self::parse_str(&content).map_err(|source| RunError::InvalidConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn app_domain_or_default(&self) -> AppDomainSupport {
        self.app_domain.unwrap_or_default()
    }

    pub fn diagnostic_messages_or_default(&self) -> bool {
        self.diagnostic_messages.unwrap_or(false)
    }

    pub fn internal_diagnostic_messages_or_default(&self) -> bool {
        self.internal_diagnostic_messages.unwrap_or(false)
    }

    /// `0` disables long-running detection.
    pub fn long_running_test_seconds_or_default(&self) -> u32 {
        self.long_running_test_seconds.unwrap_or(0)
    }

    pub fn max_parallel_threads_or_default(&self) -> i32 {
        match self.max_parallel_threads {
            Some(threads) if threads != 0 => threads,
            _ => std::thread::available_parallelism()
                .map(|n| n.get() as i32)
                .unwrap_or(1),
        }
    }

    pub fn parallelize_assembly_or_default(&self) -> bool {
        self.parallelize_assembly.unwrap_or(false)
    }

    pub fn parallelize_test_collections_or_default(&self) -> bool {
        self.parallelize_test_collections.unwrap_or(true)
    }

    pub fn pre_enumerate_theories_or_default(&self) -> bool {
        self.pre_enumerate_theories.unwrap_or(true)
    }

    pub fn shadow_copy_or_default(&self) -> bool {
        self.shadow_copy.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = AssemblyConfig::parse_str("{}").unwrap();
        assert!(!config.parallelize_assembly_or_default());
        assert!(config.parallelize_test_collections_or_default());
        assert!(config.shadow_copy_or_default());
        assert_eq!(config.app_domain_or_default(), AppDomainSupport::IfAvailable);
        assert_eq!(config.long_running_test_seconds_or_default(), 0);
        assert!(config.max_parallel_threads_or_default() >= 1);
    }

    #[test]
    fn test_camel_case_keys() {
        let config = AssemblyConfig::parse_str(
            r#"{
              "parallelizeAssembly": true,
              "parallelizeTestCollections": false,
              "maxParallelThreads": -1,
              "diagnosticMessages": true,
              "appDomain": "denied",
              "longRunningTestSeconds": 5,
              "methodDisplay": "method"
            }"#,
        )
        .unwrap();
        assert!(config.parallelize_assembly_or_default());
        assert!(!config.parallelize_test_collections_or_default());
        assert_eq!(config.max_parallel_threads_or_default(), -1);
        assert!(config.diagnostic_messages_or_default());
        assert_eq!(config.app_domain_or_default(), AppDomainSupport::Denied);
        assert_eq!(config.long_running_test_seconds_or_default(), 5);
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.json");
        assert!(matches!(
            AssemblyConfig::load(&missing),
            Err(RunError::FileNotFound(_))
        ));

        let bad = tmp.path().join("bad.json");
        std::fs::write(&bad, "{ \"parallelizeAssembly\": \"yes\" }").unwrap();
        assert!(matches!(
            AssemblyConfig::load(&bad),
            Err(RunError::InvalidConfig { .. })
        ));
    }
}
