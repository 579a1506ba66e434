//! Run inputs: the assemblies to run and the options for the whole run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AssemblyConfig;
use crate::error::RunError;
use crate::filters::TestFilters;
use crate::reporter::{RunReporter, TracingReporter};
use crate::transform::TransformRegistry;

/// One test assembly with its optional config file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectAssembly {
    pub assembly_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub config: AssemblyConfig,
}

impl ProjectAssembly {
    pub fn new(assembly_path: impl Into<PathBuf>) -> Self {
        Self {
            assembly_path: rvt_deps::paths::absolute(assembly_path.into()),
            config_path: None,
            config: AssemblyConfig::default(),
        }
    }

    pub fn with_config_file(mut self, config_path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(rvt_deps::paths::absolute(config_path.into()));
        self
    }

    pub fn with_config(mut self, config: AssemblyConfig) -> Self {
        self.config = config;
        self
    }

    /// File stem of the assembly; the key results are recorded under.
    pub fn key(&self) -> String {
        self.assembly_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Folder the assembly lives in.
    pub fn folder(&self) -> &Path {
        self.assembly_path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// A requested output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRequest {
    /// Lower-cased transform name.
    pub format: String,
    pub path: PathBuf,
}

/// Options for one run. Read-only once the run starts.
#[derive(Clone)]
pub struct RunOptions {
    pub assemblies: Vec<ProjectAssembly>,
    /// Overrides every assembly's `parallelizeAssembly` when set.
    pub parallelize_assemblies: Option<bool>,
    /// Overrides every assembly's `parallelizeTestCollections` when set.
    pub parallelize_test_collections: Option<bool>,
    pub max_parallel_threads: Option<i32>,
    pub stop_on_fail: bool,
    pub fail_skips: bool,
    pub diagnostic_messages: bool,
    pub internal_diagnostic_messages: bool,
    pub no_app_domain: bool,
    pub filters: TestFilters,
    pub outputs: Vec<OutputRequest>,
    pub reporter: Arc<dyn RunReporter>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            assemblies: Vec::new(),
            parallelize_assemblies: None,
            parallelize_test_collections: None,
            max_parallel_threads: None,
            stop_on_fail: false,
            fail_skips: false,
            diagnostic_messages: false,
            internal_diagnostic_messages: false,
            no_app_domain: false,
            filters: TestFilters::default(),
            outputs: Vec::new(),
            reporter: Arc::new(TracingReporter),
        }
    }
}

impl std::fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOptions")
            .field("assemblies", &self.assemblies)
            .field("parallelize_assemblies", &self.parallelize_assemblies)
            .field("parallelize_test_collections", &self.parallelize_test_collections)
            .field("max_parallel_threads", &self.max_parallel_threads)
            .field("stop_on_fail", &self.stop_on_fail)
            .field("fail_skips", &self.fail_skips)
            .field("filters", &self.filters)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl RunOptions {
    pub fn new(assemblies: Vec<ProjectAssembly>) -> Self {
        Self {
            assemblies,
            ..Self::default()
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn RunReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Request an output file in `format`, checked against `transforms`.
    pub fn add_output(
        &mut self,
        transforms: &TransformRegistry,
        format: &str,
        path: impl Into<PathBuf>,
    ) -> Result<(), RunError> {
        let format = format.to_lowercase();
        if !transforms.contains(&format) {
            return Err(RunError::UnknownTransform(format));
        }
        let path = path.into();
        if self.outputs.iter().any(|o| o.format == format) {
            return Err(RunError::DuplicateOutput { format, path });
        }
        self.outputs.push(OutputRequest { format, path });
        Ok(())
    }

    /// `add_output` against the built-in transforms.
    pub fn with_output(mut self, format: &str, path: impl Into<PathBuf>) -> Result<Self, RunError> {
        self.add_output(&TransformRegistry::builtin(), format, path)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_file_stem() {
        let assembly = ProjectAssembly::new("/bin/My.Tests.dll");
        assert_eq!(assembly.key(), "My.Tests");
        assert_eq!(assembly.folder(), Path::new("/bin"));
    }

    #[test]
    fn test_unknown_output_rejected_on_add() {
        let err = RunOptions::default()
            .with_output("markdown", "/out/r.md")
            .unwrap_err();
        assert!(matches!(err, RunError::UnknownTransform(f) if f == "markdown"));
    }

    #[test]
    fn test_output_format_is_case_insensitive_and_unique() {
        let options = RunOptions::default().with_output("XML", "/out/a.xml").unwrap();
        assert_eq!(options.outputs[0].format, "xml");
        assert!(matches!(
            options.with_output("xml", "/out/b.xml"),
            Err(RunError::DuplicateOutput { .. })
        ));
    }
}
