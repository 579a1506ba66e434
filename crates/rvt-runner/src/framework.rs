//! Collaborator traits for the unit-testing framework.
//!
//! The runner never discovers or executes tests itself. A `TestFramework`
//! opens a `FrontController` per assembly; the controller streams test
//! cases and test events into sinks owned by the runner. A sink returning
//! `false` asks the framework to stop as soon as it can.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};
use std::sync::Arc;

use rvt_deps::{DiagnosticSink, LoadedAssembly, ResolverRegistry};

use crate::config::AppDomainSupport;
use crate::options::ProjectAssembly;

/// A discovered test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub unique_id: String,
    pub display_name: String,
    /// Fully qualified class name (`My.Tests.MathTests`).
    pub class_name: String,
    pub method_name: String,
    #[serde(default)]
    pub traits: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl TestCase {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        let method_name = method_name.into();
        let display_name = format!("{}.{}", class_name, method_name);
        Self {
            unique_id: display_name.clone(),
            display_name,
            class_name,
            method_name,
            traits: BTreeMap::new(),
            skip_reason: None,
        }
    }

    pub fn with_trait(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.traits.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Namespace portion of the class name; empty for a global class.
    pub fn namespace(&self) -> &str {
        self.class_name
            .rsplit_once('.')
            .map(|(namespace, _)| namespace)
            .unwrap_or("")
    }

    pub fn has_trait(&self, name: &str, value: &str) -> bool {
        self.traits
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .any(|(_, values)| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
    }
}

/// Events a framework reports while executing test cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestEvent {
    Starting {
        case: TestCase,
    },
    Passed {
        case: TestCase,
        elapsed_ms: u64,
        #[serde(default)]
        output: String,
    },
    Failed {
        case: TestCase,
        elapsed_ms: u64,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack_trace: Option<String>,
        #[serde(default)]
        output: String,
    },
    Skipped {
        case: TestCase,
        reason: String,
    },
    /// Framework-level failure outside any single test (counts as an error).
    Error {
        message: String,
    },
}

impl TestEvent {
    pub fn case(&self) -> Option<&TestCase> {
        match self {
            TestEvent::Starting { case }
            | TestEvent::Passed { case, .. }
            | TestEvent::Failed { case, .. }
            | TestEvent::Skipped { case, .. } => Some(case),
            TestEvent::Error { .. } => None,
        }
    }
}

/// Totals for one execution: immutable once produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: u32,
    pub failed: u32,
    pub skipped: u32,
    pub errors: u32,
    pub elapsed_ms: u64,
}

impl ExecutionSummary {
    pub fn passed(&self) -> u32 {
        self.total.saturating_sub(self.failed + self.skipped)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

impl Add for ExecutionSummary {
    type Output = ExecutionSummary;

    fn add(self, other: ExecutionSummary) -> ExecutionSummary {
        ExecutionSummary {
            total: self.total + other.total,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
            errors: self.errors + other.errors,
            elapsed_ms: self.elapsed_ms + other.elapsed_ms,
        }
    }
}

impl AddAssign for ExecutionSummary {
    fn add_assign(&mut self, other: ExecutionSummary) {
        *self = *self + other;
    }
}

/// Options handed to `FrontController::find`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub include_source_information: bool,
    pub pre_enumerate_theories: bool,
    pub diagnostic_messages: bool,
    pub internal_diagnostic_messages: bool,
}

/// Options handed to `FrontController::run_tests`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub stop_on_fail: bool,
    pub max_parallel_threads: Option<i32>,
    pub disable_parallelization: Option<bool>,
    pub diagnostic_messages: bool,
    pub internal_diagnostic_messages: bool,
    pub app_domain: AppDomainSupport,
    pub shadow_copy: bool,
}

/// Receives discovered test cases.
pub trait DiscoverySink: Send + Sync {
    /// Returns `false` to ask the framework to stop discovering.
    fn on_test_case(&self, case: TestCase) -> bool;
}

/// Receives execution events.
pub trait ExecutionSink: Send + Sync {
    /// Returns `false` to ask the framework to stop executing.
    fn on_event(&self, event: &TestEvent) -> bool;
}

/// What the runner hands a framework when it opens an assembly.
#[derive(Clone)]
pub struct AssemblyContext {
    /// Dependency resolution installed for this assembly's run.
    pub registry: Arc<ResolverRegistry>,
    /// Set when the assembly's `diagnosticMessages` flag is on.
    pub diagnostics: Option<Arc<dyn DiagnosticSink>>,
    /// Set when the assembly's `internalDiagnosticMessages` flag is on.
    pub internal_diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl AssemblyContext {
    /// Resolve a dependency through the installed strategies.
    pub fn resolve(&self, name: &str) -> Option<LoadedAssembly> {
        self.registry.resolve(name)
    }
}

impl std::fmt::Debug for AssemblyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyContext")
            .field("registry", &self.registry)
            .field("diagnostics", &self.diagnostics.is_some())
            .field("internal_diagnostics", &self.internal_diagnostics.is_some())
            .finish()
    }
}

/// Discovery and execution for one opened assembly.
#[async_trait]
pub trait FrontController: Send + Sync {
    /// Framework name and version, for reports.
    fn framework_name(&self) -> String {
        "unknown".to_string()
    }

    /// Target framework environment, for reports.
    fn environment(&self) -> String {
        String::new()
    }

    async fn find(&self, sink: &dyn DiscoverySink, options: &DiscoveryOptions)
        -> anyhow::Result<()>;

    async fn run_tests(
        &self,
        cases: Vec<TestCase>,
        sink: &dyn ExecutionSink,
        options: &ExecutionOptions,
    ) -> anyhow::Result<()>;
}

/// Opens assemblies for discovery and execution.
#[async_trait]
pub trait TestFramework: Send + Sync {
    async fn open(
        &self,
        assembly: &ProjectAssembly,
        context: AssemblyContext,
    ) -> anyhow::Result<Box<dyn FrontController>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_namespace() {
        assert_eq!(TestCase::new("My.Tests.MathTests", "Adds").namespace(), "My.Tests");
        assert_eq!(TestCase::new("Global", "Adds").namespace(), "");
    }

    #[test]
    fn test_case_traits_compare_case_insensitively() {
        let case = TestCase::new("A", "B").with_trait("Category", "Slow");
        assert!(case.has_trait("category", "slow"));
        assert!(!case.has_trait("Category", "Fast"));
    }

    #[test]
    fn test_summary_addition() {
        let a = ExecutionSummary {
            total: 3,
            failed: 1,
            skipped: 0,
            errors: 0,
            elapsed_ms: 100,
        };
        let b = ExecutionSummary {
            total: 2,
            failed: 0,
            skipped: 1,
            errors: 1,
            elapsed_ms: 50,
        };
        let sum = a + b;
        assert_eq!(sum.total, 5);
        assert_eq!(sum.failed, 1);
        assert_eq!(sum.passed(), 3);
        assert_eq!(sum.elapsed_ms, 150);
    }
}
