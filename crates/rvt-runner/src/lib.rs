//! RVT Runner - test-run orchestration for the RVT test runner
//!
//! ## Layer 1 - Orchestration
//!
//! - `orchestrator`: configure, execute and aggregate a batch of assemblies
//! - `framework`: traits a test framework implements to be driven
//! - `sinks`: discovery and execution sinks owned by the runner
//! - `aggregator`: per-assembly summaries, each key recorded once
//! - `reporter`: human-readable run messages
//! - `transform`: xml, xmlv1, html, nunit and json output files
//!
//! Dependency resolution comes from `rvt-deps` (Layer 0).

pub mod aggregator;
pub mod cancel;
pub mod config;
pub mod error;
pub mod fakes;
pub mod filters;
pub mod framework;
pub mod obs;
pub mod options;
pub mod orchestrator;
pub mod report;
pub mod reporter;
pub mod sinks;
pub mod telemetry;
pub mod transform;

pub use aggregator::ResultAggregator;
pub use cancel::CancellationFlag;
pub use config::{AppDomainSupport, AssemblyConfig};
pub use error::{AggregateError, RunError, TransformError};
pub use filters::TestFilters;
pub use framework::{
    AssemblyContext, DiscoveryOptions, DiscoverySink, ExecutionOptions, ExecutionSink,
    ExecutionSummary, FrontController, TestCase, TestEvent, TestFramework,
};
pub use options::{OutputRequest, ProjectAssembly, RunOptions};
pub use orchestrator::{RunOrchestrator, RunOutcome, RunState};
pub use report::{AssemblyReport, RunReport, TestResult, TestResultKind};
pub use reporter::{NullReporter, RunReporter, RunnerMessage, TracingReporter, TranscriptReporter};
pub use telemetry::init_tracing;
pub use transform::{Transform, TransformRegistry};
