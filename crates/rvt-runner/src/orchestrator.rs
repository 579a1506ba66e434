//! Run orchestration: configure assemblies, execute them sequentially or in
//! parallel, aggregate their summaries and render the requested outputs.
//!
//! States move `Idle -> Configuring -> Running -> (Cancelling) -> Completed`.
//! A failure inside one assembly is logged and flagged on the outcome; it
//! never stops the other assemblies.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::task::JoinError;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use rvt_deps::{
    AssemblyLoader, AssemblyResolutionCache, DependencyContextResolver, DiagnosticSink,
    FileSystemProbe, PathLoader, ProbeSettings, RealFileSystem, ResolveStrategy, ResolverRegistry,
    TracingDiagnostics,
};

use crate::aggregator::ResultAggregator;
use crate::cancel::CancellationFlag;
use crate::config::{AppDomainSupport, AssemblyConfig};
use crate::error::RunError;
use crate::filters::TestFilters;
use crate::framework::{
    AssemblyContext, DiscoveryOptions, ExecutionOptions, ExecutionSummary, TestCase,
    TestFramework,
};
use crate::obs;
use crate::options::{ProjectAssembly, RunOptions};
use crate::report::{AssemblyReport, RunReport};
use crate::reporter::{RunReporter, RunnerMessage};
use crate::sinks::{DiscoveryCollector, ExecutionChain};
use crate::transform::TransformRegistry;

/// Lifecycle state of an orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Configuring,
    Running,
    Cancelling,
    Completed,
}

/// Result of a whole run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Uuid,
    /// Per-assembly summaries ordered by key.
    pub summaries: Vec<(String, ExecutionSummary)>,
    pub total: ExecutionSummary,
    /// Stop-on-fail (or the host) cancelled the run.
    pub cancelled: bool,
    /// At least one assembly or output failed outside its tests.
    pub infrastructure_failed: bool,
    /// Assemblies dropped while configuring (missing file or bad config).
    pub skipped_assemblies: Vec<PathBuf>,
    /// Output files written.
    pub outputs: Vec<PathBuf>,
    pub elapsed_ms: u64,
    pub report: RunReport,
}

impl RunOutcome {
    pub fn total_failures(&self) -> u32 {
        self.total.failed
    }

    /// `-1` when cancelled; otherwise the failure count, at least `1` when
    /// the run hit an infrastructure failure.
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            return -1;
        }
        let failures = i32::try_from(self.total.failed).unwrap_or(i32::MAX);
        if self.infrastructure_failed {
            failures.max(1)
        } else {
            failures
        }
    }
}

/// An assembly that passed configuration, with its resolved options.
#[derive(Debug, Clone)]
struct ConfiguredAssembly {
    assembly: ProjectAssembly,
    discovery: DiscoveryOptions,
    execution: ExecutionOptions,
    long_running: Option<Duration>,
}

/// Everything an assembly task shares with the run.
struct RunContext {
    run_id: String,
    framework: Arc<dyn TestFramework>,
    registry: Arc<ResolverRegistry>,
    caches: ResolutionCaches,
    probe: Arc<dyn FileSystemProbe>,
    loader: Arc<dyn AssemblyLoader>,
    settings: ProbeSettings,
    reporter: Arc<dyn RunReporter>,
    filters: TestFilters,
    fail_skips: bool,
    stop_on_fail: bool,
    cancel: CancellationFlag,
    aggregator: ResultAggregator,
    reports: Mutex<Vec<AssemblyReport>>,
    state: Arc<Mutex<RunState>>,
}

impl RunContext {
    fn set_state(&self, state: RunState) {
        *lock(&self.state) = state;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Resolution caches, one per assembly path unless a shared cache is set.
#[derive(Debug, Clone, Default)]
struct ResolutionCaches {
    shared: Option<Arc<AssemblyResolutionCache>>,
    per_assembly: Arc<Mutex<HashMap<PathBuf, Arc<AssemblyResolutionCache>>>>,
}

impl ResolutionCaches {
    fn for_assembly(&self, assembly_path: &Path) -> Arc<AssemblyResolutionCache> {
        if let Some(shared) = &self.shared {
            return Arc::clone(shared);
        }
        let mut caches = lock(&self.per_assembly);
        Arc::clone(caches.entry(assembly_path.to_path_buf()).or_default())
    }

    fn get(&self, assembly_path: &Path) -> Option<Arc<AssemblyResolutionCache>> {
        match &self.shared {
            Some(shared) => Some(Arc::clone(shared)),
            None => lock(&self.per_assembly).get(assembly_path).cloned(),
        }
    }
}

/// Runs test assemblies through a `TestFramework`.
pub struct RunOrchestrator {
    framework: Arc<dyn TestFramework>,
    registry: Arc<ResolverRegistry>,
    caches: ResolutionCaches,
    probe: Arc<dyn FileSystemProbe>,
    loader: Arc<dyn AssemblyLoader>,
    settings: ProbeSettings,
    transforms: TransformRegistry,
    state: Arc<Mutex<RunState>>,
    cancel: Mutex<CancellationFlag>,
}

impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("state", &self.state())
            .field("settings", &self.settings)
            .field("transforms", &self.transforms)
            .finish_non_exhaustive()
    }
}

impl RunOrchestrator {
    pub fn new(framework: Arc<dyn TestFramework>) -> Self {
        Self {
            framework,
            registry: ResolverRegistry::new(),
            caches: ResolutionCaches::default(),
            probe: Arc::new(RealFileSystem),
            loader: Arc::new(PathLoader),
            settings: ProbeSettings::default(),
            transforms: TransformRegistry::builtin(),
            state: Arc::new(Mutex::new(RunState::Idle)),
            cancel: Mutex::new(CancellationFlag::new()),
        }
    }

    /// Host registry that sees every running assembly's resolver, in
    /// addition to the assembly's own scoped registry.
    pub fn with_registry(mut self, registry: Arc<ResolverRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Share one cache between all assemblies instead of one per assembly.
    pub fn with_cache(mut self, cache: Arc<AssemblyResolutionCache>) -> Self {
        self.caches.shared = Some(cache);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn FileSystemProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn AssemblyLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_probe_settings(mut self, settings: ProbeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn state(&self) -> RunState {
        *lock(&self.state)
    }

    pub fn registry(&self) -> &Arc<ResolverRegistry> {
        &self.registry
    }

    /// Cache used for the assembly at `assembly_path`, once it has run.
    pub fn cache_for(&self, assembly_path: &Path) -> Option<Arc<AssemblyResolutionCache>> {
        self.caches.get(assembly_path)
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    /// Cancel the current run. No assembly starts afterwards.
    pub fn cancel(&self) {
        if lock(&self.cancel).cancel() {
            let mut state = lock(&self.state);
            if *state == RunState::Running {
                *state = RunState::Cancelling;
            }
        }
    }

    /// Execute every assembly in `options`.
    pub async fn run(&self, options: RunOptions) -> anyhow::Result<RunOutcome> {
        {
            let mut state = lock(&self.state);
            if matches!(
                *state,
                RunState::Configuring | RunState::Running | RunState::Cancelling
            ) {
                return Err(RunError::AlreadyRunning.into());
            }
            *state = RunState::Configuring;
        }

        let run_uuid = Uuid::new_v4();
        let run_id = run_uuid.to_string();
        let started_at = Utc::now();
        let started = Instant::now();
        let cancel = {
            let mut current = lock(&self.cancel);
            *current = CancellationFlag::new();
            current.clone()
        };

        let (configured, skipped_assemblies) = self.configure(&options);
        let parallel = options.parallelize_assemblies.unwrap_or_else(|| {
            !configured.is_empty()
                && configured
                    .iter()
                    .all(|c| c.assembly.config.parallelize_assembly_or_default())
        });

        let ctx = Arc::new(RunContext {
            run_id: run_id.clone(),
            framework: Arc::clone(&self.framework),
            registry: Arc::clone(&self.registry),
            caches: self.caches.clone(),
            probe: Arc::clone(&self.probe),
            loader: Arc::clone(&self.loader),
            settings: self.settings.clone(),
            reporter: Arc::clone(&options.reporter),
            filters: options.filters.clone(),
            fail_skips: options.fail_skips,
            stop_on_fail: options.stop_on_fail,
            cancel,
            aggregator: ResultAggregator::new(),
            reports: Mutex::new(Vec::new()),
            state: Arc::clone(&self.state),
        });

        ctx.set_state(RunState::Running);
        obs::emit_run_started(&run_id, configured.len(), parallel);

        let mut infrastructure_failed = execute_all(&ctx, configured, parallel)
            .instrument(obs::run_span(&run_id))
            .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let summaries = ctx.aggregator.summaries();
        if !summaries.is_empty() {
            ctx.reporter.report(&RunnerMessage::TestExecutionSummary {
                elapsed_ms,
                summaries: summaries.clone(),
            });
        }

        let report = RunReport::new(run_uuid, started_at, std::mem::take(&mut *lock(&ctx.reports)));
        let mut outputs = Vec::new();
        for request in &options.outputs {
            match self.transforms.apply(&request.format, &report, &request.path) {
                Ok(()) => {
                    info!(format = %request.format, path = %request.path.display(), "Wrote output");
                    outputs.push(request.path.clone());
                }
                Err(err) => {
                    error!(format = %request.format, path = %request.path.display(), error = %err, "Failed to write output");
                    infrastructure_failed = true;
                }
            }
        }

        let cancelled = ctx.cancel.is_cancelled();
        let total = ctx.aggregator.total();
        ctx.set_state(RunState::Completed);
        obs::emit_run_finished(&run_id, elapsed_ms, total.failed, cancelled, infrastructure_failed);

        Ok(RunOutcome {
            run_id: run_uuid,
            summaries,
            total,
            cancelled,
            infrastructure_failed,
            skipped_assemblies,
            outputs,
            elapsed_ms,
            report,
        })
    }

    /// Validate inputs, load config files and apply run-wide overrides.
    fn configure(&self, options: &RunOptions) -> (Vec<ConfiguredAssembly>, Vec<PathBuf>) {
        let mut configured = Vec::new();
        let mut skipped = Vec::new();

        for assembly in &options.assemblies {
            match self.configure_assembly(assembly, options) {
                Ok(assembly) => configured.push(assembly),
                Err(err) => {
                    error!(assembly = %assembly.assembly_path.display(), "{}", err);
                    options.reporter.report(&RunnerMessage::Error {
                        assembly: Some(assembly.key()),
                        message: err.to_string(),
                    });
                    skipped.push(assembly.assembly_path.clone());
                }
            }
        }

        (configured, skipped)
    }

    fn configure_assembly(
        &self,
        assembly: &ProjectAssembly,
        options: &RunOptions,
    ) -> Result<ConfiguredAssembly, RunError> {
        if !self.probe.file_exists(&assembly.assembly_path) {
            return Err(RunError::FileNotFound(assembly.assembly_path.clone()));
        }

        let mut assembly = assembly.clone();
        if let Some(config_path) = &assembly.config_path {
            if !self.probe.file_exists(config_path) {
                return Err(RunError::FileNotFound(config_path.clone()));
            }
            assembly.config = AssemblyConfig::load(config_path)?;
        }

        let config = &mut assembly.config;
        config.pre_enumerate_theories = Some(false);
        if options.diagnostic_messages {
            config.diagnostic_messages = Some(true);
        }
        if options.internal_diagnostic_messages {
            config.internal_diagnostic_messages = Some(true);
        }
        if options.no_app_domain {
            config.app_domain = Some(AppDomainSupport::Denied);
        }

        let discovery = DiscoveryOptions {
            include_source_information: false,
            pre_enumerate_theories: config.pre_enumerate_theories_or_default(),
            diagnostic_messages: config.diagnostic_messages_or_default(),
            internal_diagnostic_messages: config.internal_diagnostic_messages_or_default(),
        };
        let execution = ExecutionOptions {
            stop_on_fail: options.stop_on_fail,
            max_parallel_threads: options.max_parallel_threads.or(config.max_parallel_threads),
            disable_parallelization: options
                .parallelize_test_collections
                .or(config.parallelize_test_collections)
                .map(|parallelize| !parallelize),
            diagnostic_messages: config.diagnostic_messages_or_default(),
            internal_diagnostic_messages: config.internal_diagnostic_messages_or_default(),
            app_domain: config.app_domain_or_default(),
            shadow_copy: config.shadow_copy_or_default(),
        };
        let long_running = match config.long_running_test_seconds_or_default() {
            0 => None,
            seconds => Some(Duration::from_secs(u64::from(seconds))),
        };

        Ok(ConfiguredAssembly {
            assembly,
            discovery,
            execution,
            long_running,
        })
    }
}

/// Run every assembly; returns whether any of them failed outside its tests.
async fn execute_all(ctx: &Arc<RunContext>, configured: Vec<ConfiguredAssembly>, parallel: bool) -> bool {
    let mut infrastructure_failed = false;

    if parallel {
        let (keys, tasks): (Vec<String>, Vec<_>) = configured
            .into_iter()
            .map(|assembly| {
                let key = assembly.assembly.key();
                let span = obs::assembly_span(&key);
                let task = tokio::spawn(execute_assembly(Arc::clone(ctx), assembly).instrument(span));
                (key, task)
            })
            .unzip();

        for (key, joined) in keys.iter().zip(join_all(tasks).await) {
            if !settle(ctx, key, joined) {
                infrastructure_failed = true;
            }
        }
    } else {
        for assembly in configured {
            let key = assembly.assembly.key();
            let span = obs::assembly_span(&key);
            let joined = tokio::spawn(execute_assembly(Arc::clone(ctx), assembly).instrument(span)).await;
            if !settle(ctx, &key, joined) {
                infrastructure_failed = true;
            }
        }
    }

    infrastructure_failed
}

/// Log a failed assembly task with its whole cause chain.
fn settle(ctx: &RunContext, key: &str, joined: Result<anyhow::Result<()>, JoinError>) -> bool {
    let err = match joined {
        Ok(Ok(())) => return true,
        Ok(Err(err)) => err,
        Err(join_err) => anyhow::Error::new(join_err).context(format!("assembly task for '{}' did not complete", key)),
    };
    let message = format!("{:#}", err);
    error!(assembly = %key, error = %message, "Assembly execution failed");
    ctx.reporter.report(&RunnerMessage::Error {
        assembly: Some(key.to_string()),
        message,
    });
    false
}

fn diagnostic_sink(enabled: bool, sink: impl FnOnce() -> TracingDiagnostics) -> Option<Arc<dyn DiagnosticSink>> {
    if enabled {
        Some(Arc::new(sink()))
    } else {
        None
    }
}

/// Discover, filter and execute one assembly, with its dependency
/// resolution installed for the whole time.
async fn execute_assembly(ctx: Arc<RunContext>, configured: ConfiguredAssembly) -> anyhow::Result<()> {
    let ConfiguredAssembly {
        assembly,
        discovery,
        execution,
        long_running,
    } = configured;
    let key = assembly.key();

    if ctx.cancel.is_cancelled() {
        debug!(assembly = %key, "Skipping assembly after cancellation");
        return Ok(());
    }
    obs::emit_assembly_started(&ctx.run_id, &key);
    let run_at: DateTime<Utc> = Utc::now();

    let diagnostics = diagnostic_sink(discovery.diagnostic_messages, || TracingDiagnostics::new(&key));
    let internal_diagnostics =
        diagnostic_sink(discovery.internal_diagnostic_messages, || TracingDiagnostics::internal(&key));

    let resolver: Arc<dyn ResolveStrategy> = Arc::new(DependencyContextResolver::for_assembly(
        &assembly.assembly_path,
        &ctx.settings,
        Arc::clone(&ctx.probe),
        ctx.caches.for_assembly(&assembly.assembly_path),
        Arc::clone(&ctx.loader),
        internal_diagnostics.clone(),
    ));
    // The framework only sees this assembly's resolver; the host registry
    // sees every running one.
    let scoped = ResolverRegistry::new();
    let _scoped_subscription = scoped.subscribe(Arc::clone(&resolver));
    let _host_subscription = ctx.registry.subscribe(resolver);

    let context = AssemblyContext {
        registry: scoped,
        diagnostics,
        internal_diagnostics,
    };
    let controller = ctx
        .framework
        .open(&assembly, context)
        .await
        .with_context(|| format!("failed to open '{}'", assembly.assembly_path.display()))?;

    ctx.reporter.report(&RunnerMessage::DiscoveryStarting {
        assembly: key.clone(),
        parallelize_test_collections: !execution.disable_parallelization.unwrap_or(false),
        max_parallel_threads: execution
            .max_parallel_threads
            .unwrap_or_else(|| assembly.config.max_parallel_threads_or_default()),
    });
    let collector = DiscoveryCollector::new(ctx.cancel.clone());
    controller
        .find(&collector, &discovery)
        .await
        .with_context(|| format!("discovery failed for '{}'", key))?;
    let discovered = collector.into_cases();
    let discovered_count = discovered.len();
    let to_run: Vec<TestCase> = discovered
        .into_iter()
        .filter(|case| ctx.filters.matches(case))
        .collect();
    ctx.reporter.report(&RunnerMessage::DiscoveryFinished {
        assembly: key.clone(),
        discovered: discovered_count,
        to_run: to_run.len(),
    });

    if ctx.cancel.is_cancelled() {
        debug!(assembly = %key, "Skipping execution after cancellation");
        return Ok(());
    }

    let (summary, tests, errors) = if to_run.is_empty() {
        (ExecutionSummary::default(), Vec::new(), Vec::new())
    } else {
        ctx.reporter.report(&RunnerMessage::ExecutionStarting {
            assembly: key.clone(),
            test_count: to_run.len(),
        });
        let chain = ExecutionChain::build(
            &key,
            Arc::clone(&ctx.reporter),
            ctx.cancel.clone(),
            ctx.fail_skips,
            long_running,
        );
        controller
            .run_tests(to_run, chain.sink(), &execution)
            .await
            .with_context(|| format!("execution failed for '{}'", key))?;
        let summary = chain.summary();
        ctx.reporter.report(&RunnerMessage::ExecutionFinished {
            assembly: key.clone(),
            summary,
        });
        (summary, chain.results(), chain.errors())
    };

    ctx.aggregator.record(key.clone(), summary)?;
    lock(&ctx.reports).push(AssemblyReport {
        name: key.clone(),
        assembly_path: assembly.assembly_path.display().to_string(),
        config_path: assembly.config_path.as_ref().map(|p| p.display().to_string()),
        test_framework: controller.framework_name(),
        environment: controller.environment(),
        run_at,
        summary,
        tests,
        errors,
    });
    obs::emit_assembly_finished(&ctx.run_id, &key, summary.total, summary.failed, summary.elapsed_ms);

    if ctx.stop_on_fail && summary.failed > 0 && ctx.cancel.cancel() {
        obs::emit_run_cancelling(&ctx.run_id, &key, summary.failed);
        ctx.set_state(RunState::Cancelling);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(failed: u32, cancelled: bool, infrastructure_failed: bool) -> RunOutcome {
        let total = ExecutionSummary {
            total: 10,
            failed,
            ..ExecutionSummary::default()
        };
        RunOutcome {
            run_id: Uuid::nil(),
            summaries: Vec::new(),
            total,
            cancelled,
            infrastructure_failed,
            skipped_assemblies: Vec::new(),
            outputs: Vec::new(),
            elapsed_ms: 0,
            report: RunReport::new(Uuid::nil(), Utc::now(), Vec::new()),
        }
    }

    #[test]
    fn test_exit_code() {
        assert_eq!(outcome(0, false, false).exit_code(), 0);
        assert_eq!(outcome(3, false, false).exit_code(), 3);
        assert_eq!(outcome(0, false, true).exit_code(), 1);
        assert_eq!(outcome(4, false, true).exit_code(), 4);
        assert_eq!(outcome(2, true, false).exit_code(), -1);
    }
}
