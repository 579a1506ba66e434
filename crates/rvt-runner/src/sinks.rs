//! Discovery and execution sinks owned by the runner.
//!
//! Execution events pass through a delegating chain, outermost first:
//! fail-skips → long-running detection → report capture → summary →
//! reporter. Each link forwards to its inner sink and may ask the
//! framework to stop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::cancel::CancellationFlag;
use crate::framework::{DiscoverySink, ExecutionSink, ExecutionSummary, TestCase, TestEvent};
use crate::report::{TestResult, TestResultKind};
use crate::reporter::{RunReporter, RunnerMessage};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Collects discovered cases until the run is cancelled.
#[derive(Debug)]
pub struct DiscoveryCollector {
    cases: Mutex<Vec<TestCase>>,
    cancel: CancellationFlag,
}

impl DiscoveryCollector {
    pub fn new(cancel: CancellationFlag) -> Self {
        Self {
            cases: Mutex::new(Vec::new()),
            cancel,
        }
    }

    pub fn into_cases(self) -> Vec<TestCase> {
        self.cases.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiscoverySink for DiscoveryCollector {
    fn on_test_case(&self, case: TestCase) -> bool {
        lock(&self.cases).push(case);
        !self.cancel.is_cancelled()
    }
}

/// Innermost link: forwards per-test results to the run reporter.
pub struct ReporterSink {
    assembly: String,
    reporter: Arc<dyn RunReporter>,
}

impl ReporterSink {
    pub fn new(assembly: impl Into<String>, reporter: Arc<dyn RunReporter>) -> Self {
        Self {
            assembly: assembly.into(),
            reporter,
        }
    }
}

impl ExecutionSink for ReporterSink {
    fn on_event(&self, event: &TestEvent) -> bool {
        let assembly = self.assembly.clone();
        let message = match event {
            TestEvent::Starting { .. } => return true,
            TestEvent::Passed {
                case, elapsed_ms, ..
            } => RunnerMessage::TestPassed {
                assembly,
                test: case.display_name.clone(),
                elapsed_ms: *elapsed_ms,
            },
            TestEvent::Failed {
                case,
                elapsed_ms,
                message,
                ..
            } => RunnerMessage::TestFailed {
                assembly,
                test: case.display_name.clone(),
                elapsed_ms: *elapsed_ms,
                message: message.clone(),
            },
            TestEvent::Skipped { case, reason } => RunnerMessage::TestSkipped {
                assembly,
                test: case.display_name.clone(),
                reason: reason.clone(),
            },
            TestEvent::Error { message } => RunnerMessage::Error {
                assembly: Some(assembly),
                message: message.clone(),
            },
        };
        self.reporter.report(&message);
        true
    }
}

/// Counts results into an `ExecutionSummary`.
pub struct SummarySink {
    inner: Arc<dyn ExecutionSink>,
    cancel: CancellationFlag,
    summary: Mutex<ExecutionSummary>,
}

impl SummarySink {
    pub fn new(inner: Arc<dyn ExecutionSink>, cancel: CancellationFlag) -> Self {
        Self {
            inner,
            cancel,
            summary: Mutex::new(ExecutionSummary::default()),
        }
    }

    pub fn summary(&self) -> ExecutionSummary {
        *lock(&self.summary)
    }
}

impl ExecutionSink for SummarySink {
    fn on_event(&self, event: &TestEvent) -> bool {
        {
            let mut summary = lock(&self.summary);
            match event {
                TestEvent::Starting { .. } => {}
                TestEvent::Passed { elapsed_ms, .. } => {
                    summary.total += 1;
                    summary.elapsed_ms += elapsed_ms;
                }
                TestEvent::Failed { elapsed_ms, .. } => {
                    summary.total += 1;
                    summary.failed += 1;
                    summary.elapsed_ms += elapsed_ms;
                }
                TestEvent::Skipped { .. } => {
                    summary.total += 1;
                    summary.skipped += 1;
                }
                TestEvent::Error { .. } => summary.errors += 1,
            }
        }
        self.inner.on_event(event) && !self.cancel.is_cancelled()
    }
}

/// Keeps every result for the run report.
pub struct ReportCaptureSink {
    inner: Arc<dyn ExecutionSink>,
    results: Mutex<Vec<TestResult>>,
    errors: Mutex<Vec<String>>,
}

impl ReportCaptureSink {
    pub fn new(inner: Arc<dyn ExecutionSink>) -> Self {
        Self {
            inner,
            results: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn results(&self) -> Vec<TestResult> {
        lock(&self.results).clone()
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }
}

fn result_for(case: &TestCase, result: TestResultKind, elapsed_ms: u64) -> TestResult {
    TestResult {
        name: case.display_name.clone(),
        class_name: case.class_name.clone(),
        method_name: case.method_name.clone(),
        result,
        elapsed_ms,
        message: None,
        stack_trace: None,
        reason: None,
        output: String::new(),
        traits: case.traits.clone(),
    }
}

impl ExecutionSink for ReportCaptureSink {
    fn on_event(&self, event: &TestEvent) -> bool {
        let captured = match event {
            TestEvent::Starting { .. } => None,
            TestEvent::Passed {
                case,
                elapsed_ms,
                output,
            } => Some(TestResult {
                output: output.clone(),
                ..result_for(case, TestResultKind::Pass, *elapsed_ms)
            }),
            TestEvent::Failed {
                case,
                elapsed_ms,
                message,
                stack_trace,
                output,
            } => Some(TestResult {
                message: Some(message.clone()),
                stack_trace: stack_trace.clone(),
                output: output.clone(),
                ..result_for(case, TestResultKind::Fail, *elapsed_ms)
            }),
            TestEvent::Skipped { case, reason } => Some(TestResult {
                reason: Some(reason.clone()),
                ..result_for(case, TestResultKind::Skip, 0)
            }),
            TestEvent::Error { message } => {
                lock(&self.errors).push(message.clone());
                None
            }
        };
        if let Some(result) = captured {
            lock(&self.results).push(result);
        }
        self.inner.on_event(event)
    }
}

struct InFlight {
    name: String,
    started: Instant,
    reported: bool,
}

/// Reports tests that have been running longer than a threshold.
///
/// Checked whenever an event arrives; each test is reported at most once.
pub struct LongRunningSink {
    inner: Arc<dyn ExecutionSink>,
    threshold: Duration,
    assembly: String,
    reporter: Arc<dyn RunReporter>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

impl LongRunningSink {
    pub fn new(
        inner: Arc<dyn ExecutionSink>,
        threshold: Duration,
        assembly: impl Into<String>,
        reporter: Arc<dyn RunReporter>,
    ) -> Self {
        Self {
            inner,
            threshold,
            assembly: assembly.into(),
            reporter,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    fn overdue(&self, now: Instant) -> Vec<(String, u64)> {
        let mut in_flight = lock(&self.in_flight);
        let mut overdue: Vec<(String, u64)> = in_flight
            .values_mut()
            .filter(|test| !test.reported && now.duration_since(test.started) >= self.threshold)
            .map(|test| {
                test.reported = true;
                (
                    test.name.clone(),
                    now.duration_since(test.started).as_millis() as u64,
                )
            })
            .collect();
        overdue.sort();
        overdue
    }
}

impl ExecutionSink for LongRunningSink {
    fn on_event(&self, event: &TestEvent) -> bool {
        match event {
            TestEvent::Starting { case } => {
                lock(&self.in_flight).insert(
                    case.unique_id.clone(),
                    InFlight {
                        name: case.display_name.clone(),
                        started: Instant::now(),
                        reported: false,
                    },
                );
            }
            TestEvent::Passed { case, .. }
            | TestEvent::Failed { case, .. }
            | TestEvent::Skipped { case, .. } => {
                lock(&self.in_flight).remove(&case.unique_id);
            }
            TestEvent::Error { .. } => {}
        }

        let overdue = self.overdue(Instant::now());
        if !overdue.is_empty() {
            self.reporter.report(&RunnerMessage::LongRunningTests {
                assembly: self.assembly.clone(),
                tests: overdue,
            });
        }
        self.inner.on_event(event)
    }
}

/// Turns skipped tests into failures.
pub struct FailSkipSink {
    inner: Arc<dyn ExecutionSink>,
}

impl FailSkipSink {
    pub fn new(inner: Arc<dyn ExecutionSink>) -> Self {
        Self { inner }
    }
}

impl ExecutionSink for FailSkipSink {
    fn on_event(&self, event: &TestEvent) -> bool {
        match event {
            TestEvent::Skipped { case, reason } => self.inner.on_event(&TestEvent::Failed {
                case: case.clone(),
                elapsed_ms: 0,
                message: reason.clone(),
                stack_trace: None,
                output: String::new(),
            }),
            other => self.inner.on_event(other),
        }
    }
}

/// The assembled chain plus handles to the links results are read from.
pub struct ExecutionChain {
    head: Arc<dyn ExecutionSink>,
    summary: Arc<SummarySink>,
    capture: Arc<ReportCaptureSink>,
}

impl ExecutionChain {
    /// `long_running` of `None` disables long-running detection.
    pub fn build(
        assembly: &str,
        reporter: Arc<dyn RunReporter>,
        cancel: CancellationFlag,
        fail_skips: bool,
        long_running: Option<Duration>,
    ) -> Self {
        let reporter_sink: Arc<dyn ExecutionSink> =
            Arc::new(ReporterSink::new(assembly, Arc::clone(&reporter)));
        let summary = Arc::new(SummarySink::new(reporter_sink, cancel));
        let capture = Arc::new(ReportCaptureSink::new(summary.clone()));

        let mut head: Arc<dyn ExecutionSink> = capture.clone();
        if let Some(threshold) = long_running {
            head = Arc::new(LongRunningSink::new(head, threshold, assembly, reporter));
        }
        if fail_skips {
            head = Arc::new(FailSkipSink::new(head));
        }

        Self {
            head,
            summary,
            capture,
        }
    }

    pub fn sink(&self) -> &dyn ExecutionSink {
        self.head.as_ref()
    }

    pub fn summary(&self) -> ExecutionSummary {
        self.summary.summary()
    }

    pub fn results(&self) -> Vec<TestResult> {
        self.capture.results()
    }

    pub fn errors(&self) -> Vec<String> {
        self.capture.errors()
    }
}
