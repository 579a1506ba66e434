//! Run progress messages and the reporters that consume them.

use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::framework::ExecutionSummary;

/// Progress messages produced during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerMessage {
    DiscoveryStarting {
        assembly: String,
        parallelize_test_collections: bool,
        max_parallel_threads: i32,
    },
    DiscoveryFinished {
        assembly: String,
        discovered: usize,
        to_run: usize,
    },
    ExecutionStarting {
        assembly: String,
        test_count: usize,
    },
    ExecutionFinished {
        assembly: String,
        summary: ExecutionSummary,
    },
    TestPassed {
        assembly: String,
        test: String,
        elapsed_ms: u64,
    },
    TestFailed {
        assembly: String,
        test: String,
        elapsed_ms: u64,
        message: String,
    },
    TestSkipped {
        assembly: String,
        test: String,
        reason: String,
    },
    LongRunningTests {
        assembly: String,
        tests: Vec<(String, u64)>,
    },
    Error {
        assembly: Option<String>,
        message: String,
    },
    TestExecutionSummary {
        elapsed_ms: u64,
        summaries: Vec<(String, ExecutionSummary)>,
    },
}

impl fmt::Display for RunnerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerMessage::DiscoveryStarting { assembly, .. } => {
                write!(f, "  Discovering: {}", assembly)
            }
            RunnerMessage::DiscoveryFinished {
                assembly,
                discovered,
                to_run,
            } => write!(
                f,
                "  Discovered:  {} ({} found, {} to run)",
                assembly, discovered, to_run
            ),
            RunnerMessage::ExecutionStarting { assembly, .. } => {
                write!(f, "  Starting:    {}", assembly)
            }
            RunnerMessage::ExecutionFinished { assembly, .. } => {
                write!(f, "  Finished:    {}", assembly)
            }
            RunnerMessage::TestPassed { test, .. } => write!(f, "    {} [PASS]", test),
            RunnerMessage::TestFailed { test, message, .. } => {
                write!(f, "    {} [FAIL]", test)?;
                for line in message.lines() {
                    write!(f, "\n      {}", line)?;
                }
                Ok(())
            }
            RunnerMessage::TestSkipped { test, reason, .. } => {
                write!(f, "    {} [SKIP]\n      {}", test, reason)
            }
            RunnerMessage::LongRunningTests { assembly, tests } => {
                write!(f, "  [Long Running] {}", assembly)?;
                for (test, elapsed_ms) in tests {
                    write!(f, "\n    {} ({:.3}s)", test, *elapsed_ms as f64 / 1000.0)?;
                }
                Ok(())
            }
            RunnerMessage::Error { assembly, message } => match assembly {
                Some(assembly) => write!(f, "  [ERROR] {}: {}", assembly, message),
                None => write!(f, "  [ERROR] {}", message),
            },
            RunnerMessage::TestExecutionSummary {
                elapsed_ms,
                summaries,
            } => {
                write!(f, "=== TEST EXECUTION SUMMARY ===")?;
                let width = summaries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
                for (key, s) in summaries {
                    write!(
                        f,
                        "\n   {:<width$}  Total: {}, Errors: {}, Failed: {}, Skipped: {}, Time: {:.3}s",
                        key,
                        s.total,
                        s.errors,
                        s.failed,
                        s.skipped,
                        s.elapsed_secs(),
                        width = width
                    )?;
                }
                if summaries.len() > 1 {
                    let total = summaries
                        .iter()
                        .fold(ExecutionSummary::default(), |acc, (_, s)| acc + *s);
                    write!(
                        f,
                        "\n   {:<width$}  Total: {}, Errors: {}, Failed: {}, Skipped: {}, Time: {:.3}s ({:.3}s)",
                        "GRAND TOTAL",
                        total.total,
                        total.errors,
                        total.failed,
                        total.skipped,
                        total.elapsed_secs(),
                        *elapsed_ms as f64 / 1000.0,
                        width = width
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Receives run progress. Called from execution sinks, so it must be cheap.
pub trait RunReporter: Send + Sync {
    fn report(&self, message: &RunnerMessage);
}

/// Reporter that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl RunReporter for NullReporter {
    fn report(&self, _message: &RunnerMessage) {}
}

/// Reporter that logs each message as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn report(&self, message: &RunnerMessage) {
        match message {
            RunnerMessage::DiscoveryStarting {
                assembly,
                parallelize_test_collections,
                max_parallel_threads,
            } => info!(
                assembly = %assembly,
                parallelize_test_collections = parallelize_test_collections,
                max_parallel_threads = max_parallel_threads,
                "Discovering"
            ),
            RunnerMessage::DiscoveryFinished {
                assembly,
                discovered,
                to_run,
            } => info!(assembly = %assembly, discovered = discovered, to_run = to_run, "Discovered"),
            RunnerMessage::ExecutionStarting {
                assembly,
                test_count,
            } => info!(assembly = %assembly, test_count = test_count, "Starting"),
            RunnerMessage::ExecutionFinished { assembly, summary } => info!(
                assembly = %assembly,
                total = summary.total,
                failed = summary.failed,
                skipped = summary.skipped,
                errors = summary.errors,
                elapsed_ms = summary.elapsed_ms,
                "Finished"
            ),
            RunnerMessage::TestPassed { .. } => {}
            RunnerMessage::TestFailed {
                assembly,
                test,
                message,
                ..
            } => warn!(assembly = %assembly, test = %test, message = %message, "Test failed"),
            RunnerMessage::TestSkipped {
                assembly,
                test,
                reason,
            } => info!(assembly = %assembly, test = %test, reason = %reason, "Test skipped"),
            RunnerMessage::LongRunningTests { assembly, tests } => {
                for (test, elapsed_ms) in tests {
                    warn!(assembly = %assembly, test = %test, elapsed_ms = elapsed_ms, "Long running test");
                }
            }
            RunnerMessage::Error { assembly, message } => {
                error!(assembly = ?assembly, message = %message, "Runner error")
            }
            RunnerMessage::TestExecutionSummary { .. } => {
                for line in message.to_string().lines() {
                    info!("{}", line);
                }
            }
        }
    }
}

/// Reporter that keeps the rendered text of every message for the host.
#[derive(Debug, Default)]
pub struct TranscriptReporter {
    lines: Mutex<Vec<String>>,
}

impl TranscriptReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// The transcript as one string, one message per line.
    pub fn transcript(&self) -> String {
        self.lines().join("\n")
    }
}

impl RunReporter for TranscriptReporter {
    fn report(&self, message: &RunnerMessage) {
        let rendered = message.to_string();
        match self.lines.lock() {
            Ok(mut lines) => lines.push(rendered),
            Err(poisoned) => poisoned.into_inner().push(rendered),
        }
    }
}
