//! Scripted test framework (testing only)
//!
//! `ScriptedFramework` plays back a fixed list of test outcomes per assembly
//! and records what the orchestrator asked of it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::framework::{
    AssemblyContext, DiscoveryOptions, DiscoverySink, ExecutionOptions, ExecutionSink, FrontController,
    TestCase, TestEvent, TestFramework,
};
use crate::options::ProjectAssembly;

// ---------------------------------------------------------------------------
// ScriptedAssembly
// ---------------------------------------------------------------------------

/// What a scripted test does when executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    Pass,
    Fail(String),
    Skip(String),
}

/// Behaviour of one scripted assembly.
#[derive(Debug, Clone, Default)]
pub struct ScriptedAssembly {
    tests: Vec<(TestCase, ScriptedOutcome)>,
    open_error: Option<String>,
    panic_on_run: bool,
    resolve: Vec<String>,
    delay: Option<Duration>,
    discovery_delay: Option<Duration>,
    elapsed_ms: u64,
}

impl ScriptedAssembly {
    pub fn new() -> Self {
        Self {
            elapsed_ms: 10,
            ..Self::default()
        }
    }

    pub fn test(mut self, case: TestCase, outcome: ScriptedOutcome) -> Self {
        self.tests.push((case, outcome));
        self
    }

    pub fn pass(self, class_name: &str, method_name: &str) -> Self {
        self.test(TestCase::new(class_name, method_name), ScriptedOutcome::Pass)
    }

    pub fn fail(self, class_name: &str, method_name: &str, message: &str) -> Self {
        self.test(
            TestCase::new(class_name, method_name),
            ScriptedOutcome::Fail(message.to_string()),
        )
    }

    pub fn skip(self, class_name: &str, method_name: &str, reason: &str) -> Self {
        self.test(
            TestCase::new(class_name, method_name),
            ScriptedOutcome::Skip(reason.to_string()),
        )
    }

    /// `open` fails with `message`.
    pub fn failing_open(mut self, message: &str) -> Self {
        self.open_error = Some(message.to_string());
        self
    }

    /// `run_tests` panics.
    pub fn panicking(mut self) -> Self {
        self.panic_on_run = true;
        self
    }

    /// Resolve `name` through the assembly context when opened.
    pub fn resolving(mut self, name: &str) -> Self {
        self.resolve.push(name.to_string());
        self
    }

    /// Sleep before executing, to overlap with other assemblies.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before discovering.
    pub fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = Some(delay);
        self
    }

    /// Reported duration of every test.
    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }
}

// ---------------------------------------------------------------------------
// FrameworkLog
// ---------------------------------------------------------------------------

/// Everything the orchestrator did with a `ScriptedFramework`.
#[derive(Debug, Clone, Default)]
pub struct FrameworkLog {
    /// Assembly keys in the order they were opened.
    pub opened: Vec<String>,
    /// Assembly keys in the order execution started.
    pub executed: Vec<String>,
    /// `(assembly, dependency, resolved path)` for every context lookup.
    pub resolved: Vec<(String, String, Option<PathBuf>)>,
    /// Registered strategies seen while each assembly was open.
    pub registry_sizes: Vec<(String, usize)>,
    /// Options each assembly was discovered with.
    pub discovery_options: Vec<(String, DiscoveryOptions)>,
    /// Options each assembly was executed with.
    pub execution_options: Vec<(String, ExecutionOptions)>,
    /// `started:<key>` and `finished:<key>` in the order executions began and ended.
    pub timeline: Vec<String>,
}

// ---------------------------------------------------------------------------
// ScriptedFramework
// ---------------------------------------------------------------------------

/// `TestFramework` keyed by assembly file stem.
#[derive(Debug, Default)]
pub struct ScriptedFramework {
    scripts: HashMap<String, ScriptedAssembly>,
    log: Arc<Mutex<FrameworkLog>>,
}

impl ScriptedFramework {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assembly(mut self, key: &str, script: ScriptedAssembly) -> Self {
        self.scripts.insert(key.to_string(), script);
        self
    }

    pub fn log(&self) -> FrameworkLog {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestFramework for ScriptedFramework {
    async fn open(
        &self,
        assembly: &ProjectAssembly,
        context: AssemblyContext,
    ) -> anyhow::Result<Box<dyn FrontController>> {
        let key = assembly.key();
        let script = self
            .scripts
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no script for '{}'", key))?;
        if let Some(message) = &script.open_error {
            anyhow::bail!("{}", message);
        }

        {
            let mut log = self.log.lock().unwrap();
            log.opened.push(key.clone());
            log.registry_sizes.push((key.clone(), context.registry.len()));
            for name in &script.resolve {
                let path = context.resolve(name).map(|loaded| loaded.path);
                log.resolved.push((key.clone(), name.clone(), path));
            }
        }

        Ok(Box::new(ScriptedController {
            key,
            script,
            log: Arc::clone(&self.log),
        }))
    }
}

struct ScriptedController {
    key: String,
    script: ScriptedAssembly,
    log: Arc<Mutex<FrameworkLog>>,
}

#[async_trait]
impl FrontController for ScriptedController {
    fn framework_name(&self) -> String {
        "scripted 1.0".to_string()
    }

    fn environment(&self) -> String {
        "64-bit test".to_string()
    }

    async fn find(&self, sink: &dyn DiscoverySink, options: &DiscoveryOptions) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .discovery_options
            .push((self.key.clone(), options.clone()));
        if let Some(delay) = self.script.discovery_delay {
            tokio::time::sleep(delay).await;
        }
        for (case, _) in &self.script.tests {
            if !sink.on_test_case(case.clone()) {
                break;
            }
        }
        Ok(())
    }

    async fn run_tests(
        &self,
        cases: Vec<TestCase>,
        sink: &dyn ExecutionSink,
        options: &ExecutionOptions,
    ) -> anyhow::Result<()> {
        if self.script.panic_on_run {
            panic!("scripted failure in '{}'", self.key);
        }
        {
            let mut log = self.log.lock().unwrap();
            log.executed.push(self.key.clone());
            log.execution_options.push((self.key.clone(), options.clone()));
            log.timeline.push(format!("started:{}", self.key));
        }
        if let Some(delay) = self.script.delay {
            tokio::time::sleep(delay).await;
        }

        let elapsed_ms = self.script.elapsed_ms;
        for case in cases {
            let outcome = self
                .script
                .tests
                .iter()
                .find(|(scripted, _)| scripted.unique_id == case.unique_id)
                .map(|(_, outcome)| outcome.clone())
                .unwrap_or(ScriptedOutcome::Pass);

            if !sink.on_event(&TestEvent::Starting { case: case.clone() }) {
                break;
            }
            let event = match outcome {
                ScriptedOutcome::Pass => TestEvent::Passed {
                    case,
                    elapsed_ms,
                    output: String::new(),
                },
                ScriptedOutcome::Fail(message) => TestEvent::Failed {
                    case,
                    elapsed_ms,
                    message,
                    stack_trace: Some("   at Scripted.Run()".to_string()),
                    output: String::new(),
                },
                ScriptedOutcome::Skip(reason) => TestEvent::Skipped { case, reason },
            };
            if !sink.on_event(&event) {
                break;
            }
        }
        self.log.lock().unwrap().timeline.push(format!("finished:{}", self.key));
        Ok(())
    }
}
