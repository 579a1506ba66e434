//! The run report every output transform renders from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::framework::ExecutionSummary;

/// Outcome of one test in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestResultKind {
    Pass,
    Fail,
    Skip,
}

impl TestResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestResultKind::Pass => "Pass",
            TestResultKind::Fail => "Fail",
            TestResultKind::Skip => "Skip",
        }
    }
}

/// One executed test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub class_name: String,
    pub method_name: String,
    pub result: TestResultKind,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(default)]
    pub traits: BTreeMap<String, Vec<String>>,
}

/// Everything recorded for one assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyReport {
    /// File stem; also the aggregator key.
    pub name: String,
    pub assembly_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub test_framework: String,
    pub environment: String,
    pub run_at: DateTime<Utc>,
    pub summary: ExecutionSummary,
    pub tests: Vec<TestResult>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AssemblyReport {
    /// Tests grouped by class in first-seen order.
    pub fn tests_by_class(&self) -> Vec<(&str, Vec<&TestResult>)> {
        let mut groups: Vec<(&str, Vec<&TestResult>)> = Vec::new();
        for test in &self.tests {
            match groups.iter_mut().find(|(class, _)| *class == test.class_name) {
                Some((_, tests)) => tests.push(test),
                None => groups.push((test.class_name.as_str(), vec![test])),
            }
        }
        groups
    }
}

/// The whole run; immutable input to every transform.
///
/// `generated_at` is captured once when the report is built, so rendering
/// the same report twice produces identical output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub assemblies: Vec<AssemblyReport>,
}

impl RunReport {
    /// Build a report; assemblies are ordered by name.
    pub fn new(run_id: Uuid, generated_at: DateTime<Utc>, mut assemblies: Vec<AssemblyReport>) -> Self {
        assemblies.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            run_id,
            generated_at,
            assemblies,
        }
    }

    pub fn total(&self) -> ExecutionSummary {
        self.assemblies
            .iter()
            .fold(ExecutionSummary::default(), |acc, a| acc + a.summary)
    }
}
