//! Thread-safe collection of per-assembly summaries.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::AggregateError;
use crate::framework::ExecutionSummary;

/// Assembly key → summary, each key recorded once.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    summaries: Mutex<BTreeMap<String, ExecutionSummary>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: impl Into<String>, summary: ExecutionSummary) -> Result<(), AggregateError> {
        let key = key.into();
        let mut summaries = self.lock();
        if summaries.contains_key(&key) {
            return Err(AggregateError::Duplicate(key));
        }
        summaries.insert(key, summary);
        Ok(())
    }

    pub fn total_failures(&self) -> u32 {
        self.lock().values().map(|s| s.failed).sum()
    }

    /// Every summary added together.
    pub fn total(&self) -> ExecutionSummary {
        self.lock()
            .values()
            .fold(ExecutionSummary::default(), |acc, s| acc + *s)
    }

    /// Summaries ordered by key.
    pub fn summaries(&self) -> Vec<(String, ExecutionSummary)> {
        self.lock()
            .iter()
            .map(|(key, summary)| (key.clone(), *summary))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<ExecutionSummary> {
        self.lock().get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, ExecutionSummary>> {
        self.summaries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
