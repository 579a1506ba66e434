//! Structured lifecycle events for a run.
//!
//! Every event carries `event = "<name>"` and the run id, so a JSON log
//! pipeline can follow one run across assemblies.

use tracing::{info, warn, Span};

/// Span for one run; attach with `Instrument::instrument`.
pub fn run_span(run_id: &str) -> Span {
    tracing::info_span!("rvt.run", run_id = %run_id)
}

/// Span for one assembly inside a run.
pub fn assembly_span(assembly: &str) -> Span {
    tracing::info_span!("rvt.assembly", assembly = %assembly)
}

pub fn emit_run_started(run_id: &str, assemblies: usize, parallel: bool) {
    info!(event = "run.started", run_id = %run_id, assemblies = assemblies, parallel = parallel);
}

pub fn emit_assembly_started(run_id: &str, assembly: &str) {
    info!(event = "assembly.started", run_id = %run_id, assembly = %assembly);
}

pub fn emit_assembly_finished(run_id: &str, assembly: &str, total: u32, failed: u32, elapsed_ms: u64) {
    info!(
        event = "assembly.finished",
        run_id = %run_id,
        assembly = %assembly,
        total = total,
        failed = failed,
        elapsed_ms = elapsed_ms,
    );
}

/// Stop-on-fail tripped after `assembly` reported failures.
pub fn emit_run_cancelling(run_id: &str, assembly: &str, failed: u32) {
    warn!(event = "run.cancelling", run_id = %run_id, assembly = %assembly, failed = failed, "Canceling due to test failure...");
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, failures: u32, cancelled: bool, infrastructure_failed: bool) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        failures = failures,
        cancelled = cancelled,
        infrastructure_failed = infrastructure_failed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_and_events() {
        let _span = run_span("test-run-id").entered();
        emit_run_started("test-run-id", 2, true);
        emit_run_finished("test-run-id", 10, 0, false, false);
    }
}
