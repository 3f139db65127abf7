//! Structured observability hooks for orchestration runs.
//!
//! Every emission carries a stable `event` field so log pipelines can filter
//! on it regardless of the message text. Events are emitted at `info!`,
//! module failures and skips at `warn!`.

use std::time::Duration;

use tracing::{info, warn};

/// Span for one module operation, nested under the current run span.
///
/// Attach it with [`tracing::Instrument`]; spawned tasks do not inherit the
/// caller's span.
pub fn module_span(run_id: &str, module: &str) -> tracing::Span {
    tracing::info_span!("trainman.module", run_id = %run_id, module = %module)
}

pub fn emit_orchestration_started(run_id: &str, train_iteration: &str, mode: &str, modules: usize) {
    info!(
        event = "orchestration.started",
        run_id = %run_id,
        train_iteration = %train_iteration,
        mode = %mode,
        modules = modules,
    );
}

pub fn emit_wave_started(run_id: &str, wave: usize, modules: &[String]) {
    info!(event = "wave.started", run_id = %run_id, wave = wave, modules = ?modules);
}

pub fn emit_wave_finished(run_id: &str, wave: usize, failed: usize) {
    info!(event = "wave.finished", run_id = %run_id, wave = wave, failed = failed);
}

/// Emit event: one module's operation returned or panicked.
pub fn emit_module_finished(
    run_id: &str,
    module: &str,
    duration: Duration,
    error: Option<&dyn std::fmt::Display>,
) {
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    match error {
        None => info!(
            event = "module.finished",
            run_id = %run_id,
            module = %module,
            duration_ms = duration_ms,
            success = true,
        ),
        Some(error) => warn!(
            event = "module.finished",
            run_id = %run_id,
            module = %module,
            duration_ms = duration_ms,
            success = false,
            error = %error,
        ),
    }
}

pub fn emit_module_skipped(run_id: &str, module: &str, failed_upstream: &[String]) {
    warn!(
        event = "module.skipped",
        run_id = %run_id,
        module = %module,
        failed_upstream = ?failed_upstream,
    );
}

pub fn emit_orchestration_finished(
    run_id: &str,
    duration_ms: u64,
    succeeded: usize,
    failed: usize,
    skipped: usize,
) {
    info!(
        event = "orchestration.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        succeeded = succeeded,
        failed = failed,
        skipped = skipped,
        success = failed == 0 && skipped == 0,
    );
}
