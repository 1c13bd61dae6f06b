//! Phase start/stop logging helpers.
//!
//! Thin veneer over `tracing`: a phase signal is a log event and nothing
//! more, so it can never fail the pipeline.

use tracing::info;

/// Signal that a named phase is starting.
pub fn phase_start(name: &str) {
    info!(phase = name, "phase start");
}

/// Signal that a named phase has finished.
pub fn phase_end(name: &str) {
    info!(phase = name, "phase end");
}
