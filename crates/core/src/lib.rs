//! weave-core
//!
//! Core library for incremental method-entry instrumentation of compiled JVM
//! class files.
//!
//! This crate defines the class-file model, the instrumentation engine, the
//! incremental container reconciliation pipeline, the build-state tracker,
//! and supporting configuration/profiling types.
//!
//! The goal is to keep all substantive logic here so it is fully testable and
//! reusable from multiple frontends (CLI, build-system plugins, etc.).

pub mod classfile;
pub mod config;
pub mod instrument;
pub mod pipeline;
pub mod profile;
pub mod state;
pub mod testutil;
pub mod trace;

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
