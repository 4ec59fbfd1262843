//! Shared utilities for the Braid workspace.

pub mod logging;

pub use logging::init_tracing;
