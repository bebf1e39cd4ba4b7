//! Binary-side wiring: configuration, progress display, run sequencing and output.

pub(crate) mod config;
pub(crate) mod output;
pub(crate) mod progress;
pub(crate) mod runtime;
