//! Run diagnostics.
//!
//! Counts what the pipeline did (frames in, frames dropped, blinks, alerts)
//! so reduced sampling density stays observable without ever being an error.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, DiagnosticsLog, DiagnosticsStats,
    SharedDiagnosticsLog,
};
