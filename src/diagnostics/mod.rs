/// Diagnostics Module - per-frame telemetry
///
/// Capacity exhaustion never fails a frame; it shows up here instead.

pub mod diagnostics_data;
pub mod diagnostics_operations;

pub use diagnostics_data::{DiagnosticsCounters, FrameDiagnostics};
pub use diagnostics_operations::{log_frame_diagnostics, summary_level};
