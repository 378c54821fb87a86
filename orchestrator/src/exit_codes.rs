//! Stable process exit codes for the orchestrator binary.
//!
//! Scripts branch on these, so the mapping is part of the CLI contract.

/// Run completed: every task succeeded and every gate was met.
pub const OK: i32 = 0;

/// The run could not start: bad arguments, unreadable or malformed
/// checklist, or invalid configuration.
pub const INVALID: i32 = 1;

/// The run completed but at least one task failed.
pub const TASK_FAILED: i32 = 2;

/// A success gate was not met; the run halted at that phase.
pub const GATE_FAILED: i32 = 3;
