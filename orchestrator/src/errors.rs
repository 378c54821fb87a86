//! Typed error taxonomy for checklist runs.
//!
//! Only [`MalformedChecklist`] is fatal: it aborts before any execution.
//! Task-level errors are recorded into the status store and never propagate
//! past the task that produced them; gate failures end the run after the
//! phase's tasks have resolved.

use thiserror::Error;

/// Structural load error. Execution cannot start with a document that fails
/// schema conformance or semantic invariants (duplicate names, empty keys).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed checklist: {reason}")]
pub struct MalformedChecklist {
    pub reason: String,
}

impl MalformedChecklist {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Task-local failure, terminal for that task only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// A declared blocker did not resolve; the command was never executed
    /// and retries do not apply.
    #[error("blocker unresolved: {reason}")]
    BlockerUnresolved { reason: String },
    /// Validation reported failure (or the command itself failed; spawn
    /// errors fold into this retryable path).
    #[error("{message}")]
    Validation { message: String },
}

/// Phase-local failure: the success gate was not met after all tasks
/// resolved. Marks the phase failed even when every task succeeded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateFailure {
    #[error(
        "phase '{phase}': metric '{metric}' = {actual}, below required minimum {min_value}"
    )]
    BelowMinimum {
        phase: String,
        metric: String,
        min_value: f64,
        actual: f64,
    },
    #[error("phase '{phase}': metric '{metric}' was not reported by any validation")]
    MetricNotReported { phase: String, metric: String },
}
