//! Checklist-driven task orchestrator.
//!
//! Loads a JSON checklist (ordered phases of tasks with optional blockers,
//! validation scripts, and success gates) and executes it sequentially,
//! recording per-task status and results. The architecture enforces a
//! strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (checklist model, status
//!   bookkeeping, retry policy, gate evaluation). No I/O.
//! - **[`io`]**: Side-effecting operations (process execution, validation
//!   scripts, blocker diagnostics, configuration). Isolated behind trait
//!   seams to enable scripted doubles in tests.
//!
//! [`engine`] coordinates core logic with I/O to implement the run loop.

pub mod core;
pub mod engine;
pub mod errors;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod report;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
