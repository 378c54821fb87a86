//! Side-effecting operations: process execution, validation, blocker
//! diagnostics, and configuration.

pub mod blockers;
pub mod config;
pub mod process;
pub mod validator;
