//! Test doubles for the process-runner and sleeper seams, plus small
//! fixture builders.
//!
//! Available to unit tests and, behind the `test-support` feature, to
//! integration tests and downstream consumers writing their own.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::core::checklist::{Task, ValidationSpec};
use crate::core::retry::Sleeper;
use crate::io::process::{CommandOutput, ProcessRequest, ProcessRunner};

/// Sleeper that records requested delays instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Process runner that replays a scripted sequence of outputs and records
/// every command it was asked to run.
///
/// Panics when invoked past the end of its script: a test that spawns more
/// commands than it scripted is a test bug, not a runtime condition.
#[derive(Debug)]
pub struct ScriptedRunner {
    outputs: RefCell<VecDeque<CommandOutput>>,
    commands: RefCell<Vec<String>>,
    error: Option<String>,
}

impl ScriptedRunner {
    pub fn new(outputs: Vec<CommandOutput>) -> Self {
        Self {
            outputs: RefCell::new(outputs.into()),
            commands: RefCell::new(Vec::new()),
            error: None,
        }
    }

    /// Runner whose every invocation fails to spawn with the given message.
    pub fn erroring(message: &str) -> Self {
        Self {
            outputs: RefCell::new(VecDeque::new()),
            commands: RefCell::new(Vec::new()),
            error: Some(message.to_string()),
        }
    }

    pub fn invocation_count(&self) -> usize {
        self.commands.borrow().len()
    }

    /// Commands in invocation order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(&self, request: &ProcessRequest) -> Result<CommandOutput> {
        self.commands.borrow_mut().push(request.command.clone());
        if let Some(message) = &self.error {
            return Err(anyhow!("{message}"));
        }
        match self.outputs.borrow_mut().pop_front() {
            Some(output) => Ok(output),
            None => panic!("unexpected command: {}", request.command),
        }
    }
}

/// Captured output for a command that ran to completion.
pub fn output(exit_code: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(exit_code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
        stdout_truncated: 0,
        stderr_truncated: 0,
        timed_out: false,
    }
}

/// Minimal task: a description and an optional command, nothing else.
pub fn task(description: &str, command: Option<&str>) -> Task {
    Task {
        description: description.to_string(),
        command: command.map(ToString::to_string),
        validation: None,
        blockers: Vec::new(),
        implementation_data: None,
    }
}

/// Task with a validation spec and declared artifacts, no command.
pub fn task_with_validation(description: &str, script: &str, artifacts: &[&str]) -> Task {
    Task {
        description: description.to_string(),
        command: None,
        validation: Some(ValidationSpec {
            script: script.to_string(),
            artifacts: artifacts.iter().map(ToString::to_string).collect(),
        }),
        blockers: Vec::new(),
        implementation_data: None,
    }
}
