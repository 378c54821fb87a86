//! Sequential checklist execution.
//!
//! The engine walks phases in declaration order and tasks within each phase
//! in declaration order, strictly one at a time. Task failures are recorded
//! and never stop the run; an unmet success gate marks its phase failed and
//! halts the run, leaving later phases untouched.

use tracing::{info, instrument, warn};

use crate::core::checklist::{Checklist, Phase, Task};
use crate::core::gate::evaluate_gate;
use crate::core::retry::{RetryPolicy, Sleeper, WallClockSleeper, run_with_retry};
use crate::core::status::{PhaseStatus, StatusSnapshot, StatusStore, TaskResult, TaskStatus};
use crate::errors::{GateFailure, TaskError};
use crate::io::blockers::BlockerResolver;
use crate::io::config::OrchestratorConfig;
use crate::io::process::{ProcessRequest, ProcessRunner, ShellRunner};
use crate::io::validator::{ValidationResult, Validator};

use std::collections::BTreeMap;
use std::time::Duration;

/// One recorded task failure, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub phase: String,
    pub task: String,
    pub reason: String,
}

/// Outcome of one full run over a checklist.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub checklist: String,
    pub task_failures: Vec<TaskFailure>,
    pub gate_failure: Option<GateFailure>,
    /// True when a gate failure stopped the run before later phases.
    pub halted: bool,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.task_failures.is_empty() && self.gate_failure.is_none()
    }
}

/// Drives a checklist to completion through injected runner and sleeper
/// seams. Owns the status store; callers read it through snapshots.
pub struct ExecutionEngine<R, S> {
    runner: R,
    sleeper: S,
    validator: Validator,
    resolver: BlockerResolver,
    retry: RetryPolicy,
    command_timeout: Duration,
    output_limit_bytes: usize,
    store: StatusStore,
}

impl ExecutionEngine<ShellRunner, WallClockSleeper> {
    /// Production engine: real shell commands, real sleeps.
    pub fn from_config(checklist: &Checklist, config: &OrchestratorConfig) -> Self {
        Self::new(
            checklist,
            ShellRunner,
            WallClockSleeper,
            config.artifacts_dir.clone(),
            RetryPolicy {
                max_attempts: config.max_attempts,
                backoff_unit: config.retry_backoff(),
            },
            config.command_timeout(),
            config.output_limit_bytes,
        )
    }
}

impl<R: ProcessRunner, S: Sleeper> ExecutionEngine<R, S> {
    pub fn new(
        checklist: &Checklist,
        runner: R,
        sleeper: S,
        artifacts_dir: std::path::PathBuf,
        retry: RetryPolicy,
        command_timeout: Duration,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            runner,
            sleeper,
            validator: Validator::new(artifacts_dir, command_timeout, output_limit_bytes),
            resolver: BlockerResolver::new(command_timeout, output_limit_bytes),
            retry,
            command_timeout,
            output_limit_bytes,
            store: StatusStore::new(checklist),
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        self.store.get_status()
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Execute every phase in order. Always returns a report; the only
    /// early exit is a gate failure, which sets `halted`.
    #[instrument(skip_all, fields(checklist = %checklist.name))]
    pub fn run(&mut self, checklist: &Checklist) -> RunReport {
        let mut report = RunReport {
            checklist: checklist.name.clone(),
            task_failures: Vec::new(),
            gate_failure: None,
            halted: false,
        };

        for phase in &checklist.phases {
            info!(phase = %phase.name, "starting phase");
            self.store
                .set_phase_status(&phase.name, PhaseStatus::InProgress);

            let metrics = self.run_phase_tasks(phase, &mut report);

            if let Some(gate) = &phase.success_gate {
                if let Err(failure) = evaluate_gate(&phase.name, gate, &metrics) {
                    warn!(phase = %phase.name, failure = %failure, "success gate not met");
                    self.store.set_phase_status(&phase.name, PhaseStatus::Failed);
                    report.gate_failure = Some(failure);
                    report.halted = true;
                    return report;
                }
            }

            let all_succeeded = phase.tasks.iter().all(|task| {
                self.store.task_status(&phase.name, &task.description)
                    == Some(TaskStatus::Success)
            });
            let status = if all_succeeded {
                PhaseStatus::Success
            } else {
                PhaseStatus::Failed
            };
            self.store.set_phase_status(&phase.name, status);
            info!(phase = %phase.name, status = %status, "phase finished");
        }

        report
    }

    /// Run every task of one phase, accumulating gate metrics from
    /// validation outputs. Task failures are recorded and skipped past.
    fn run_phase_tasks(&mut self, phase: &Phase, report: &mut RunReport) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();

        for task in &phase.tasks {
            info!(task = %task.description, "starting task");
            self.store
                .set_task_status(&phase.name, &task.description, TaskStatus::InProgress);

            let resolution = self.resolver.resolve(&task.blockers, &self.runner);
            if !resolution.all_resolved() {
                let reason = resolution
                    .first_unresolved()
                    .and_then(|check| check.failure_reason())
                    .unwrap_or_else(|| "unspecified blocker".to_string());
                let error = TaskError::BlockerUnresolved { reason };
                warn!(task = %task.description, error = %error, "task blocked");
                self.record_failure(&phase.name, task, &error.to_string(), report);
                continue;
            }

            let runner = &self.runner;
            let validator = &self.validator;
            let command_timeout = self.command_timeout;
            let output_limit_bytes = self.output_limit_bytes;
            let attempt_outcome = run_with_retry(&self.retry, &self.sleeper, |attempt| {
                info!(task = %task.description, attempt, "attempting task");
                if let Some(command) = &task.command {
                    let output = runner
                        .run(&ProcessRequest {
                            command: command.clone(),
                            timeout: command_timeout,
                            output_limit_bytes,
                        })
                        .map_err(|err| format!("command error: {err:#}"))?;
                    if !output.success() {
                        return Err(format!("command failed: {}", output.failure_detail()));
                    }
                }
                let validation = validator.validate(task, runner);
                if validation.is_success() {
                    Ok(validation)
                } else {
                    Err(validation
                        .error_message
                        .unwrap_or_else(|| "validation failed".to_string()))
                }
            });

            match attempt_outcome {
                Ok(validation) => {
                    self.record_success(&phase.name, task, validation, &mut metrics);
                }
                Err(exhausted) => {
                    warn!(
                        task = %task.description,
                        attempts = exhausted.attempts,
                        "task failed after all attempts"
                    );
                    let error = TaskError::Validation {
                        message: exhausted.last_error,
                    };
                    self.record_failure(&phase.name, task, &error.to_string(), report);
                }
            }
        }

        metrics
    }

    fn record_success(
        &mut self,
        phase: &str,
        task: &Task,
        validation: ValidationResult,
        metrics: &mut BTreeMap<String, f64>,
    ) {
        metrics.extend(validation.metrics);
        self.store.record_result(
            phase,
            &task.description,
            TaskResult {
                success: true,
                artifacts: validation.artifacts,
                error_message: None,
            },
        );
        self.store
            .set_task_status(phase, &task.description, TaskStatus::Success);
        info!(task = %task.description, "task succeeded");
    }

    fn record_failure(&mut self, phase: &str, task: &Task, reason: &str, report: &mut RunReport) {
        self.store.record_result(
            phase,
            &task.description,
            TaskResult {
                success: false,
                artifacts: BTreeMap::new(),
                error_message: Some(reason.to_string()),
            },
        );
        self.store
            .set_task_status(phase, &task.description, TaskStatus::Failed);
        report.task_failures.push(TaskFailure {
            phase: phase.to_string(),
            task: task.description.clone(),
            reason: reason.to_string(),
        });
    }
}
