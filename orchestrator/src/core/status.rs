//! Process-local status bookkeeping for phases and tasks.
//!
//! The store is owned by the execution engine and mutated only by it.
//! Reads hand out owned snapshots, never live views, so a reader can never
//! observe a partially-updated phase aggregate. Nothing here is persisted;
//! the snapshot is serde-serializable for any external reporting step.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::checklist::Checklist;

/// Task state machine: `not_started -> in_progress -> {success | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

/// Phase aggregate over its tasks plus the success-gate outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    NotStarted,
    InProgress,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one task execution. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    /// Artifact name to collected content.
    #[serde(default)]
    pub artifacts: BTreeMap<String, String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Owned snapshot of the whole store, phases in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub phases: Vec<PhaseSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub name: String,
    pub status: PhaseStatus,
    pub tasks: Vec<TaskSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub description: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    description: String,
    status: TaskStatus,
    result: Option<TaskResult>,
}

#[derive(Debug, Clone)]
struct PhaseRecord {
    name: String,
    status: PhaseStatus,
    tasks: Vec<TaskRecord>,
}

/// Status store seeded from a loaded checklist: every phase and task starts
/// at `not_started` with no recorded result.
#[derive(Debug, Clone)]
pub struct StatusStore {
    phases: Vec<PhaseRecord>,
}

impl StatusStore {
    pub fn new(checklist: &Checklist) -> Self {
        let phases = checklist
            .phases
            .iter()
            .map(|phase| PhaseRecord {
                name: phase.name.clone(),
                status: PhaseStatus::NotStarted,
                tasks: phase
                    .tasks
                    .iter()
                    .map(|task| TaskRecord {
                        description: task.description.clone(),
                        status: TaskStatus::NotStarted,
                        result: None,
                    })
                    .collect(),
            })
            .collect();
        Self { phases }
    }

    /// Snapshot-on-read view of every phase and task.
    pub fn get_status(&self) -> StatusSnapshot {
        StatusSnapshot {
            phases: self
                .phases
                .iter()
                .map(|phase| PhaseSnapshot {
                    name: phase.name.clone(),
                    status: phase.status,
                    tasks: phase
                        .tasks
                        .iter()
                        .map(|task| TaskSnapshot {
                            description: task.description.clone(),
                            status: task.status,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn phase_status(&self, phase: &str) -> Option<PhaseStatus> {
        self.phase(phase).map(|record| record.status)
    }

    pub fn task_status(&self, phase: &str, description: &str) -> Option<TaskStatus> {
        self.task(phase, description).map(|record| record.status)
    }

    pub fn task_result(&self, phase: &str, description: &str) -> Option<&TaskResult> {
        self.task(phase, description)
            .and_then(|record| record.result.as_ref())
    }

    pub(crate) fn set_phase_status(&mut self, phase: &str, status: PhaseStatus) {
        if let Some(record) = self.phase_mut(phase) {
            record.status = status;
        }
    }

    pub(crate) fn set_task_status(&mut self, phase: &str, description: &str, status: TaskStatus) {
        if let Some(record) = self.task_mut(phase, description) {
            record.status = status;
        }
    }

    pub(crate) fn record_result(&mut self, phase: &str, description: &str, result: TaskResult) {
        if let Some(record) = self.task_mut(phase, description) {
            record.result = Some(result);
        }
    }

    fn phase(&self, phase: &str) -> Option<&PhaseRecord> {
        self.phases.iter().find(|record| record.name == phase)
    }

    fn phase_mut(&mut self, phase: &str) -> Option<&mut PhaseRecord> {
        self.phases.iter_mut().find(|record| record.name == phase)
    }

    fn task(&self, phase: &str, description: &str) -> Option<&TaskRecord> {
        self.phase(phase)?
            .tasks
            .iter()
            .find(|record| record.description == description)
    }

    fn task_mut(&mut self, phase: &str, description: &str) -> Option<&mut TaskRecord> {
        self.phase_mut(phase)?
            .tasks
            .iter_mut()
            .find(|record| record.description == description)
    }
}
