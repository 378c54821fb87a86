//! Checklist document model and loading.
//!
//! A checklist is a JSON document with a top-level `checklist` object holding
//! a name and ordered phases; each phase holds ordered tasks. Loading is pure
//! and idempotent: schema conformance first (Draft 2020-12), then semantic
//! invariants (unique phase names, unique task descriptions per phase).

use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::errors::MalformedChecklist;

const V1_SCHEMA: &str = include_str!("../../schemas/checklist/v1.schema.json");

/// Top-level ordered collection of phases. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub name: String,
    pub phases: Vec<Phase>,
}

/// Named group of tasks with an optional numeric acceptance gate.
/// A phase with zero tasks is valid and trivially complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_gate: Option<SuccessGate>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Phase-level threshold on a metric reported by validation scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessGate {
    pub metric: String,
    pub min_value: f64,
}

/// Single unit of work: a shell command plus optional blockers and validation.
/// The description is the lookup key for status and results within its phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<Blocker>,
    /// Free-form payload for external collaborators; never interpreted here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_data: Option<Value>,
}

/// Validation script plus the artifact files it is expected to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSpec {
    pub script: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// Precondition that must classify as resolved before a task's command runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
    #[serde(rename = "type")]
    pub kind: BlockerKind,
    #[serde(default)]
    pub resolution: Resolution,
}

/// How a blocker may be resolved: an automated diagnostic command, required
/// human experts, or neither (trivially resolved).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolution {
    pub diagnostics: Option<String>,
    pub required_experts: Vec<String>,
}

/// Blocker classification. An open set on the wire: unknown tags map to
/// [`BlockerKind::Other`] rather than failing the load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockerKind {
    DependencyCheck,
    EnvironmentCheck,
    ApiConfigurationCheck,
    ExpertRequired,
    Other(String),
}

impl From<String> for BlockerKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "dependency_check" | "DependencyCheck" => Self::DependencyCheck,
            "environment_check" | "EnvironmentCheck" => Self::EnvironmentCheck,
            "api_configuration_check" | "ApiConfigurationCheck" => Self::ApiConfigurationCheck,
            "expert_required" | "ExpertRequired" => Self::ExpertRequired,
            _ => Self::Other(tag),
        }
    }
}

impl From<BlockerKind> for String {
    fn from(kind: BlockerKind) -> Self {
        kind.as_str().to_string()
    }
}

impl BlockerKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DependencyCheck => "dependency_check",
            Self::EnvironmentCheck => "environment_check",
            Self::ApiConfigurationCheck => "api_configuration_check",
            Self::ExpertRequired => "expert_required",
            Self::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for BlockerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ChecklistDocument {
    checklist: Checklist,
}

impl Checklist {
    /// Parse and validate a checklist document.
    ///
    /// Fails with [`MalformedChecklist`] when the `checklist` or `phases`
    /// keys are missing, any task description is missing or empty, or names
    /// collide. Loading has no side effects and is idempotent.
    pub fn load(document: &str) -> Result<Self, MalformedChecklist> {
        let value: Value = serde_json::from_str(document)
            .map_err(|err| MalformedChecklist::new(format!("invalid JSON: {err}")))?;

        let Some(top) = value.get("checklist") else {
            return Err(MalformedChecklist::new("missing 'checklist' key"));
        };
        if top.get("phases").is_none() {
            return Err(MalformedChecklist::new("missing 'phases' key"));
        }

        validate_schema(&value)?;

        let parsed: ChecklistDocument = serde_json::from_value(value)
            .map_err(|err| MalformedChecklist::new(format!("invalid structure: {err}")))?;
        let checklist = parsed.checklist;

        let errors = validate_invariants(&checklist);
        if !errors.is_empty() {
            return Err(MalformedChecklist::new(errors.join("; ")));
        }
        Ok(checklist)
    }
}

/// Validate the document against the embedded v1 schema (Draft 2020-12).
fn validate_schema(instance: &Value) -> Result<(), MalformedChecklist> {
    let schema: Value = serde_json::from_str(V1_SCHEMA)
        .map_err(|err| MalformedChecklist::new(format!("parse checklist schema: {err}")))?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .map_err(|err| MalformedChecklist::new(format!("compile checklist schema: {err}")))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(MalformedChecklist::new(format!(
            "schema validation failed: {}",
            messages.join("; ")
        )));
    }
    Ok(())
}

/// Semantic invariants beyond schema conformance.
fn validate_invariants(checklist: &Checklist) -> Vec<String> {
    let mut errors = Vec::new();

    let mut phase_names = BTreeSet::new();
    for phase in &checklist.phases {
        if !phase_names.insert(phase.name.as_str()) {
            errors.push(format!("duplicate phase name '{}'", phase.name));
        }
        let mut descriptions = BTreeSet::new();
        for task in &phase.tasks {
            if task.description.trim().is_empty() {
                errors.push(format!("empty task description in phase '{}'", phase.name));
            }
            if !descriptions.insert(task.description.as_str()) {
                errors.push(format!(
                    "duplicate task description '{}' in phase '{}'",
                    task.description, phase.name
                ));
            }
        }
    }
    errors
}
