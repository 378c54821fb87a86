//! Task validation against external validation scripts.
//!
//! The script contract: emit a single JSON object on stdout with at least a
//! `status` field (`"success"` or `"failure"`), optionally `error_message`
//! and a `metrics` object; exit 0 on success. Declared artifacts must exist
//! in the artifacts directory. They are load-bearing evidence, so a missing
//! artifact forces failure even when the script reported success.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::checklist::Task;
use crate::io::process::{ProcessRequest, ProcessRunner};

const INVALID_OUTPUT_MESSAGE: &str = "invalid validation script output format";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    Success,
    Failure,
}

/// Outcome of validating one task execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    /// Artifact name to collected content.
    pub artifacts: BTreeMap<String, String>,
    /// Numeric metrics reported by the script; feed success-gate evaluation.
    pub metrics: BTreeMap<String, f64>,
    pub error_message: Option<String>,
}

impl ValidationResult {
    pub fn is_success(&self) -> bool {
        self.status == ValidationStatus::Success
    }

    fn trivial_success() -> Self {
        Self {
            status: ValidationStatus::Success,
            artifacts: BTreeMap::new(),
            metrics: BTreeMap::new(),
            error_message: None,
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Failure,
            artifacts: BTreeMap::new(),
            metrics: BTreeMap::new(),
            error_message: Some(message.into()),
        }
    }
}

/// Wire format of the script's stdout object.
#[derive(Debug, Deserialize)]
struct ScriptOutput {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    metrics: BTreeMap<String, Value>,
}

/// Runs validation scripts and checks their artifacts. Reads files and
/// spawns one process per validation; never writes.
#[derive(Debug, Clone)]
pub struct Validator {
    artifacts_dir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl Validator {
    pub fn new(artifacts_dir: PathBuf, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            artifacts_dir,
            timeout,
            output_limit_bytes,
        }
    }

    /// Validate one task. A task without a validation spec trivially
    /// succeeds. Spawn failures and timeouts are validation failures, not
    /// engine errors: they stay on the retryable path.
    #[instrument(skip_all, fields(task = %task.description))]
    pub fn validate<R: ProcessRunner>(&self, task: &Task, runner: &R) -> ValidationResult {
        let Some(spec) = &task.validation else {
            return ValidationResult::trivial_success();
        };

        debug!(script = %spec.script, "running validation script");
        let output = match runner.run(&ProcessRequest {
            command: spec.script.clone(),
            timeout: self.timeout,
            output_limit_bytes: self.output_limit_bytes,
        }) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %err, "validation script could not be run");
                return ValidationResult::failure(format!("validation error: {err:#}"));
            }
        };

        if !output.success() {
            return ValidationResult::failure(format!(
                "validation script failed: {}",
                output.failure_detail()
            ));
        }

        let parsed: ScriptOutput = match serde_json::from_str(&output.stdout_text()) {
            Ok(parsed) => parsed,
            Err(_) => return ValidationResult::failure(INVALID_OUTPUT_MESSAGE),
        };

        let metrics = numeric_metrics(&parsed.metrics);

        // Artifacts collected so far stay in the result when a later one is
        // missing, so the failure still carries the evidence that did exist.
        let mut artifacts = BTreeMap::new();
        for name in &spec.artifacts {
            let path = self.artifacts_dir.join(name);
            match fs::read_to_string(&path) {
                Ok(contents) => {
                    artifacts.insert(name.clone(), contents);
                }
                Err(_) => {
                    warn!(artifact = %name, path = %path.display(), "declared artifact missing");
                    return ValidationResult {
                        status: ValidationStatus::Failure,
                        artifacts,
                        metrics,
                        error_message: Some(format!("missing artifact: {name}")),
                    };
                }
            }
        }

        if parsed.status == "success" {
            ValidationResult {
                status: ValidationStatus::Success,
                artifacts,
                metrics,
                error_message: None,
            }
        } else {
            ValidationResult {
                status: ValidationStatus::Failure,
                artifacts,
                metrics,
                error_message: Some(
                    parsed
                        .error_message
                        .unwrap_or_else(|| "validation failed".to_string()),
                ),
            }
        }
    }
}

fn numeric_metrics(raw: &BTreeMap<String, Value>) -> BTreeMap<String, f64> {
    raw.iter()
        .filter_map(|(name, value)| value.as_f64().map(|number| (name.clone(), number)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedRunner, output, task_with_validation};

    fn validator(artifacts_dir: PathBuf) -> Validator {
        Validator::new(artifacts_dir, Duration::from_secs(5), 10_000)
    }

    #[test]
    fn task_without_spec_trivially_succeeds() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(Vec::new());
        let task = crate::test_support::task("Git Configuration", Some("true"));

        let result = validator(temp.path().to_path_buf()).validate(&task, &runner);

        assert!(result.is_success());
        assert!(result.artifacts.is_empty());
        assert_eq!(runner.invocation_count(), 0);
    }

    #[test]
    fn nonzero_exit_fails_with_stderr() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![output(1, "", "checks broke")]);
        let task = task_with_validation("Run tests", "validate.sh", &[]);

        let result = validator(temp.path().to_path_buf()).validate(&task, &runner);

        assert!(!result.is_success());
        let message = result.error_message.expect("message");
        assert!(message.contains("validation script failed"));
        assert!(message.contains("checks broke"));
    }

    #[test]
    fn non_json_stdout_fails_with_fixed_message() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![output(0, "not json at all", "")]);
        let task = task_with_validation("Run tests", "validate.sh", &[]);

        let result = validator(temp.path().to_path_buf()).validate(&task, &runner);

        assert_eq!(
            result.error_message.as_deref(),
            Some("invalid validation script output format")
        );
    }

    #[test]
    fn missing_artifact_fails_despite_reported_success() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![output(0, r#"{"status": "success"}"#, "")]);
        let task = task_with_validation("Run tests", "validate.sh", &["report.json"]);

        let result = validator(temp.path().to_path_buf()).validate(&task, &runner);

        assert!(!result.is_success());
        assert_eq!(
            result.error_message.as_deref(),
            Some("missing artifact: report.json")
        );
    }

    #[test]
    fn collects_artifacts_and_metrics() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("report.json"), "{\"passed\": 10}").expect("write");
        let runner = ScriptedRunner::new(vec![output(
            0,
            r#"{"status": "success", "metrics": {"code_coverage": 92.5, "suite": "unit"}}"#,
            "",
        )]);
        let task = task_with_validation("Run tests", "validate.sh", &["report.json"]);

        let result = validator(temp.path().to_path_buf()).validate(&task, &runner);

        assert!(result.is_success());
        assert_eq!(
            result.artifacts.get("report.json").map(String::as_str),
            Some("{\"passed\": 10}")
        );
        // Non-numeric metrics are ignored rather than failing the parse.
        assert_eq!(result.metrics.get("code_coverage"), Some(&92.5));
        assert!(!result.metrics.contains_key("suite"));
    }

    #[test]
    fn reported_failure_keeps_script_error_message() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::new(vec![output(
            0,
            r#"{"status": "failure", "error_message": "coverage too low"}"#,
            "",
        )]);
        let task = task_with_validation("Run tests", "validate.sh", &[]);

        let result = validator(temp.path().to_path_buf()).validate(&task, &runner);

        assert!(!result.is_success());
        assert_eq!(result.error_message.as_deref(), Some("coverage too low"));
    }

    #[test]
    fn spawn_failure_is_a_validation_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ScriptedRunner::erroring("no such interpreter");
        let task = task_with_validation("Run tests", "validate.sh", &[]);

        let result = validator(temp.path().to_path_buf()).validate(&task, &runner);

        assert!(!result.is_success());
        assert!(
            result
                .error_message
                .expect("message")
                .contains("validation error")
        );
    }
}
