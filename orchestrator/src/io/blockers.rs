//! Blocker classification and automated resolution.
//!
//! Blockers gate task entry: the engine only runs a task's command once every
//! declared blocker classifies as resolved. Expert-required blockers are
//! unresolvable by classification alone: their diagnostics are never run,
//! and resolution short-circuits there so the failure reason is stable and
//! no diagnostic work is wasted.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::core::checklist::{Blocker, BlockerKind};
use crate::io::process::{ProcessRequest, ProcessRunner};

/// Per-blocker classification outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockerOutcome {
    Resolved,
    /// Human involvement is mandatory; automation never resolves this.
    NeedsExpert { experts: Vec<String> },
    /// The diagnostic command exited non-zero (or could not run).
    DiagnosticFailed { detail: String },
}

/// One checked blocker, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockerCheck {
    pub kind: BlockerKind,
    pub outcome: BlockerOutcome,
}

impl BlockerCheck {
    /// Failure reason the engine records, `None` when resolved.
    pub fn failure_reason(&self) -> Option<String> {
        match &self.outcome {
            BlockerOutcome::Resolved => None,
            BlockerOutcome::NeedsExpert { experts } if experts.is_empty() => {
                Some(format!("blocker '{}' requires a human expert", self.kind))
            }
            BlockerOutcome::NeedsExpert { experts } => Some(format!(
                "blocker '{}' requires experts: {}",
                self.kind,
                experts.join(", ")
            )),
            BlockerOutcome::DiagnosticFailed { detail } => Some(format!(
                "blocker '{}' diagnostics failed: {detail}",
                self.kind
            )),
        }
    }
}

/// Resolution report for a task's declared blockers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockerResolution {
    pub checks: Vec<BlockerCheck>,
}

impl BlockerResolution {
    pub fn all_resolved(&self) -> bool {
        self.checks
            .iter()
            .all(|check| check.outcome == BlockerOutcome::Resolved)
    }

    /// First unresolved blocker in declaration order; the stable failure
    /// reason for the task.
    pub fn first_unresolved(&self) -> Option<&BlockerCheck> {
        self.checks
            .iter()
            .find(|check| check.outcome != BlockerOutcome::Resolved)
    }
}

/// Classifies blockers and runs their diagnostics through the process runner.
#[derive(Debug, Clone)]
pub struct BlockerResolver {
    timeout: Duration,
    output_limit_bytes: usize,
}

impl BlockerResolver {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            timeout,
            output_limit_bytes,
        }
    }

    /// Check each blocker in declaration order.
    ///
    /// Classification rules:
    /// - kind `expert_required`, or any listed `required_experts`, means
    ///   needs-expert regardless of diagnostics; resolution stops there.
    /// - otherwise a diagnostics command decides: exit 0 resolved, anything
    ///   else (including spawn failure or timeout) diagnostic-failed.
    /// - no diagnostics and no experts resolves trivially.
    #[instrument(skip_all, fields(blockers = blockers.len()))]
    pub fn resolve<R: ProcessRunner>(
        &self,
        blockers: &[Blocker],
        runner: &R,
    ) -> BlockerResolution {
        let mut checks = Vec::with_capacity(blockers.len());
        for blocker in blockers {
            let needs_expert = blocker.kind == BlockerKind::ExpertRequired
                || !blocker.resolution.required_experts.is_empty();
            if needs_expert {
                warn!(kind = %blocker.kind, "blocker requires a human expert");
                checks.push(BlockerCheck {
                    kind: blocker.kind.clone(),
                    outcome: BlockerOutcome::NeedsExpert {
                        experts: blocker.resolution.required_experts.clone(),
                    },
                });
                break;
            }

            let outcome = match &blocker.resolution.diagnostics {
                Some(diagnostics) => self.run_diagnostics(diagnostics, runner),
                None => BlockerOutcome::Resolved,
            };
            checks.push(BlockerCheck {
                kind: blocker.kind.clone(),
                outcome,
            });
        }
        BlockerResolution { checks }
    }

    fn run_diagnostics<R: ProcessRunner>(&self, diagnostics: &str, runner: &R) -> BlockerOutcome {
        debug!(command = %diagnostics, "running blocker diagnostics");
        match runner.run(&ProcessRequest {
            command: diagnostics.to_string(),
            timeout: self.timeout,
            output_limit_bytes: self.output_limit_bytes,
        }) {
            Ok(output) if output.success() => BlockerOutcome::Resolved,
            Ok(output) => BlockerOutcome::DiagnosticFailed {
                detail: output.failure_detail(),
            },
            Err(err) => BlockerOutcome::DiagnosticFailed {
                detail: format!("{err:#}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checklist::Resolution;
    use crate::test_support::{ScriptedRunner, output};

    fn resolver() -> BlockerResolver {
        BlockerResolver::new(Duration::from_secs(5), 10_000)
    }

    fn diagnostic_blocker(kind: BlockerKind, diagnostics: &str) -> Blocker {
        Blocker {
            kind,
            resolution: Resolution {
                diagnostics: Some(diagnostics.to_string()),
                required_experts: Vec::new(),
            },
        }
    }

    fn expert_blocker(experts: &[&str]) -> Blocker {
        Blocker {
            kind: BlockerKind::ExpertRequired,
            resolution: Resolution {
                diagnostics: Some("exit 1".to_string()),
                required_experts: experts.iter().map(ToString::to_string).collect(),
            },
        }
    }

    #[test]
    fn empty_blocker_list_resolves() {
        let runner = ScriptedRunner::new(Vec::new());
        let resolution = resolver().resolve(&[], &runner);
        assert!(resolution.all_resolved());
        assert!(resolution.first_unresolved().is_none());
    }

    #[test]
    fn passing_diagnostics_resolve() {
        let runner = ScriptedRunner::new(vec![output(0, "", "")]);
        let blockers = vec![diagnostic_blocker(
            BlockerKind::DependencyCheck,
            "pip check",
        )];

        let resolution = resolver().resolve(&blockers, &runner);

        assert!(resolution.all_resolved());
        assert_eq!(runner.commands(), vec!["pip check"]);
    }

    #[test]
    fn failing_diagnostics_report_detail() {
        let runner = ScriptedRunner::new(vec![output(1, "", "dependency missing")]);
        let blockers = vec![diagnostic_blocker(
            BlockerKind::EnvironmentCheck,
            "check_env.sh",
        )];

        let resolution = resolver().resolve(&blockers, &runner);

        let unresolved = resolution.first_unresolved().expect("unresolved");
        let reason = unresolved.failure_reason().expect("reason");
        assert!(reason.contains("environment_check"));
        assert!(reason.contains("dependency missing"));
    }

    #[test]
    fn expert_required_skips_diagnostics() {
        let runner = ScriptedRunner::new(Vec::new());
        let blockers = vec![expert_blocker(&["QA Engineer"])];

        let resolution = resolver().resolve(&blockers, &runner);

        assert_eq!(runner.invocation_count(), 0);
        let reason = resolution
            .first_unresolved()
            .expect("unresolved")
            .failure_reason()
            .expect("reason");
        assert!(reason.contains("QA Engineer"));
    }

    #[test]
    fn listed_experts_force_needs_expert_for_any_kind() {
        let runner = ScriptedRunner::new(Vec::new());
        let blockers = vec![Blocker {
            kind: BlockerKind::Other("TestFailure".to_string()),
            resolution: Resolution {
                diagnostics: None,
                required_experts: vec!["Python Developer".to_string()],
            },
        }];

        let resolution = resolver().resolve(&blockers, &runner);

        assert!(matches!(
            resolution.checks[0].outcome,
            BlockerOutcome::NeedsExpert { .. }
        ));
    }

    #[test]
    fn expert_required_short_circuits_later_diagnostics() {
        let runner = ScriptedRunner::new(Vec::new());
        let blockers = vec![
            expert_blocker(&["QA Engineer"]),
            diagnostic_blocker(BlockerKind::DependencyCheck, "pip check"),
        ];

        let resolution = resolver().resolve(&blockers, &runner);

        assert_eq!(resolution.checks.len(), 1);
        assert_eq!(runner.invocation_count(), 0);
    }

    #[test]
    fn diagnostic_failure_does_not_stop_later_checks() {
        let runner = ScriptedRunner::new(vec![output(1, "", "no"), output(0, "", "")]);
        let blockers = vec![
            diagnostic_blocker(BlockerKind::DependencyCheck, "first"),
            diagnostic_blocker(BlockerKind::EnvironmentCheck, "second"),
        ];

        let resolution = resolver().resolve(&blockers, &runner);

        assert_eq!(resolution.checks.len(), 2);
        assert_eq!(resolution.checks[1].outcome, BlockerOutcome::Resolved);
        // First unresolved stays the declaration-order failure reason.
        assert_eq!(
            resolution.first_unresolved().map(|check| &check.kind),
            Some(&BlockerKind::DependencyCheck)
        );
    }

    #[test]
    fn no_diagnostics_no_experts_resolves() {
        let runner = ScriptedRunner::new(Vec::new());
        let blockers = vec![Blocker {
            kind: BlockerKind::Other("TestBlocker".to_string()),
            resolution: Resolution::default(),
        }];

        let resolution = resolver().resolve(&blockers, &runner);

        assert!(resolution.all_resolved());
        assert_eq!(runner.invocation_count(), 0);
    }
}
