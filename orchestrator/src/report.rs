//! Human-readable rendering of status snapshots and run reports.

use std::fmt::Write;

use crate::core::status::StatusSnapshot;
use crate::engine::RunReport;

/// Render the phase and task tree of a snapshot, one line per entry.
pub fn render_status(checklist: &str, snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Checklist: {checklist}");
    for phase in &snapshot.phases {
        let _ = writeln!(out, "  {} [{}]", phase.name, phase.status);
        for task in &phase.tasks {
            let _ = writeln!(out, "    - {} [{}]", task.description, task.status);
        }
    }
    out
}

/// Render the final report: status tree, recorded failures, gate outcome.
pub fn render_report(report: &RunReport, snapshot: &StatusSnapshot) -> String {
    let mut out = render_status(&report.checklist, snapshot);

    if report.success() {
        let _ = writeln!(out, "Result: success");
        return out;
    }

    let _ = writeln!(out, "Result: failure");
    for failure in &report.task_failures {
        let _ = writeln!(
            out,
            "  failed: {} / {}: {}",
            failure.phase, failure.task, failure.reason
        );
    }
    if let Some(gate) = &report.gate_failure {
        let _ = writeln!(out, "  gate not met: {gate}");
    }
    if report.halted {
        let _ = writeln!(out, "  run halted; later phases were not executed");
    }
    out
}
