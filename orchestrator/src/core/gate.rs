//! Success-gate evaluation over metrics collected during a phase.

use std::collections::BTreeMap;

use crate::core::checklist::SuccessGate;
use crate::errors::GateFailure;

/// Compare the gate's metric against the collected value.
///
/// Metrics are the collaborator input: validation scripts report them and
/// the engine accumulates them per phase. A metric nobody reported fails the
/// gate rather than passing vacuously.
pub fn evaluate_gate(
    phase: &str,
    gate: &SuccessGate,
    metrics: &BTreeMap<String, f64>,
) -> Result<f64, GateFailure> {
    let Some(actual) = metrics.get(&gate.metric).copied() else {
        return Err(GateFailure::MetricNotReported {
            phase: phase.to_string(),
            metric: gate.metric.clone(),
        });
    };
    if actual < gate.min_value {
        return Err(GateFailure::BelowMinimum {
            phase: phase.to_string(),
            metric: gate.metric.clone(),
            min_value: gate.min_value,
            actual,
        });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(metric: &str, min_value: f64) -> SuccessGate {
        SuccessGate {
            metric: metric.to_string(),
            min_value,
        }
    }

    #[test]
    fn gate_passes_at_and_above_minimum() {
        let mut metrics = BTreeMap::new();
        metrics.insert("code_coverage".to_string(), 90.0);

        assert_eq!(
            evaluate_gate("Verify", &gate("code_coverage", 90.0), &metrics),
            Ok(90.0)
        );
    }

    #[test]
    fn gate_fails_below_minimum() {
        let mut metrics = BTreeMap::new();
        metrics.insert("code_coverage".to_string(), 80.0);

        let err = evaluate_gate("Verify", &gate("code_coverage", 90.0), &metrics)
            .expect_err("should fail");
        assert!(matches!(err, GateFailure::BelowMinimum { actual, .. } if actual == 80.0));
        assert!(err.to_string().contains("code_coverage"));
    }

    #[test]
    fn gate_fails_when_metric_missing() {
        let err = evaluate_gate("Verify", &gate("code_coverage", 90.0), &BTreeMap::new())
            .expect_err("should fail");
        assert!(matches!(err, GateFailure::MetricNotReported { .. }));
        assert!(err.to_string().contains("not reported"));
    }
}
