//! Monitorability gate and emergency gate.
//!
//! The gate checks whether the safety mechanisms guarding an action are
//! *operationally usable*, not merely accurate: a detector with a perfect
//! offline AUC but an uncontrolled false-positive rate is not monitorable.

use crate::types::{GateMetrics, GateStatus};

/// Evaluates operational usability of safety mechanisms from a metrics snapshot.
pub struct MonitorabilityGate {
    metrics: Option<GateMetrics>,
}

impl Default for MonitorabilityGate {
    fn default() -> Self {
        Self { metrics: None }
    }
}

impl MonitorabilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_metrics(&mut self, metrics: GateMetrics) {
        self.metrics = Some(metrics);
    }

    pub fn metrics(&self) -> Option<GateMetrics> {
        self.metrics
    }

    /// Evaluate the gate against the given metrics, or the last updated snapshot.
    pub fn check(&self, metrics: Option<GateMetrics>) -> GateStatus {
        let m = match metrics.or(self.metrics) {
            Some(m) => m,
            // No metrics = unknown state. We allow with Unknown; the policy
            // layer decides what to do with that.
            None => return GateStatus::Unknown,
        };

        if let Some(fpr) = m.fpr {
            if fpr > m.fpr_target {
                return GateStatus::FailFpr;
            }
        }

        if let Some(coverage) = m.coverage_at_fpr {
            if coverage < m.coverage_target {
                return GateStatus::FailCoverage;
            }
        }

        if let Some(calibration) = m.calibration_score {
            if calibration < m.calibration_threshold {
                return GateStatus::FailCalibration;
            }
        }

        if let (Some(mean), Some(std)) = (m.lead_time_mean, m.lead_time_std) {
            if mean > 0.0 {
                let cv = std / mean;
                if cv > m.lead_time_cv_max {
                    return GateStatus::FailLeadTime;
                }
            }
        }

        GateStatus::Pass
    }

    pub fn is_operational(&self, metrics: Option<GateMetrics>) -> bool {
        self.check(metrics).is_permissive()
    }

    /// Human-readable failure reason, `None` when the gate passes or has no data.
    pub fn failure_reason(&self, metrics: Option<GateMetrics>) -> Option<String> {
        let status = self.check(metrics);
        if matches!(status, GateStatus::Pass | GateStatus::Unknown) {
            return None;
        }

        let m = metrics.or(self.metrics)?;
        match status {
            GateStatus::FailFpr => Some(format!(
                "FPR ({}) exceeds target ({})",
                fmt_opt(m.fpr),
                m.fpr_target
            )),
            GateStatus::FailCoverage => Some(format!(
                "Coverage ({}) below target ({})",
                fmt_opt(m.coverage_at_fpr),
                m.coverage_target
            )),
            GateStatus::FailCalibration => Some(format!(
                "Calibration ({}) below threshold ({})",
                fmt_opt(m.calibration_score),
                m.calibration_threshold
            )),
            GateStatus::FailLeadTime => Some("Lead time coefficient of variation too high".to_string()),
            GateStatus::Pass | GateStatus::Unknown => None,
        }
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.3}"),
        None => "N/A".to_string(),
    }
}

/// Latching emergency gate: once activated, denies all non-Omega0 calls
/// upstream of policy evaluation until explicitly cleared.
#[derive(Default)]
pub struct EmergencyGate {
    active: bool,
    reason: String,
}

impl EmergencyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, reason: impl Into<String>) {
        self.active = true;
        self.reason = reason.into();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.reason.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}
