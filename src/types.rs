//! Core data model: blast-radius taxonomy, manifests, calls, and decisions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Blast radius classification for a tool action.
///
/// Omega0: safe/reversible — pure reads, local compute, no network writes.
/// Omega1: medium risk — network requests, workspace writes, sending messages.
/// Omega2: high risk/irreversible — shell exec, credentials, deploys, privilege changes.
/// Unknown tools are treated as Omega2 throughout the policy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlastRadius {
    Omega0,
    Omega1,
    Omega2,
    Unknown,
}

impl BlastRadius {
    /// Numeric level matching the original Omega taxonomy (`99` for Unknown).
    pub fn level(self) -> u8 {
        match self {
            BlastRadius::Omega0 => 0,
            BlastRadius::Omega1 => 1,
            BlastRadius::Omega2 => 2,
            BlastRadius::Unknown => 99,
        }
    }

    /// Symbolic name used on the wire (audit log, policy document), e.g. `OMEGA_0`.
    pub fn wire_name(self) -> &'static str {
        match self {
            BlastRadius::Omega0 => "OMEGA_0",
            BlastRadius::Omega1 => "OMEGA_1",
            BlastRadius::Omega2 => "OMEGA_2",
            BlastRadius::Unknown => "UNKNOWN",
        }
    }
}

/// Policy evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
    Review,
}

impl Decision {
    /// Symbolic name used on the wire, e.g. `ALLOW`.
    pub fn wire_name(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Deny => "DENY",
            Decision::Review => "REVIEW",
        }
    }
}

/// Monitorability gate status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    Pass,
    FailFpr,
    FailCoverage,
    FailCalibration,
    FailLeadTime,
    Unknown,
}

impl GateStatus {
    /// True for statuses the policy engine treats permissively (pass or no data).
    pub fn is_permissive(self) -> bool {
        matches!(self, GateStatus::Pass | GateStatus::Unknown)
    }

    /// Symbolic name used on the wire, e.g. `FAIL_FPR`.
    pub fn wire_name(self) -> &'static str {
        match self {
            GateStatus::Pass => "PASS",
            GateStatus::FailFpr => "FAIL_FPR",
            GateStatus::FailCoverage => "FAIL_COVERAGE",
            GateStatus::FailCalibration => "FAIL_CALIBRATION",
            GateStatus::FailLeadTime => "FAIL_LEAD_TIME",
            GateStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Emptiness Window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptinessState {
    Normal,
    Emptiness,
}

/// Declared capabilities and constraints for a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManifest {
    pub tool_id: String,
    pub omega_level: BlastRadius,
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Allowed egress domains; empty means no network restriction declared.
    #[serde(default)]
    pub network_domains: Vec<String>,
    /// Allowed filesystem paths.
    #[serde(default)]
    pub fs_paths: Vec<String>,
    #[serde(default)]
    pub requires_approval: bool,
    /// Supply-chain content hash, opaque to the runtime.
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl ToolManifest {
    pub fn new(tool_id: impl Into<String>, omega_level: BlastRadius, description: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            omega_level,
            description: description.into(),
            capabilities: Vec::new(),
            network_domains: Vec::new(),
            fs_paths: Vec::new(),
            requires_approval: matches!(omega_level, BlastRadius::Omega2),
            content_hash: None,
        }
    }
}

/// A proposed tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_id: String,
    pub action: String,
    #[serde(default)]
    pub args: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl ToolCall {
    pub fn new(tool_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            action: action.into(),
            args: BTreeMap::new(),
            context: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_args(mut self, args: BTreeMap<String, serde_json::Value>) -> Self {
        self.args = args;
        self
    }
}

/// Operational usability metrics consumed by the monitorability gate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateMetrics {
    pub fpr: Option<f64>,
    pub fpr_target: f64,
    pub coverage_at_fpr: Option<f64>,
    pub coverage_target: f64,
    pub calibration_score: Option<f64>,
    pub calibration_threshold: f64,
    pub lead_time_mean: Option<f64>,
    pub lead_time_std: Option<f64>,
    pub lead_time_cv_max: f64,
}

impl Default for GateMetrics {
    fn default() -> Self {
        Self {
            fpr: None,
            fpr_target: 0.05,
            coverage_at_fpr: None,
            coverage_target: 0.80,
            calibration_score: None,
            calibration_threshold: 0.7,
            lead_time_mean: None,
            lead_time_std: None,
            lead_time_cv_max: 0.5,
        }
    }
}

/// Result of a single policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub omega_level: BlastRadius,
    pub gate_status: GateStatus,
    pub rationale: String,
    pub metrics_snapshot: Option<GateMetrics>,
    pub timestamp: DateTime<Utc>,
}

impl PolicyDecision {
    pub fn new(decision: Decision, omega_level: BlastRadius, gate_status: GateStatus, rationale: impl Into<String>) -> Self {
        Self {
            decision,
            omega_level,
            gate_status,
            rationale: rationale.into(),
            metrics_snapshot: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metrics(mut self, metrics: GateMetrics) -> Self {
        self.metrics_snapshot = Some(metrics);
        self
    }
}

/// Append-only audit record for one tool call decision/outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub tool_call: ToolCall,
    pub manifest: Option<ToolManifest>,
    pub policy_decision: PolicyDecision,
    pub executed: bool,
    pub result_type: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Human review artifact generated while the Emptiness Window is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPacket {
    pub packet_id: String,
    pub timestamp: DateTime<Utc>,
    pub blocked_calls: Vec<ToolCall>,
    pub proposed_plan: Option<String>,
    #[serde(default)]
    pub dry_run_diffs: Vec<serde_json::Value>,
    pub context_summary: Option<String>,
    pub recommendation: Option<String>,
}
