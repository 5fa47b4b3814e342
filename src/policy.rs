//! Static policy engine: blocklist, Omega-level defaults, grants, and
//! time-bounded Omega2 approvals.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::{BlastRadius, Decision, GateStatus, PolicyDecision, ToolCall, ToolManifest};

/// On-disk policy document shape, read by `PolicyEngine::load`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub grants: IndexMap<String, BTreeSet<String>>,
    #[serde(default)]
    pub blocked_tools: BTreeSet<String>,
    #[serde(default)]
    pub allowed_network_domains: BTreeSet<String>,
}

/// Evaluates tool calls against static security policy.
///
/// Default policy: Omega0 always allowed, Omega1 allowed when the gate is
/// non-failing, Omega2 denied unless granted or time-bounded-approved.
pub struct PolicyEngine {
    default_omega2_deny: bool,
    grants: IndexMap<String, BTreeSet<String>>,
    omega2_approvals: IndexMap<String, DateTime<Utc>>,
    blocked_tools: BTreeSet<String>,
    allowed_network_domains: BTreeSet<String>,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self {
            default_omega2_deny: true,
            grants: IndexMap::new(),
            omega2_approvals: IndexMap::new(),
            blocked_tools: BTreeSet::new(),
            allowed_network_domains: BTreeSet::new(),
        }
    }
}

impl PolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a policy document from disk, falling back to defaults if it
    /// doesn't exist, matching the teacher's `ToolPolicyConfig::load` pattern.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut engine = Self::new();
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("reading policy document {}: {e}", path.display()))?;
            let doc: PolicyDocument = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("parsing policy document {}: {e}", path.display()))?;
            engine.grants = doc.grants;
            engine.blocked_tools = doc.blocked_tools;
            engine.allowed_network_domains = doc.allowed_network_domains;
        }
        Ok(engine)
    }

    /// Evaluate a tool call against policy. `manifest` being `None` is always
    /// a deny — the runtime should never reach this with an unregistered tool,
    /// but the rule is defensive and mirrors the rest of the pipeline's
    /// fail-closed posture.
    pub fn evaluate(&mut self, tool_call: &ToolCall, manifest: Option<&ToolManifest>, gate_status: GateStatus) -> PolicyDecision {
        let manifest = match manifest {
            Some(m) => m,
            None => {
                return PolicyDecision::new(
                    Decision::Deny,
                    BlastRadius::Unknown,
                    gate_status,
                    "Tool not registered (no manifest)",
                )
            }
        };

        let omega = manifest.omega_level;

        if self.blocked_tools.contains(&tool_call.tool_id) {
            return PolicyDecision::new(
                Decision::Deny,
                omega,
                gate_status,
                format!("Tool '{}' is blocked by policy", tool_call.tool_id),
            );
        }

        match omega {
            BlastRadius::Omega0 => PolicyDecision::new(
                Decision::Allow,
                omega,
                gate_status,
                "O0 (safe) - allowed by default",
            ),
            BlastRadius::Omega1 => {
                if gate_status.is_permissive() {
                    PolicyDecision::new(
                        Decision::Allow,
                        omega,
                        gate_status,
                        "O1 (medium risk) - allowed with audit",
                    )
                } else {
                    PolicyDecision::new(
                        Decision::Deny,
                        omega,
                        gate_status,
                        format!("O1 blocked: gate failed ({gate_status:?})"),
                    )
                }
            }
            BlastRadius::Omega2 => self.evaluate_omega2(tool_call, omega, gate_status),
            BlastRadius::Unknown => PolicyDecision::new(
                Decision::Deny,
                omega,
                gate_status,
                "Unknown O level - denied for safety",
            ),
        }
    }

    fn evaluate_omega2(&mut self, tool_call: &ToolCall, omega: BlastRadius, gate_status: GateStatus) -> PolicyDecision {
        if let Some(expiry) = self.omega2_approvals.get(&tool_call.tool_id).copied() {
            if Utc::now() < expiry {
                return PolicyDecision::new(
                    Decision::Allow,
                    omega,
                    gate_status,
                    "O2 - explicitly approved (time-bounded)",
                );
            }
            self.omega2_approvals.shift_remove(&tool_call.tool_id);
        }

        if let Some(allowed_actions) = self.grants.get(&tool_call.tool_id) {
            if allowed_actions.contains("*") || allowed_actions.contains(&tool_call.action) {
                return PolicyDecision::new(
                    Decision::Allow,
                    omega,
                    gate_status,
                    "O2 - granted by policy",
                );
            }
        }

        if self.default_omega2_deny {
            PolicyDecision::new(
                Decision::Deny,
                omega,
                gate_status,
                "O2 (high risk) - denied by default, requires approval",
            )
        } else {
            PolicyDecision::new(
                Decision::Review,
                omega,
                gate_status,
                "O2 (high risk) - requires human review",
            )
        }
    }

    /// Grant time-bounded approval for an Omega2 tool. Default duration
    /// matches the prototype's five-minute window.
    pub fn grant_omega2_approval(&mut self, tool_id: impl Into<String>, duration: chrono::Duration) {
        self.omega2_approvals.insert(tool_id.into(), Utc::now() + duration);
    }

    pub fn revoke_omega2_approval(&mut self, tool_id: &str) {
        self.omega2_approvals.shift_remove(tool_id);
    }

    pub fn block_tool(&mut self, tool_id: impl Into<String>) {
        self.blocked_tools.insert(tool_id.into());
    }

    pub fn unblock_tool(&mut self, tool_id: &str) {
        self.blocked_tools.remove(tool_id);
    }

    pub fn add_network_domain(&mut self, domain: impl Into<String>) {
        self.allowed_network_domains.insert(domain.into());
    }

    /// Query-only extension point: empty allowlist means unrestricted.
    /// Not consulted by `evaluate()` — see DESIGN.md Open Question 2.
    pub fn check_network_domain(&self, domain: &str) -> bool {
        self.allowed_network_domains.is_empty() || self.allowed_network_domains.contains(domain)
    }

    pub fn export(&self) -> PolicyDocument {
        PolicyDocument {
            grants: self.grants.clone(),
            blocked_tools: self.blocked_tools.clone(),
            allowed_network_domains: self.allowed_network_domains.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BlastRadius;

    fn manifest(omega: BlastRadius) -> ToolManifest {
        ToolManifest::new("probe", omega, "test tool")
    }

    #[test]
    fn no_manifest_is_deny() {
        let mut engine = PolicyEngine::new();
        let call = ToolCall::new("probe", "run");
        let decision = engine.evaluate(&call, None, GateStatus::Unknown);
        assert_eq!(decision.decision, Decision::Deny);
    }

    #[test]
    fn blocklist_wins_over_omega0() {
        let mut engine = PolicyEngine::new();
        engine.block_tool("probe");
        let call = ToolCall::new("probe", "run");
        let decision = engine.evaluate(&call, Some(&manifest(BlastRadius::Omega0)), GateStatus::Pass);
        assert_eq!(decision.decision, Decision::Deny);
    }

    #[test]
    fn omega0_always_allowed() {
        let mut engine = PolicyEngine::new();
        let call = ToolCall::new("probe", "run");
        let decision = engine.evaluate(&call, Some(&manifest(BlastRadius::Omega0)), GateStatus::FailFpr);
        assert_eq!(decision.decision, Decision::Allow);
    }

    #[test]
    fn omega1_gated_by_monitorability() {
        let mut engine = PolicyEngine::new();
        let call = ToolCall::new("probe", "run");
        let ok = engine.evaluate(&call, Some(&manifest(BlastRadius::Omega1)), GateStatus::Pass);
        assert_eq!(ok.decision, Decision::Allow);
        let blocked = engine.evaluate(&call, Some(&manifest(BlastRadius::Omega1)), GateStatus::FailCoverage);
        assert_eq!(blocked.decision, Decision::Deny);
    }

    #[test]
    fn omega2_default_deny_then_grant_then_approval() {
        let mut engine = PolicyEngine::new();
        let call = ToolCall::new("probe", "execute");
        let denied = engine.evaluate(&call, Some(&manifest(BlastRadius::Omega2)), GateStatus::Pass);
        assert_eq!(denied.decision, Decision::Deny);

        engine.grant_omega2_approval("probe", chrono::Duration::seconds(60));
        let approved = engine.evaluate(&call, Some(&manifest(BlastRadius::Omega2)), GateStatus::Pass);
        assert_eq!(approved.decision, Decision::Allow);

        engine.revoke_omega2_approval("probe");
        let revoked = engine.evaluate(&call, Some(&manifest(BlastRadius::Omega2)), GateStatus::Pass);
        assert_eq!(revoked.decision, Decision::Deny);
    }

    #[test]
    fn omega2_expired_approval_falls_back_to_deny() {
        let mut engine = PolicyEngine::new();
        engine.grant_omega2_approval("probe", chrono::Duration::seconds(-1));
        let call = ToolCall::new("probe", "execute");
        let decision = engine.evaluate(&call, Some(&manifest(BlastRadius::Omega2)), GateStatus::Pass);
        assert_eq!(decision.decision, Decision::Deny);
    }

    #[test]
    fn unknown_omega_always_denied() {
        let mut engine = PolicyEngine::new();
        let call = ToolCall::new("probe", "run");
        let decision = engine.evaluate(&call, Some(&manifest(BlastRadius::Unknown)), GateStatus::Pass);
        assert_eq!(decision.decision, Decision::Deny);
    }

    #[test]
    fn network_domain_allowlist_query() {
        let mut engine = PolicyEngine::new();
        assert!(engine.check_network_domain("anything.example"));
        engine.add_network_domain("api.example.com");
        assert!(engine.check_network_domain("api.example.com"));
        assert!(!engine.check_network_domain("evil.example.com"));
    }

    #[test]
    fn export_round_trips_grants_and_blocklist() {
        let mut engine = PolicyEngine::new();
        engine.block_tool("probe");
        engine.add_network_domain("api.example.com");
        let exported = engine.export();
        assert!(exported.blocked_tools.contains("probe"));
        assert!(exported.allowed_network_domains.contains("api.example.com"));
    }
}
