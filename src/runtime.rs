//! Runtime orchestrator: sequences manifest lookup, emptiness, emergency
//! gate, monitorability gate, and policy evaluation deterministically and
//! fail-closed, then executes and audits exactly once per call.

use std::sync::Mutex;

use crate::audit::{AuditLogger, AuditSummary};
use crate::emptiness::{EmptinessController, EmptinessStatus};
use crate::error::RuntimeError;
use crate::gate::{EmergencyGate, MonitorabilityGate};
use crate::policy::PolicyEngine;
use crate::registry::ToolRegistry;
use crate::types::{BlastRadius, Decision, GateStatus, ToolCall, ToolManifest};

/// Runtime-wide configuration. `strict_mode` governs whether a monitorability
/// gate failure on an Omega1/Omega2 call is enforced (`true`, the default) or
/// only recorded for audit.
pub struct RuntimeConfig {
    pub strict_mode: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { strict_mode: true }
    }
}

struct State {
    registry: ToolRegistry,
    policy: PolicyEngine,
    gate: MonitorabilityGate,
    emergency: EmergencyGate,
    emptiness: EmptinessController,
    audit: AuditLogger,
}

/// The security runtime. Internal state lives behind a single mutex; the
/// lock is held across lookup through policy evaluation and dropped before
/// the executor call, then reacquired only to append the terminal audit
/// entry — the only permitted suspension points are the executor call and
/// the durable audit write.
pub struct SecurityRuntime {
    config: RuntimeConfig,
    state: Mutex<State>,
}

impl SecurityRuntime {
    pub fn new(config: RuntimeConfig, audit: AuditLogger) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                registry: ToolRegistry::new(),
                policy: PolicyEngine::new(),
                gate: MonitorabilityGate::new(),
                emergency: EmergencyGate::new(),
                emptiness: EmptinessController::new(),
                audit,
            }),
        }
    }

    pub fn register_tool(&self, manifest: ToolManifest, executor: Option<std::sync::Arc<dyn crate::registry::ToolExecutor>>) {
        let mut state = self.state.lock().expect("runtime mutex poisoned");
        state.registry.register(manifest, executor);
    }

    /// Execute a tool call through the security layer. `dry_run` evaluates
    /// the full pipeline but returns before invoking the executor.
    pub async fn execute(&self, tool_call: ToolCall, dry_run: bool) -> Result<serde_json::Value, RuntimeError> {
        let (manifest, decision, executor) = {
            let mut state = self.state.lock().expect("runtime mutex poisoned");

            // Step 1: manifest lookup.
            let manifest = match state.registry.manifest(&tool_call.tool_id).cloned() {
                Some(m) => m,
                None => {
                    let decision = crate::types::PolicyDecision::new(
                        Decision::Deny,
                        BlastRadius::Unknown,
                        GateStatus::Unknown,
                        "Tool not registered",
                    );
                    state
                        .audit
                        .log(tool_call.clone(), None, decision, false, None, Some("ToolNotRegistered".to_string()))
                        .map_err(RuntimeError::AuditFault)?;
                    return Err(RuntimeError::ToolNotRegistered(tool_call.tool_id.clone()));
                }
            };
            let omega = manifest.omega_level;

            // Step 2: Emptiness Window.
            if !state.emptiness.check_allowed(omega) {
                state.emptiness.record_blocked_call(tool_call.clone());
                let decision = crate::types::PolicyDecision::new(
                    Decision::Deny,
                    omega,
                    GateStatus::Unknown,
                    "Blocked by Emptiness Window",
                );
                state
                    .audit
                    .log(tool_call.clone(), Some(manifest.clone()), decision, false, None, Some("EmptinessActive".to_string()))
                    .map_err(RuntimeError::AuditFault)?;
                return Err(RuntimeError::EmptinessActive {
                    omega_level: omega.level(),
                });
            }

            // Step 3: Emergency gate.
            if state.emergency.is_active() && !matches!(omega, BlastRadius::Omega0) {
                let reason = state.emergency.reason().to_string();
                let decision = crate::types::PolicyDecision::new(
                    Decision::Deny,
                    omega,
                    GateStatus::Unknown,
                    format!("Emergency gate active: {reason}"),
                );
                state
                    .audit
                    .log(tool_call.clone(), Some(manifest.clone()), decision, false, None, Some("EmergencyGateActive".to_string()))
                    .map_err(RuntimeError::AuditFault)?;
                return Err(RuntimeError::GateFailed(format!("Emergency gate active: {reason}")));
            }

            // Step 4: monitorability gate (Omega1/Omega2 only).
            let mut gate_status = GateStatus::Pass;
            if matches!(omega, BlastRadius::Omega1 | BlastRadius::Omega2) {
                gate_status = state.gate.check(None);
                if !gate_status.is_permissive() && self.config.strict_mode {
                    let metrics = state.gate.metrics();
                    let mut decision = crate::types::PolicyDecision::new(
                        Decision::Deny,
                        omega,
                        gate_status,
                        format!("Monitorability gate failed: {gate_status:?}"),
                    );
                    if let Some(metrics) = metrics {
                        decision = decision.with_metrics(metrics);
                    }
                    let reason = state.gate.failure_reason(None).unwrap_or_else(|| format!("{gate_status:?}"));
                    state
                        .audit
                        .log(tool_call.clone(), Some(manifest.clone()), decision, false, None, Some("GateFailed".to_string()))
                        .map_err(RuntimeError::AuditFault)?;
                    return Err(RuntimeError::GateFailed(reason));
                }
            }

            // Step 5: policy evaluation.
            let decision = state.policy.evaluate(&tool_call, Some(&manifest), gate_status);

            // Step 6: act on the decision.
            match decision.decision {
                Decision::Deny => {
                    let rationale = decision.rationale.clone();
                    state
                        .audit
                        .log(tool_call.clone(), Some(manifest.clone()), decision, false, None, Some("PolicyDenied".to_string()))
                        .map_err(RuntimeError::AuditFault)?;
                    return Err(RuntimeError::PolicyDenied(rationale));
                }
                Decision::Review => {
                    state.emptiness.record_blocked_call(tool_call.clone());
                    let rationale = decision.rationale.clone();
                    state
                        .audit
                        .log(tool_call.clone(), Some(manifest.clone()), decision, false, None, Some("RequiresReview".to_string()))
                        .map_err(RuntimeError::AuditFault)?;
                    return Err(RuntimeError::PolicyDenied(format!(
                        "Requires human review: {rationale}"
                    )));
                }
                Decision::Allow => {}
            }

            if dry_run {
                state
                    .audit
                    .log(tool_call.clone(), Some(manifest.clone()), decision, false, Some("DryRun".to_string()), None)
                    .map_err(RuntimeError::AuditFault)?;
                return Ok(serde_json::json!({ "dry_run": true, "would_execute": true }));
            }

            let executor = state.registry.executor(&tool_call.tool_id);
            (manifest, decision, executor)
        };

        let executor = match executor {
            Some(e) => e,
            None => {
                let mut state = self.state.lock().expect("runtime mutex poisoned");
                state
                    .audit
                    .log(tool_call.clone(), Some(manifest), decision, false, None, Some("ExecutorMissing".to_string()))
                    .map_err(RuntimeError::AuditFault)?;
                return Err(RuntimeError::ExecutorMissing(tool_call.tool_id.clone()));
            }
        };

        // Step 7: execute outside the lock, then audit exactly once.
        let outcome = executor.execute(&tool_call.action, &tool_call.args).await;

        let mut state = self.state.lock().expect("runtime mutex poisoned");
        match outcome {
            Ok(result) => {
                let result_type = Some(json_type_name(&result).to_string());
                state
                    .audit
                    .log(tool_call, Some(manifest), decision, true, result_type, None)
                    .map_err(RuntimeError::AuditFault)?;
                Ok(result)
            }
            Err(err) => {
                state
                    .audit
                    .log(tool_call.clone(), Some(manifest), decision, true, None, Some(err.to_string()))
                    .map_err(RuntimeError::AuditFault)?;
                Err(RuntimeError::ExecutorFault {
                    tool_id: tool_call.tool_id,
                    source: err,
                })
            }
        }
    }

    pub fn enter_emptiness(&self, reason: impl Into<String>) {
        self.state.lock().expect("runtime mutex poisoned").emptiness.activate(reason);
    }

    pub fn exit_emptiness(&self, require_review: bool) -> Option<crate::types::ReviewPacket> {
        self.state
            .lock()
            .expect("runtime mutex poisoned")
            .emptiness
            .deactivate(require_review)
    }

    pub fn emergency_stop(&self, reason: impl Into<String>) {
        self.state.lock().expect("runtime mutex poisoned").emergency.activate(reason);
    }

    pub fn emergency_clear(&self) {
        self.state.lock().expect("runtime mutex poisoned").emergency.deactivate();
    }

    pub fn grant_omega2_approval(&self, tool_id: impl Into<String>, duration: chrono::Duration) {
        self.state
            .lock()
            .expect("runtime mutex poisoned")
            .policy
            .grant_omega2_approval(tool_id, duration);
    }

    pub fn revoke_omega2_approval(&self, tool_id: &str) {
        self.state.lock().expect("runtime mutex poisoned").policy.revoke_omega2_approval(tool_id);
    }

    pub fn block_tool(&self, tool_id: impl Into<String>) {
        self.state.lock().expect("runtime mutex poisoned").policy.block_tool(tool_id);
    }

    pub fn unblock_tool(&self, tool_id: &str) {
        self.state.lock().expect("runtime mutex poisoned").policy.unblock_tool(tool_id);
    }

    pub fn update_gate_metrics(&self, metrics: crate::types::GateMetrics) {
        self.state.lock().expect("runtime mutex poisoned").gate.update_metrics(metrics);
    }

    pub fn audit_summary(&self) -> AuditSummary {
        self.state.lock().expect("runtime mutex poisoned").audit.summary()
    }

    pub fn status(&self) -> RuntimeStatus {
        let state = self.state.lock().expect("runtime mutex poisoned");
        RuntimeStatus {
            emptiness: state.emptiness.status(),
            emergency_active: state.emergency.is_active(),
            emergency_reason: state.emergency.reason().to_string(),
            registered_tools: state.registry.list_tools().len(),
            audit_summary: state.audit.summary(),
        }
    }
}

#[derive(serde::Serialize)]
pub struct RuntimeStatus {
    pub emptiness: EmptinessStatus,
    pub emergency_active: bool,
    pub emergency_reason: String,
    pub registered_tools: usize,
    pub audit_summary: AuditSummary,
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "Null",
        serde_json::Value::Bool(_) => "Bool",
        serde_json::Value::Number(_) => "Number",
        serde_json::Value::String(_) => "String",
        serde_json::Value::Array(_) => "Array",
        serde_json::Value::Object(_) => "Object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolExecutor;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl ToolExecutor for Echo {
        async fn execute(&self, action: &str, _args: &std::collections::BTreeMap<String, serde_json::Value>) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({ "ran": action }))
        }
    }

    struct Faulty;

    #[async_trait]
    impl ToolExecutor for Faulty {
        async fn execute(&self, _action: &str, _args: &std::collections::BTreeMap<String, serde_json::Value>) -> anyhow::Result<serde_json::Value> {
            Err(anyhow::anyhow!("boom"))
        }
    }

    fn runtime() -> SecurityRuntime {
        SecurityRuntime::new(RuntimeConfig::default(), AuditLogger::in_memory())
    }

    #[tokio::test]
    async fn unregistered_tool_is_rejected_and_audited() {
        let rt = runtime();
        let err = rt.execute(ToolCall::new("ghost", "run"), false).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ToolNotRegistered(_)));
        assert_eq!(rt.audit_summary().total, 1);
    }

    #[tokio::test]
    async fn omega0_tool_executes_and_audits() {
        let rt = runtime();
        rt.register_tool(
            ToolManifest::new("read_file", BlastRadius::Omega0, "reads"),
            Some(Arc::new(Echo)),
        );
        let result = rt.execute(ToolCall::new("read_file", "read"), false).await.unwrap();
        assert_eq!(result, serde_json::json!({ "ran": "read" }));
        let summary = rt.audit_summary();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.executed, 1);
    }

    #[tokio::test]
    async fn omega2_tool_denied_by_default() {
        let rt = runtime();
        rt.register_tool(
            ToolManifest::new("exec", BlastRadius::Omega2, "runs shell commands"),
            Some(Arc::new(Echo)),
        );
        let err = rt.execute(ToolCall::new("exec", "run"), false).await.unwrap_err();
        assert!(matches!(err, RuntimeError::PolicyDenied(_)));
    }

    #[tokio::test]
    async fn omega2_tool_allowed_after_approval() {
        let rt = runtime();
        rt.register_tool(
            ToolManifest::new("exec", BlastRadius::Omega2, "runs shell commands"),
            Some(Arc::new(Echo)),
        );
        rt.grant_omega2_approval("exec", chrono::Duration::seconds(60));
        let result = rt.execute(ToolCall::new("exec", "run"), false).await.unwrap();
        assert_eq!(result, serde_json::json!({ "ran": "run" }));
    }

    #[tokio::test]
    async fn emptiness_window_blocks_omega1_and_generates_packet_on_exit() {
        let rt = runtime();
        rt.register_tool(
            ToolManifest::new("write_file", BlastRadius::Omega1, "writes"),
            Some(Arc::new(Echo)),
        );
        rt.enter_emptiness("incident");
        let err = rt.execute(ToolCall::new("write_file", "write"), false).await.unwrap_err();
        assert!(matches!(err, RuntimeError::EmptinessActive { .. }));

        let packet = rt.exit_emptiness(true);
        assert!(packet.is_some());
    }

    #[tokio::test]
    async fn emergency_gate_blocks_non_omega0() {
        let rt = runtime();
        rt.register_tool(
            ToolManifest::new("write_file", BlastRadius::Omega1, "writes"),
            Some(Arc::new(Echo)),
        );
        rt.register_tool(
            ToolManifest::new("read_file", BlastRadius::Omega0, "reads"),
            Some(Arc::new(Echo)),
        );
        rt.emergency_stop("breach detected");

        let denied = rt.execute(ToolCall::new("write_file", "write"), false).await;
        assert!(matches!(denied, Err(RuntimeError::GateFailed(_))));

        let allowed = rt.execute(ToolCall::new("read_file", "read"), false).await;
        assert!(allowed.is_ok());
    }

    #[tokio::test]
    async fn dry_run_short_circuits_before_execution() {
        let rt = runtime();
        rt.register_tool(
            ToolManifest::new("read_file", BlastRadius::Omega0, "reads"),
            Some(Arc::new(Echo)),
        );
        let result = rt.execute(ToolCall::new("read_file", "read"), true).await.unwrap();
        assert_eq!(result, serde_json::json!({ "dry_run": true, "would_execute": true }));
    }

    #[tokio::test]
    async fn executor_fault_is_audited_and_propagated() {
        let rt = runtime();
        rt.register_tool(
            ToolManifest::new("read_file", BlastRadius::Omega0, "reads"),
            Some(Arc::new(Faulty)),
        );
        let err = rt.execute(ToolCall::new("read_file", "read"), false).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ExecutorFault { .. }));
        assert_eq!(rt.audit_summary().errors, 1);
    }

    #[tokio::test]
    async fn missing_executor_is_rejected() {
        let rt = runtime();
        rt.register_tool(ToolManifest::new("read_file", BlastRadius::Omega0, "reads"), None);
        let err = rt.execute(ToolCall::new("read_file", "read"), false).await.unwrap_err();
        assert!(matches!(err, RuntimeError::ExecutorMissing(_)));
    }
}
