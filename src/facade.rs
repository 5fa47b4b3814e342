//! Secure registry façade: binds the runtime to a user-facing tool registry
//! behind a single execution path.
//!
//! The prototype this is grounded on (`secure_registry.py`) registers a
//! synchronous stub executor with the runtime and then re-implements the
//! emptiness/gate/policy checks itself before calling the real tool directly
//! — two paths to execution, only one of which is actually audited. This
//! façade has one path: the registered executor *is* the real tool, and
//! every call is mediated and audited by `SecurityRuntime::execute`.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::RuntimeError;
use crate::registry::ToolExecutor;
use crate::runtime::{RuntimeConfig, RuntimeStatus, SecurityRuntime};
use crate::types::{BlastRadius, ToolCall, ToolManifest};

/// Default tool-name to blast-radius mapping, ported from the prototype's
/// `DEFAULT_OMEGA_MAPPINGS` table. Callers may override per-registration.
pub fn default_blast_radius_mappings() -> IndexMap<&'static str, BlastRadius> {
    IndexMap::from([
        ("read_file", BlastRadius::Omega0),
        ("list_dir", BlastRadius::Omega0),
        ("web_search", BlastRadius::Omega0),
        ("web_fetch", BlastRadius::Omega0),
        ("message", BlastRadius::Omega0),
        ("write_file", BlastRadius::Omega1),
        ("edit_file", BlastRadius::Omega1),
        ("exec", BlastRadius::Omega2),
        ("spawn", BlastRadius::Omega2),
        ("cron", BlastRadius::Omega2),
    ])
}

/// User-facing façade over the security runtime.
pub struct SecureToolRegistry {
    runtime: SecurityRuntime,
    omega_mappings: IndexMap<String, BlastRadius>,
}

impl SecureToolRegistry {
    pub fn new(config: RuntimeConfig, audit: crate::audit::AuditLogger) -> Self {
        let omega_mappings = default_blast_radius_mappings()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self {
            runtime: SecurityRuntime::new(config, audit),
            omega_mappings,
        }
    }

    pub fn set_mapping(&mut self, tool_name: impl Into<String>, omega_level: BlastRadius) {
        self.omega_mappings.insert(tool_name.into(), omega_level);
    }

    /// Register a tool, deriving its blast radius from the mapping table
    /// (default Omega1 for unmapped names) unless `omega_level` overrides it.
    pub fn register(&self, tool_id: impl Into<String>, description: impl Into<String>, executor: Arc<dyn ToolExecutor>, omega_level: Option<BlastRadius>) {
        let tool_id = tool_id.into();
        let level = omega_level
            .or_else(|| self.omega_mappings.get(&tool_id).copied())
            .unwrap_or(BlastRadius::Omega1);
        let manifest = ToolManifest::new(tool_id, level, description);
        self.runtime.register_tool(manifest, Some(executor));
    }

    /// Execute a tool by name through the single orchestrator path. Errors
    /// are rendered with the conversational prefixes the driver loop expects.
    pub async fn execute(&self, tool_id: &str, action: &str, args: BTreeMap<String, serde_json::Value>) -> Result<serde_json::Value, String> {
        let call = ToolCall::new(tool_id, action).with_args(args);
        self.runtime.execute(call, false).await.map_err(|e| render_error(&e))
    }

    pub fn grant_approval(&self, tool_id: impl Into<String>, duration_seconds: i64) {
        self.runtime.grant_omega2_approval(tool_id, chrono::Duration::seconds(duration_seconds));
    }

    pub fn revoke_approval(&self, tool_id: &str) {
        self.runtime.revoke_omega2_approval(tool_id);
    }

    pub fn enter_safety_mode(&self, reason: impl Into<String>) {
        self.runtime.enter_emptiness(reason);
    }

    pub fn exit_safety_mode(&self) -> Option<crate::types::ReviewPacket> {
        self.runtime.exit_emptiness(true)
    }

    pub fn emergency_stop(&self, reason: impl Into<String>) {
        self.runtime.emergency_stop(reason);
    }

    pub fn emergency_clear(&self) {
        self.runtime.emergency_clear();
    }

    pub fn audit_summary(&self) -> crate::audit::AuditSummary {
        self.runtime.audit_summary()
    }

    pub fn status(&self) -> RuntimeStatus {
        self.runtime.status()
    }

    pub fn runtime(&self) -> &SecurityRuntime {
        &self.runtime
    }
}

/// Render a `RuntimeError` the way the driver loop's conversational channel
/// expects, mirroring `secure_loop.py`'s `f"[POLICY DENIED] {e}"` convention.
pub fn render_error(error: &RuntimeError) -> String {
    match error {
        RuntimeError::PolicyDenied(msg) => format!("[POLICY DENIED] {msg}"),
        RuntimeError::EmptinessActive { omega_level } => {
            format!("[EMPTINESS BLOCKED] action blocked: Emptiness Window active (O{omega_level})")
        }
        RuntimeError::GateFailed(msg) => format!("[GATE FAILED] {msg}"),
        RuntimeError::ToolNotRegistered(id) => format!("[TOOL NOT REGISTERED] '{id}' is not registered"),
        RuntimeError::ExecutorMissing(id) => format!("[TOOL NOT REGISTERED] no executor for '{id}'"),
        RuntimeError::ExecutorFault { tool_id, source } => format!("[EXECUTION ERROR] '{tool_id}': {source}"),
        RuntimeError::AuditFault(source) => format!("[AUDIT FAULT] {source}"),
    }
}
