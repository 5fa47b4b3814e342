//! Typed failure taxonomy for fail-closed propagation through the orchestrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("tool '{0}' is not registered")]
    ToolNotRegistered(String),

    #[error("policy denied: {0}")]
    PolicyDenied(String),

    #[error("monitorability gate failed: {0}")]
    GateFailed(String),

    #[error("action blocked: Emptiness Window active (O{omega_level})")]
    EmptinessActive { omega_level: u8 },

    #[error("no executor registered for '{0}'")]
    ExecutorMissing(String),

    #[error("executor fault for '{tool_id}': {source}")]
    ExecutorFault {
        tool_id: String,
        #[source]
        source: anyhow::Error,
    },

    /// A durable audit sink write failed. Per the fail-closed rule this is a
    /// denial from the caller's perspective even when the underlying tool
    /// call would otherwise have been allowed or already executed.
    #[error("audit sink write failed: {0}")]
    AuditFault(anyhow::Error),
}
