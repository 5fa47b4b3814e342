//! Tool-call security runtime for autonomous agents.
//!
//! Mediates every capability invocation an agent proposes: blast-radius
//! classification, static policy, a dynamic monitorability gate, an operator
//! safety mode, and an append-only audit trail. The driver loop that calls
//! into this crate, and the tools it executes, are both out of scope —
//! this crate only sees manifest/executor registrations and `ToolCall`s.

pub mod audit;
pub mod emptiness;
pub mod error;
pub mod facade;
pub mod gate;
pub mod policy;
pub mod registry;
pub mod runtime;
pub mod types;
pub mod wire;

pub use audit::{AuditLogger, AuditSummary};
pub use emptiness::{EmptinessController, EmptinessStatus};
pub use error::RuntimeError;
pub use facade::{render_error, SecureToolRegistry};
pub use gate::{EmergencyGate, MonitorabilityGate};
pub use policy::{PolicyDocument, PolicyEngine};
pub use registry::{ToolExecutor, ToolRegistry};
pub use runtime::{RuntimeConfig, RuntimeStatus, SecurityRuntime};
pub use types::{
    AuditEntry, BlastRadius, Decision, EmptinessState, GateMetrics, GateStatus, PolicyDecision,
    ReviewPacket, ToolCall, ToolManifest,
};

/// Install a `tracing-subscriber` fmt layer honoring `RUST_LOG`, matching
/// the teacher's CLI logging setup. Call once at process startup; harmless
/// (returns without panicking) if a global subscriber is already set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
