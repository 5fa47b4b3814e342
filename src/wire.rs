//! External JSON wire format for the audit log (§6 "Audit log (JSON lines)").
//!
//! Kept separate from `AuditEntry`'s derived `Serialize` impl: the derive
//! produces the Rust-facing shape used for in-process (de)serialization and
//! round-tripping, while this module produces the on-disk record schema
//! other tooling (log shippers, the review UI) parses — float-seconds
//! timestamps, an ISO string alongside, and enum fields by symbolic name.

use serde_json::{json, Value};

use crate::types::AuditEntry;

fn epoch_seconds(ts: chrono::DateTime<chrono::Utc>) -> f64 {
    ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_nanos()) / 1_000_000_000.0
}

fn iso(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Render an `AuditEntry` into the §6 wire record.
pub fn audit_entry_to_wire(entry: &AuditEntry) -> Value {
    json!({
        "entry_id": entry.entry_id,
        "timestamp": epoch_seconds(entry.timestamp),
        "timestamp_iso": iso(entry.timestamp),
        "tool_call": {
            "tool_id": entry.tool_call.tool_id,
            "action": entry.tool_call.action,
            "args": entry.tool_call.args,
        },
        "manifest": entry.manifest.as_ref().map(manifest_to_wire),
        "decision": decision_to_wire(&entry.policy_decision),
        "executed": entry.executed,
        "result_type": entry.result_type,
        "error": entry.error,
    })
}

fn manifest_to_wire(manifest: &crate::types::ToolManifest) -> Value {
    json!({
        "tool_id": manifest.tool_id,
        "omega_level": manifest.omega_level.wire_name(),
        "description": manifest.description,
        "capabilities": manifest.capabilities,
        "network_domains": manifest.network_domains,
        "fs_paths": manifest.fs_paths,
        "requires_approval": manifest.requires_approval,
        "hash_sha256": manifest.content_hash,
    })
}

fn decision_to_wire(decision: &crate::types::PolicyDecision) -> Value {
    json!({
        "decision": decision.decision.wire_name(),
        "omega_level": decision.omega_level.wire_name(),
        "gate_status": decision.gate_status.wire_name(),
        "rationale": decision.rationale,
        "timestamp": epoch_seconds(decision.timestamp),
    })
}
