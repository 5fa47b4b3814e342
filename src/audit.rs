//! Append-only audit log: in-memory index plus an optional durable JSONL sink.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::types::{AuditEntry, PolicyDecision, ToolCall, ToolManifest};

/// Typed summary counts, mirroring `get_summary()` but with field access
/// instead of a generic map.
#[derive(Debug, Default, Serialize)]
pub struct AuditSummary {
    pub total: usize,
    pub allowed: usize,
    pub denied: usize,
    pub executed: usize,
    pub errors: usize,
    pub by_omega_level: IndexMap<String, usize>,
}

pub struct AuditLogger {
    entries: Vec<AuditEntry>,
    sink: Option<BufWriter<File>>,
    log_path: Option<PathBuf>,
    next_id: u64,
}

impl AuditLogger {
    /// In-memory only; nothing is written to disk.
    pub fn in_memory() -> Self {
        Self {
            entries: Vec::new(),
            sink: None,
            log_path: None,
            next_id: 0,
        }
    }

    /// Durable sink appended to on every `log()` call, flushed immediately.
    pub fn with_durable_sink(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            entries: Vec::new(),
            sink: Some(BufWriter::new(file)),
            log_path: Some(path),
            next_id: 0,
        })
    }

    pub fn log(
        &mut self,
        tool_call: ToolCall,
        manifest: Option<ToolManifest>,
        policy_decision: PolicyDecision,
        executed: bool,
        result_type: Option<String>,
        error: Option<String>,
    ) -> anyhow::Result<&AuditEntry> {
        self.next_id += 1;
        let entry = AuditEntry {
            entry_id: format!("audit-{}", self.next_id),
            tool_call,
            manifest,
            policy_decision,
            executed,
            result_type,
            error,
            timestamp: chrono::Utc::now(),
        };

        tracing::info!(
            tool_id = %entry.tool_call.tool_id,
            decision = ?entry.policy_decision.decision,
            executed = entry.executed,
            "tool call audited"
        );

        if let Some(sink) = self.sink.as_mut() {
            let line = serde_json::to_string(&crate::wire::audit_entry_to_wire(&entry))?;
            writeln!(sink, "{line}")?;
            sink.flush()?;
        }

        self.entries.push(entry);
        Ok(self.entries.last().expect("entry just pushed"))
    }

    pub fn entries(&self, limit: Option<usize>, tool_id: Option<&str>, decision_filter: Option<&str>) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| tool_id.map(|id| e.tool_call.tool_id == id).unwrap_or(true))
            .filter(|e| {
                decision_filter
                    .map(|d| format!("{:?}", e.policy_decision.decision).eq_ignore_ascii_case(d))
                    .unwrap_or(true)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .take(limit.unwrap_or(usize::MAX))
            .rev()
            .collect()
    }

    pub fn summary(&self) -> AuditSummary {
        let mut summary = AuditSummary::default();
        summary.total = self.entries.len();
        for entry in &self.entries {
            match entry.policy_decision.decision {
                crate::types::Decision::Allow => summary.allowed += 1,
                crate::types::Decision::Deny => summary.denied += 1,
                crate::types::Decision::Review => {}
            }
            if entry.executed {
                summary.executed += 1;
            }
            if entry.error.is_some() {
                summary.errors += 1;
            }
            let key = format!("{:?}", entry.policy_decision.omega_level);
            *summary.by_omega_level.entry(key).or_insert(0) += 1;
        }
        summary
    }

    pub fn export_jsonl(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for entry in &self.entries {
            let line = serde_json::to_string(&crate::wire::audit_entry_to_wire(entry))?;
            writeln!(writer, "{line}")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Clear in-memory entries. Does not truncate the durable sink.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }
}
