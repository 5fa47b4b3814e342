//! Emptiness Window ("Controlled Nirvana"): an operational safety mode that
//! removes commit power (Omega1/Omega2) while preserving read-only cognition.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{BlastRadius, EmptinessState, ReviewPacket, ToolCall};

#[derive(Debug, Clone, Serialize)]
pub struct EmptinessStatus {
    pub state: EmptinessState,
    pub is_active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub activation_reason: String,
    pub blocked_calls_count: usize,
    pub duration_seconds: Option<f64>,
}

/// Sticky safety-mode controller. Once activated it stays active until an
/// explicit `deactivate()` call — there is no automatic exit.
pub struct EmptinessController {
    state: EmptinessState,
    activated_at: Option<DateTime<Utc>>,
    activation_reason: String,
    blocked_calls: Vec<ToolCall>,
    review_packets: Vec<ReviewPacket>,
    next_packet_id: u64,
}

impl Default for EmptinessController {
    fn default() -> Self {
        Self {
            state: EmptinessState::Normal,
            activated_at: None,
            activation_reason: String::new(),
            blocked_calls: Vec::new(),
            review_packets: Vec::new(),
            next_packet_id: 0,
        }
    }
}

impl EmptinessController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EmptinessState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, EmptinessState::Emptiness)
    }

    pub fn activate(&mut self, reason: impl Into<String>) {
        if matches!(self.state, EmptinessState::Normal) {
            self.state = EmptinessState::Emptiness;
            self.activated_at = Some(Utc::now());
            self.activation_reason = reason.into();
            self.blocked_calls.clear();
        }
    }

    /// Deactivate and return to normal operation. Generates a review packet
    /// when `require_review` is true and calls were blocked during the window.
    pub fn deactivate(&mut self, require_review: bool) -> Option<ReviewPacket> {
        if !matches!(self.state, EmptinessState::Emptiness) {
            return None;
        }

        let packet = if require_review && !self.blocked_calls.is_empty() {
            Some(self.generate_review_packet())
        } else {
            None
        };

        self.state = EmptinessState::Normal;
        self.activated_at = None;
        self.activation_reason.clear();
        self.blocked_calls.clear();
        packet
    }

    /// Whether an action at the given blast radius is allowed right now.
    pub fn check_allowed(&self, omega_level: BlastRadius) -> bool {
        if matches!(self.state, EmptinessState::Normal) {
            return true;
        }
        matches!(omega_level, BlastRadius::Omega0)
    }

    pub fn record_blocked_call(&mut self, tool_call: ToolCall) {
        if matches!(self.state, EmptinessState::Emptiness) {
            self.blocked_calls.push(tool_call);
        }
    }

    fn generate_review_packet(&mut self) -> ReviewPacket {
        self.next_packet_id += 1;
        let packet = ReviewPacket {
            packet_id: format!("review-{}", self.next_packet_id),
            timestamp: Utc::now(),
            blocked_calls: self.blocked_calls.clone(),
            proposed_plan: None,
            dry_run_diffs: Vec::new(),
            context_summary: None,
            recommendation: Some(format!(
                "{} action(s) blocked during Emptiness Window",
                self.blocked_calls.len()
            )),
        };
        self.review_packets.push(packet.clone());
        packet
    }

    pub fn status(&self) -> EmptinessStatus {
        EmptinessStatus {
            state: self.state,
            is_active: self.is_active(),
            activated_at: self.activated_at,
            activation_reason: self.activation_reason.clone(),
            blocked_calls_count: self.blocked_calls.len(),
            duration_seconds: self
                .activated_at
                .map(|at| (Utc::now() - at).num_milliseconds() as f64 / 1000.0),
        }
    }

    pub fn blocked_calls(&self) -> &[ToolCall] {
        &self.blocked_calls
    }

    pub fn review_packets(&self) -> &[ReviewPacket] {
        &self.review_packets
    }

    /// Extension point: populate the proposed plan on the next generated
    /// packet. No producer inside this crate calls it; see DESIGN.md.
    pub fn set_proposed_plan(&mut self, plan: impl Into<String>) {
        if let Some(last) = self.review_packets.last_mut() {
            last.proposed_plan = Some(plan.into());
        }
    }

    /// Extension point: attach a dry-run diff to the most recent packet.
    pub fn add_dry_run_diff(&mut self, diff: serde_json::Value) {
        if let Some(last) = self.review_packets.last_mut() {
            last.dry_run_diffs.push(diff);
        }
    }
}
