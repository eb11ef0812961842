// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Approval Records
//!
//! Human-in-the-loop sign-off for gated tool invocations. An approval is
//! created `pending` (by the gateway when policy demands it, or by a human
//! through the console) and transitions exactly once to `approved` or
//! `rejected`. The transition is irreversible: a decided approval can never
//! be re-decided.
//!
//! An approval is bound to at most one tool-call record (`tool_call_id`);
//! the gateway refuses to execute a tool whose name does not match
//! `action`, or whose run conflicts with `run_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ApprovalStatus::Pending),
            "approved" => Some(ApprovalStatus::Approved),
            "rejected" => Some(ApprovalStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Approval not found: {0}")]
    NotFound(i64),

    #[error("Approval {0} already decided")]
    AlreadyDecided(i64),

    #[error("Invalid decision status: {0}")]
    InvalidDecision(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub id: i64,
    pub action: String,
    pub proposal: Option<Value>,
    pub requester: String,
    pub status: ApprovalStatus,
    pub decided_by: Option<String>,
    pub decision_notes: Option<String>,
    pub outcome: Option<Value>,
    pub run_id: Option<String>,
    pub tool_call_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewApproval {
    pub action: String,
    pub proposal: Option<Value>,
    pub requester: String,
    pub run_id: Option<String>,
    pub tool_call_id: Option<i64>,
}

/// Terminal decision supplied by an external actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub status: ApprovalStatus,
    pub decided_by: Option<String>,
    pub decision_notes: Option<String>,
    pub outcome: Option<Value>,
}

impl ApprovalRecord {
    /// Apply a terminal decision. Fails when the decision is not terminal or
    /// the approval has already been decided.
    pub fn decide(&mut self, decision: ApprovalDecision) -> Result<(), ApprovalError> {
        if !decision.status.is_terminal() {
            return Err(ApprovalError::InvalidDecision(
                decision.status.as_str().to_string(),
            ));
        }
        if self.status.is_terminal() {
            return Err(ApprovalError::AlreadyDecided(self.id));
        }
        self.status = decision.status;
        self.decided_by = decision.decided_by;
        self.decision_notes = decision.decision_notes;
        self.outcome = decision.outcome;
        self.decided_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> ApprovalRecord {
        ApprovalRecord {
            id: 7,
            action: "website.deploy".to_string(),
            proposal: Some(serde_json::json!({"target": "staging"})),
            requester: "agent".to_string(),
            status: ApprovalStatus::Pending,
            decided_by: None,
            decision_notes: None,
            outcome: None,
            run_id: None,
            tool_call_id: None,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    #[test]
    fn decide_sets_terminal_state() {
        let mut approval = pending();
        approval
            .decide(ApprovalDecision {
                status: ApprovalStatus::Approved,
                decided_by: Some("reviewer".to_string()),
                decision_notes: Some("ship it".to_string()),
                outcome: None,
            })
            .unwrap();
        assert_eq!(approval.status, ApprovalStatus::Approved);
        assert!(approval.decided_at.is_some());
        assert_eq!(approval.decided_by.as_deref(), Some("reviewer"));
    }

    #[test]
    fn decide_twice_is_rejected() {
        let mut approval = pending();
        approval
            .decide(ApprovalDecision {
                status: ApprovalStatus::Rejected,
                decided_by: None,
                decision_notes: None,
                outcome: None,
            })
            .unwrap();
        let err = approval
            .decide(ApprovalDecision {
                status: ApprovalStatus::Approved,
                decided_by: None,
                decision_notes: None,
                outcome: None,
            })
            .unwrap_err();
        assert!(matches!(err, ApprovalError::AlreadyDecided(7)));
        assert_eq!(approval.status, ApprovalStatus::Rejected);
    }

    #[test]
    fn decide_with_pending_is_invalid() {
        let mut approval = pending();
        let err = approval
            .decide(ApprovalDecision {
                status: ApprovalStatus::Pending,
                decided_by: None,
                decision_notes: None,
                outcome: None,
            })
            .unwrap_err();
        assert!(matches!(err, ApprovalError::InvalidDecision(_)));
    }
}
