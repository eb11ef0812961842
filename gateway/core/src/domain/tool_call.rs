// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Call Log
//!
//! One `ToolCallRecord` per logical tool invocation. An approval round-trip
//! reuses the record it created rather than allocating a second one, which is
//! what gives the gateway its at-most-once guarantee: a handler with side
//! effects runs at most once per record.
//!
//! Status transitions are monotonic along
//! `running → {requires_approval → running} → {completed|failed|blocked|denied}`;
//! the gateway never moves a record backwards out of a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Running,
    RequiresApproval,
    Blocked,
    Denied,
    Completed,
    Failed,
}

impl ToolCallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCallStatus::Running => "running",
            ToolCallStatus::RequiresApproval => "requires_approval",
            ToolCallStatus::Blocked => "blocked",
            ToolCallStatus::Denied => "denied",
            ToolCallStatus::Completed => "completed",
            ToolCallStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(ToolCallStatus::Running),
            "requires_approval" => Some(ToolCallStatus::RequiresApproval),
            "blocked" => Some(ToolCallStatus::Blocked),
            "denied" => Some(ToolCallStatus::Denied),
            "completed" => Some(ToolCallStatus::Completed),
            "failed" => Some(ToolCallStatus::Failed),
            _ => None,
        }
    }

    /// Terminal records are never re-invoked; retries require a new call.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolCallStatus::Completed
                | ToolCallStatus::Failed
                | ToolCallStatus::Blocked
                | ToolCallStatus::Denied
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: i64,
    pub run_id: String,
    pub step_id: Option<i64>,
    pub tool_name: String,
    pub status: ToolCallStatus,
    pub correlation_id: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload; the repository assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewToolCall {
    pub run_id: String,
    pub step_id: Option<i64>,
    pub tool_name: String,
    pub status: ToolCallStatus,
    pub correlation_id: Option<String>,
    pub input: Option<Value>,
}
