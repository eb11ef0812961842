// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Agent runs and steps. The gateway only needs these to verify that a
//! submitted `run_id` / `step_id` actually exists; planning and scheduling of
//! runs happens outside this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(RunStatus::Queued),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    pub id: String,
    pub goal: Option<String>,
    pub status: RunStatus,
    pub run_metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AgentRun {
    pub fn new(goal: impl Into<Option<String>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            goal: goal.into(),
            status: RunStatus::Queued,
            run_metadata: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStep {
    pub id: i64,
    pub run_id: String,
    pub index: i64,
    pub label: String,
    pub created_at: DateTime<Utc>,
}
