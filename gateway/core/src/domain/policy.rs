// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Policy decision types. The engine itself lives in
//! `crate::application::policy`; these types are shared with the gateway
//! and the call log.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    Allow,
    Deny,
    RequireApproval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub result: DecisionType,
    pub reason: Option<String>,
}

impl PolicyDecision {
    pub fn allow() -> Self {
        Self {
            result: DecisionType::Allow,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            result: DecisionType::Deny,
            reason: Some(reason.into()),
        }
    }

    pub fn require_approval(reason: impl Into<String>) -> Self {
        Self {
            result: DecisionType::RequireApproval,
            reason: Some(reason.into()),
        }
    }

    pub fn requires_approval(&self) -> bool {
        self.result == DecisionType::RequireApproval
    }

    pub fn denied(&self) -> bool {
        self.result == DecisionType::Deny
    }
}
