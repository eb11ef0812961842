// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Approval Service
//!
//! Creation, listing, and the single atomic decision transition for
//! approvals. The gateway creates approvals itself when policy demands one;
//! this service is the surface the console (and humans) use to create and
//! decide them.

use std::sync::Arc;

use thiserror::Error;

use crate::application::GatewayStores;
use crate::domain::approval::{
    ApprovalDecision, ApprovalError, ApprovalRecord, ApprovalStatus, NewApproval,
};
use crate::domain::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum ApprovalServiceError {
    #[error("Agent run not found: {0}")]
    RunNotFound(String),

    #[error("Tool call not found: {0}")]
    ToolCallNotFound(i64),

    #[error("Approval not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

pub struct ApprovalService {
    stores: Arc<GatewayStores>,
}

impl ApprovalService {
    pub fn new(stores: Arc<GatewayStores>) -> Self {
        Self { stores }
    }

    /// Create a `pending` approval. Referenced runs and tool calls must
    /// exist.
    pub async fn create(&self, new: NewApproval) -> Result<ApprovalRecord, ApprovalServiceError> {
        if let Some(run_id) = &new.run_id {
            if self.stores.runs.find_run(run_id).await?.is_none() {
                return Err(ApprovalServiceError::RunNotFound(run_id.clone()));
            }
        }
        if let Some(tool_call_id) = new.tool_call_id {
            if self
                .stores
                .tool_calls
                .find_by_id(tool_call_id)
                .await?
                .is_none()
            {
                return Err(ApprovalServiceError::ToolCallNotFound(tool_call_id));
            }
        }
        Ok(self.stores.approvals.create(new).await?)
    }

    pub async fn get(&self, id: i64) -> Result<ApprovalRecord, ApprovalServiceError> {
        self.stores
            .approvals
            .find_by_id(id)
            .await?
            .ok_or(ApprovalServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        status: Option<ApprovalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ApprovalRecord>, ApprovalServiceError> {
        Ok(self.stores.approvals.list(status, limit, offset).await?)
    }

    /// Apply the one-and-only terminal decision to a pending approval.
    pub async fn decide(
        &self,
        id: i64,
        decision: ApprovalDecision,
    ) -> Result<ApprovalRecord, ApprovalServiceError> {
        let mut approval = self.get(id).await?;
        approval.decide(decision)?;
        self.stores.approvals.update(&approval).await?;
        Ok(approval)
    }
}
