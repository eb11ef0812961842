// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `ApprovalRepository` backed by the `approvals` table.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::approval::{ApprovalRecord, ApprovalStatus, NewApproval};
use crate::domain::repository::{ApprovalRepository, RepositoryError};

pub struct PostgresApprovalRepository {
    pool: PgPool,
}

impl PostgresApprovalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, action, proposal, requester, status, decided_by, decision_notes, \
     outcome, run_id, tool_call_id, created_at, decided_at";

fn row_to_approval(row: &PgRow) -> Result<ApprovalRecord, RepositoryError> {
    let status_str: String = row.get("status");
    let status = ApprovalStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Database(format!("unknown approval status: {status_str}"))
    })?;
    Ok(ApprovalRecord {
        id: row.get("id"),
        action: row.get("action"),
        proposal: row.get("proposal"),
        requester: row.get("requester"),
        status,
        decided_by: row.get("decided_by"),
        decision_notes: row.get("decision_notes"),
        outcome: row.get("outcome"),
        run_id: row.get("run_id"),
        tool_call_id: row.get("tool_call_id"),
        created_at: row.get("created_at"),
        decided_at: row.get("decided_at"),
    })
}

#[async_trait]
impl ApprovalRepository for PostgresApprovalRepository {
    async fn create(&self, new: NewApproval) -> Result<ApprovalRecord, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO approvals (action, proposal, requester, status, run_id, tool_call_id, created_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, NOW())
            RETURNING {COLUMNS}
            "#,
        ))
        .bind(&new.action)
        .bind(&new.proposal)
        .bind(&new.requester)
        .bind(&new.run_id)
        .bind(new.tool_call_id)
        .fetch_one(&self.pool)
        .await?;
        row_to_approval(&row)
    }

    async fn update(&self, approval: &ApprovalRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE approvals SET
                status = $2,
                decided_by = $3,
                decision_notes = $4,
                outcome = $5,
                tool_call_id = $6,
                decided_at = $7
            WHERE id = $1
            "#,
        )
        .bind(approval.id)
        .bind(approval.status.as_str())
        .bind(&approval.decided_by)
        .bind(&approval.decision_notes)
        .bind(&approval.outcome)
        .bind(approval.tool_call_id)
        .bind(approval.decided_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("approval {}", approval.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ApprovalRecord>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM approvals WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_approval).transpose()
    }

    async fn list(
        &self,
        status: Option<ApprovalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS} FROM approvals
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_approval).collect()
    }
}
