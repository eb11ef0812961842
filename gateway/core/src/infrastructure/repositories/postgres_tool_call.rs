// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `ToolCallRepository` backed by the `tool_call_logs` table.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::repository::{RepositoryError, ToolCallRepository};
use crate::domain::tool_call::{NewToolCall, ToolCallRecord, ToolCallStatus};

pub struct PostgresToolCallRepository {
    pool: PgPool,
}

impl PostgresToolCallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const COLUMNS: &str = "id, run_id, step_id, tool_name, status, correlation_id, \
     input, output, error_message, duration_ms, created_at";

fn row_to_record(row: &PgRow) -> Result<ToolCallRecord, RepositoryError> {
    let status_str: String = row.get("status");
    let status = ToolCallStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Database(format!("unknown tool call status: {status_str}"))
    })?;
    Ok(ToolCallRecord {
        id: row.get("id"),
        run_id: row.get("run_id"),
        step_id: row.get("step_id"),
        tool_name: row.get("tool_name"),
        status,
        correlation_id: row.get("correlation_id"),
        input: row.get("input"),
        output: row.get("output"),
        error_message: row.get("error_message"),
        duration_ms: row.get("duration_ms"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl ToolCallRepository for PostgresToolCallRepository {
    async fn create(&self, new: NewToolCall) -> Result<ToolCallRecord, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO tool_call_logs (run_id, step_id, tool_name, status, correlation_id, input, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {COLUMNS}
            "#,
        ))
        .bind(&new.run_id)
        .bind(new.step_id)
        .bind(&new.tool_name)
        .bind(new.status.as_str())
        .bind(&new.correlation_id)
        .bind(&new.input)
        .fetch_one(&self.pool)
        .await?;
        row_to_record(&row)
    }

    async fn update(&self, record: &ToolCallRecord) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE tool_call_logs SET
                step_id = $2,
                status = $3,
                correlation_id = $4,
                input = $5,
                output = $6,
                error_message = $7,
                duration_ms = $8
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.step_id)
        .bind(record.status.as_str())
        .bind(&record.correlation_id)
        .bind(&record.input)
        .bind(&record.output)
        .bind(&record.error_message)
        .bind(record.duration_ms)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("tool call {}", record.id)));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ToolCallRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM tool_call_logs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_by_run(
        &self,
        run_id: &str,
        limit: i64,
    ) -> Result<Vec<ToolCallRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS} FROM tool_call_logs
            WHERE run_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        ))
        .bind(run_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }
}
