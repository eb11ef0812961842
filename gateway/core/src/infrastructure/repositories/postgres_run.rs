// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `AgentRunRepository` backed by the `agent_runs` and
//! `agent_steps` tables. Schema migrations are managed outside this crate.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::repository::{AgentRunRepository, RepositoryError};
use crate::domain::run::{AgentRun, AgentStep, RunStatus};

pub struct PostgresRunRepository {
    pool: PgPool,
}

impl PostgresRunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_run(row: &PgRow) -> Result<AgentRun, RepositoryError> {
    let status_str: String = row.get("status");
    let status = RunStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Database(format!("unknown run status: {status_str}")))?;
    Ok(AgentRun {
        id: row.get("id"),
        goal: row.get("goal"),
        status,
        run_metadata: row.get("run_metadata"),
        created_at: row.get("created_at"),
    })
}

fn row_to_step(row: &PgRow) -> AgentStep {
    AgentStep {
        id: row.get("id"),
        run_id: row.get("run_id"),
        index: row.get("step_index"),
        label: row.get("label"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl AgentRunRepository for PostgresRunRepository {
    async fn save_run(&self, run: &AgentRun) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO agent_runs (id, goal, status, run_metadata, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                goal = EXCLUDED.goal,
                status = EXCLUDED.status,
                run_metadata = EXCLUDED.run_metadata
            "#,
        )
        .bind(&run.id)
        .bind(&run.goal)
        .bind(run.status.as_str())
        .bind(&run.run_metadata)
        .bind(run.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_run(&self, id: &str) -> Result<Option<AgentRun>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, goal, status, run_metadata, created_at FROM agent_runs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_run).transpose()
    }

    async fn create_step(
        &self,
        run_id: &str,
        index: i64,
        label: &str,
    ) -> Result<AgentStep, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO agent_steps (run_id, step_index, label, created_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, run_id, step_index, label, created_at
            "#,
        )
        .bind(run_id)
        .bind(index)
        .bind(label)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_step(&row))
    }

    async fn find_step(&self, id: i64) -> Result<Option<AgentStep>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, run_id, step_index, label, created_at FROM agent_steps WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_step))
    }
}
