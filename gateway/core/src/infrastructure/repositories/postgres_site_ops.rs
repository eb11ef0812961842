// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL `SiteOpsRepository` backed by the `site_test_runs` and
//! `site_deployments` tables.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::repository::{RepositoryError, SiteOpsRepository};
use crate::domain::site_ops::{NewSiteDeployment, NewSiteTestRun, SiteDeployment, SiteTestRun};

pub struct PostgresSiteOpsRepository {
    pool: PgPool,
}

impl PostgresSiteOpsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_test_run(row: &PgRow) -> SiteTestRun {
    SiteTestRun {
        id: row.get("id"),
        version: row.get("version"),
        environment: row.get("environment"),
        status: row.get("status"),
        summary: row.get("summary"),
        results: row.get("results"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    }
}

fn row_to_deployment(row: &PgRow) -> SiteDeployment {
    SiteDeployment {
        id: row.get("id"),
        environment: row.get("environment"),
        version: row.get("version"),
        status: row.get("status"),
        rollback_version: row.get("rollback_version"),
        record_metadata: row.get("record_metadata"),
        created_at: row.get("created_at"),
        deployed_at: row.get("deployed_at"),
    }
}

#[async_trait]
impl SiteOpsRepository for PostgresSiteOpsRepository {
    async fn create_test_run(&self, new: NewSiteTestRun) -> Result<SiteTestRun, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO site_test_runs (version, environment, status, summary, results, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), $6)
            RETURNING id, version, environment, status, summary, results, created_at, completed_at
            "#,
        )
        .bind(&new.version)
        .bind(&new.environment)
        .bind(&new.status)
        .bind(&new.summary)
        .bind(&new.results)
        .bind(new.completed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_test_run(&row))
    }

    async fn latest_test_run(
        &self,
        version: &str,
        environment: &str,
    ) -> Result<Option<SiteTestRun>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, version, environment, status, summary, results, created_at, completed_at
            FROM site_test_runs
            WHERE version = $1 AND environment = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(version)
        .bind(environment)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_test_run))
    }

    async fn create_deployment(
        &self,
        new: NewSiteDeployment,
    ) -> Result<SiteDeployment, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO site_deployments (environment, version, status, rollback_version, record_metadata, created_at, deployed_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), $6)
            RETURNING id, environment, version, status, rollback_version, record_metadata, created_at, deployed_at
            "#,
        )
        .bind(&new.environment)
        .bind(&new.version)
        .bind(&new.status)
        .bind(&new.rollback_version)
        .bind(&new.record_metadata)
        .bind(new.deployed_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_deployment(&row))
    }

    async fn latest_deployment(
        &self,
        environment: &str,
    ) -> Result<Option<SiteDeployment>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, environment, version, status, rollback_version, record_metadata, created_at, deployed_at
            FROM site_deployments
            WHERE environment = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(environment)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_deployment))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
