// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate, following the Repository
//! pattern: one trait per aggregate, interface defined in the domain layer,
//! implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|-----------------|
//! | `AgentRunRepository` | `AgentRun` / `AgentStep` | `InMemoryRunRepository`, `PostgresRunRepository` |
//! | `ToolCallRepository` | `ToolCallRecord` | `InMemoryToolCallRepository`, `PostgresToolCallRepository` |
//! | `ApprovalRepository` | `ApprovalRecord` | `InMemoryApprovalRepository`, `PostgresApprovalRepository` |
//! | `CanonicalVersionRepository` | `CanonicalVersion` | `InMemoryCanonicalRepository`, `PostgresCanonicalRepository` |
//! | `TaxonomySnapshotRepository` | `TaxonomySnapshot` | same files as above |
//! | `TaxonomyChangeRepository` | `TaxonomyChange` | same files as above |
//! | `SiteOpsRepository` | `SiteTestRun` / `SiteDeployment` | `InMemorySiteOpsRepository`, `PostgresSiteOpsRepository` |
//!
//! In-memory implementations back tests and development; PostgreSQL
//! implementations back production. Ids are repository-assigned (sequential
//! integers, except run ids which are caller-supplied uuids).

use async_trait::async_trait;

use crate::domain::approval::{ApprovalRecord, ApprovalStatus, NewApproval};
use crate::domain::canonical::{
    CanonicalVersion, NewSnapshot, NewTaxonomyChange, NewVersion, TaxonomyChange,
    TaxonomySnapshot, VersionFamily, VersionStatus,
};
use crate::domain::run::{AgentRun, AgentStep};
use crate::domain::site_ops::{NewSiteDeployment, NewSiteTestRun, SiteDeployment, SiteTestRun};
use crate::domain::tool_call::{NewToolCall, ToolCallRecord};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

#[async_trait]
pub trait AgentRunRepository: Send + Sync {
    /// Save run (create or update)
    async fn save_run(&self, run: &AgentRun) -> Result<(), RepositoryError>;

    async fn find_run(&self, id: &str) -> Result<Option<AgentRun>, RepositoryError>;

    /// Append a step to a run; the repository assigns the step id.
    async fn create_step(
        &self,
        run_id: &str,
        index: i64,
        label: &str,
    ) -> Result<AgentStep, RepositoryError>;

    async fn find_step(&self, id: i64) -> Result<Option<AgentStep>, RepositoryError>;
}

#[async_trait]
pub trait ToolCallRepository: Send + Sync {
    async fn create(&self, new: NewToolCall) -> Result<ToolCallRecord, RepositoryError>;

    /// Update an existing record in place (status, input, output, duration).
    async fn update(&self, record: &ToolCallRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ToolCallRecord>, RepositoryError>;

    /// Recent calls for a run, newest first.
    async fn find_by_run(
        &self,
        run_id: &str,
        limit: i64,
    ) -> Result<Vec<ToolCallRecord>, RepositoryError>;
}

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn create(&self, new: NewApproval) -> Result<ApprovalRecord, RepositoryError>;

    async fn update(&self, approval: &ApprovalRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ApprovalRecord>, RepositoryError>;

    /// Approvals newest first, optionally filtered by status.
    async fn list(
        &self,
        status: Option<ApprovalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError>;
}

/// Filter for canonical version reads. All fields are conjunctive; `None`
/// means "any".
#[derive(Debug, Clone, Default)]
pub struct VersionFilter {
    pub status: Option<VersionStatus>,
    pub scope_key: Option<String>,
}

impl VersionFilter {
    pub fn status(status: VersionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait CanonicalVersionRepository: Send + Sync {
    async fn create(&self, new: NewVersion) -> Result<CanonicalVersion, RepositoryError>;

    async fn update(&self, version: &CanonicalVersion) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<CanonicalVersion>, RepositoryError>;

    /// Newest committed version matching the filter.
    async fn latest(
        &self,
        family: VersionFamily,
        filter: &VersionFilter,
    ) -> Result<Option<CanonicalVersion>, RepositoryError>;

    /// Newest-first history, bounded by `limit`.
    async fn history(
        &self,
        family: VersionFamily,
        filter: &VersionFilter,
        limit: i64,
    ) -> Result<Vec<CanonicalVersion>, RepositoryError>;

    /// Delete all but the newest `keep` versions of a family, ordered by
    /// creation time. Descendants of purged rows get their
    /// `parent_version_id` set to null (no cascade). Returns purged ids.
    async fn trim(
        &self,
        family: VersionFamily,
        keep: usize,
    ) -> Result<Vec<i64>, RepositoryError>;
}

#[async_trait]
pub trait TaxonomySnapshotRepository: Send + Sync {
    async fn create(&self, new: NewSnapshot) -> Result<TaxonomySnapshot, RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<TaxonomySnapshot>, RepositoryError>;
}

#[async_trait]
pub trait TaxonomyChangeRepository: Send + Sync {
    /// Append one audit entry; entries are never updated or deleted.
    async fn append(&self, new: NewTaxonomyChange) -> Result<TaxonomyChange, RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<TaxonomyChange>, RepositoryError>;

    /// Newest-first change history.
    async fn list(&self, limit: i64) -> Result<Vec<TaxonomyChange>, RepositoryError>;
}

#[async_trait]
pub trait SiteOpsRepository: Send + Sync {
    async fn create_test_run(&self, new: NewSiteTestRun) -> Result<SiteTestRun, RepositoryError>;

    /// Newest check run for a version + environment pair.
    async fn latest_test_run(
        &self,
        version: &str,
        environment: &str,
    ) -> Result<Option<SiteTestRun>, RepositoryError>;

    async fn create_deployment(
        &self,
        new: NewSiteDeployment,
    ) -> Result<SiteDeployment, RepositoryError>;

    /// Newest deployment for an environment.
    async fn latest_deployment(
        &self,
        environment: &str,
    ) -> Result<Option<SiteDeployment>, RepositoryError>;

    /// Cheap connectivity probe used by `website.run_checks`.
    async fn ping(&self) -> Result<(), RepositoryError>;
}
