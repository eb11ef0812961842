// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! In-memory repository implementations backing tests and local development.
//! State lives behind `RwLock`ed maps; ids are assigned from per-repository
//! counters. A poisoned lock surfaces as `RepositoryError::Database`, never
//! a panic. Ordering mirrors the PostgreSQL implementations: newest first by
//! `created_at`, ties broken by id.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::approval::{ApprovalRecord, ApprovalStatus, NewApproval};
use crate::domain::canonical::{
    CanonicalVersion, NewSnapshot, NewTaxonomyChange, NewVersion, TaxonomyChange,
    TaxonomySnapshot, VersionFamily,
};
use crate::domain::repository::{
    AgentRunRepository, ApprovalRepository, CanonicalVersionRepository, RepositoryError,
    SiteOpsRepository, TaxonomyChangeRepository, TaxonomySnapshotRepository, ToolCallRepository,
    VersionFilter,
};
use crate::domain::run::{AgentRun, AgentStep};
use crate::domain::site_ops::{NewSiteDeployment, NewSiteTestRun, SiteDeployment, SiteTestRun};
use crate::domain::tool_call::{NewToolCall, ToolCallRecord};

fn newest_first(a: (DateTime<Utc>, i64), b: (DateTime<Utc>, i64)) -> std::cmp::Ordering {
    b.cmp(&a)
}

fn read_lock<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, RepositoryError> {
    lock.read()
        .map_err(|_| RepositoryError::Database("lock poisoned".to_string()))
}

fn write_lock<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, RepositoryError> {
    lock.write()
        .map_err(|_| RepositoryError::Database("lock poisoned".to_string()))
}

struct Table<T> {
    next_id: i64,
    rows: HashMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: HashMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn insert(&mut self, build: impl FnOnce(i64) -> T) -> i64 {
        self.next_id += 1;
        let id = self.next_id;
        self.rows.insert(id, build(id));
        id
    }
}

#[derive(Default)]
pub struct InMemoryRunRepository {
    runs: RwLock<HashMap<String, AgentRun>>,
    steps: RwLock<Table<AgentStep>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRunRepository for InMemoryRunRepository {
    async fn save_run(&self, run: &AgentRun) -> Result<(), RepositoryError> {
        write_lock(&self.runs)?.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn find_run(&self, id: &str) -> Result<Option<AgentRun>, RepositoryError> {
        Ok(read_lock(&self.runs)?.get(id).cloned())
    }

    async fn create_step(
        &self,
        run_id: &str,
        index: i64,
        label: &str,
    ) -> Result<AgentStep, RepositoryError> {
        let mut steps = write_lock(&self.steps)?;
        let id = steps.insert(|id| AgentStep {
            id,
            run_id: run_id.to_string(),
            index,
            label: label.to_string(),
            created_at: Utc::now(),
        });
        Ok(steps.rows[&id].clone())
    }

    async fn find_step(&self, id: i64) -> Result<Option<AgentStep>, RepositoryError> {
        Ok(read_lock(&self.steps)?.rows.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryToolCallRepository {
    state: RwLock<Table<ToolCallRecord>>,
}

impl InMemoryToolCallRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ToolCallRepository for InMemoryToolCallRepository {
    async fn create(&self, new: NewToolCall) -> Result<ToolCallRecord, RepositoryError> {
        let mut state = write_lock(&self.state)?;
        let id = state.insert(|id| ToolCallRecord {
            id,
            run_id: new.run_id.clone(),
            step_id: new.step_id,
            tool_name: new.tool_name.clone(),
            status: new.status,
            correlation_id: new.correlation_id.clone(),
            input: new.input.clone(),
            output: None,
            error_message: None,
            duration_ms: None,
            created_at: Utc::now(),
        });
        Ok(state.rows[&id].clone())
    }

    async fn update(&self, record: &ToolCallRecord) -> Result<(), RepositoryError> {
        let mut state = write_lock(&self.state)?;
        let slot = state
            .rows
            .get_mut(&record.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("tool call {}", record.id)))?;
        *slot = record.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ToolCallRecord>, RepositoryError> {
        Ok(read_lock(&self.state)?.rows.get(&id).cloned())
    }

    async fn find_by_run(
        &self,
        run_id: &str,
        limit: i64,
    ) -> Result<Vec<ToolCallRecord>, RepositoryError> {
        let state = read_lock(&self.state)?;
        let mut calls: Vec<ToolCallRecord> = state
            .rows
            .values()
            .filter(|call| call.run_id == run_id)
            .cloned()
            .collect();
        calls.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        calls.truncate(limit.max(0) as usize);
        Ok(calls)
    }
}

#[derive(Default)]
pub struct InMemoryApprovalRepository {
    state: RwLock<Table<ApprovalRecord>>,
}

impl InMemoryApprovalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryApprovalRepository {
    async fn create(&self, new: NewApproval) -> Result<ApprovalRecord, RepositoryError> {
        let mut state = write_lock(&self.state)?;
        let id = state.insert(|id| ApprovalRecord {
            id,
            action: new.action.clone(),
            proposal: new.proposal.clone(),
            requester: new.requester.clone(),
            status: ApprovalStatus::Pending,
            decided_by: None,
            decision_notes: None,
            outcome: None,
            run_id: new.run_id.clone(),
            tool_call_id: new.tool_call_id,
            created_at: Utc::now(),
            decided_at: None,
        });
        Ok(state.rows[&id].clone())
    }

    async fn update(&self, approval: &ApprovalRecord) -> Result<(), RepositoryError> {
        let mut state = write_lock(&self.state)?;
        let slot = state
            .rows
            .get_mut(&approval.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("approval {}", approval.id)))?;
        *slot = approval.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ApprovalRecord>, RepositoryError> {
        Ok(read_lock(&self.state)?.rows.get(&id).cloned())
    }

    async fn list(
        &self,
        status: Option<ApprovalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let state = read_lock(&self.state)?;
        let mut approvals: Vec<ApprovalRecord> = state
            .rows
            .values()
            .filter(|approval| status.map_or(true, |s| approval.status == s))
            .cloned()
            .collect();
        approvals.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        Ok(approvals
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryCanonicalRepository {
    versions: RwLock<Table<CanonicalVersion>>,
    snapshots: RwLock<Table<TaxonomySnapshot>>,
    changes: RwLock<Table<TaxonomyChange>>,
}

impl InMemoryCanonicalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(version: &CanonicalVersion, family: VersionFamily, filter: &VersionFilter) -> bool {
        version.family == family
            && filter.status.map_or(true, |s| version.status == s)
            && filter
                .scope_key
                .as_ref()
                .map_or(true, |key| version.scope_key.as_deref() == Some(key.as_str()))
    }
}

#[async_trait]
impl CanonicalVersionRepository for InMemoryCanonicalRepository {
    async fn create(&self, new: NewVersion) -> Result<CanonicalVersion, RepositoryError> {
        let mut versions = write_lock(&self.versions)?;
        let id = versions.insert(|id| CanonicalVersion {
            id,
            family: new.family,
            parent_version_id: new.parent_version_id,
            scope_key: new.scope_key.clone(),
            status: new.status,
            payload: new.payload.clone(),
            selection_rules: new.selection_rules.clone(),
            taxonomy_snapshot_id: new.taxonomy_snapshot_id,
            created_by: new.created_by.clone(),
            source_run_id: new.source_run_id.clone(),
            commit_classification: new.commit_classification.clone(),
            created_at: Utc::now(),
            approved_at: new.approved_at,
        });
        Ok(versions.rows[&id].clone())
    }

    async fn update(&self, version: &CanonicalVersion) -> Result<(), RepositoryError> {
        let mut versions = write_lock(&self.versions)?;
        let slot = versions
            .rows
            .get_mut(&version.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("version {}", version.id)))?;
        *slot = version.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CanonicalVersion>, RepositoryError> {
        Ok(read_lock(&self.versions)?.rows.get(&id).cloned())
    }

    async fn latest(
        &self,
        family: VersionFamily,
        filter: &VersionFilter,
    ) -> Result<Option<CanonicalVersion>, RepositoryError> {
        let versions = read_lock(&self.versions)?;
        Ok(versions
            .rows
            .values()
            .filter(|version| Self::matches(version, family, filter))
            .max_by_key(|version| (version.created_at, version.id))
            .cloned())
    }

    async fn history(
        &self,
        family: VersionFamily,
        filter: &VersionFilter,
        limit: i64,
    ) -> Result<Vec<CanonicalVersion>, RepositoryError> {
        let versions = read_lock(&self.versions)?;
        let mut matching: Vec<CanonicalVersion> = versions
            .rows
            .values()
            .filter(|version| Self::matches(version, family, filter))
            .cloned()
            .collect();
        matching.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    async fn trim(
        &self,
        family: VersionFamily,
        keep: usize,
    ) -> Result<Vec<i64>, RepositoryError> {
        let mut versions = write_lock(&self.versions)?;
        let mut family_ids: Vec<(DateTime<Utc>, i64)> = versions
            .rows
            .values()
            .filter(|version| version.family == family)
            .map(|version| (version.created_at, version.id))
            .collect();
        family_ids.sort_by(|a, b| newest_first(*a, *b));
        let purged: HashSet<i64> = family_ids
            .into_iter()
            .skip(keep)
            .map(|(_, id)| id)
            .collect();
        for id in &purged {
            versions.rows.remove(id);
        }
        // Purged rows release their descendants' lineage pointers.
        for version in versions.rows.values_mut() {
            if let Some(parent) = version.parent_version_id {
                if purged.contains(&parent) {
                    version.parent_version_id = None;
                }
            }
        }
        Ok(purged.into_iter().collect())
    }
}

#[async_trait]
impl TaxonomySnapshotRepository for InMemoryCanonicalRepository {
    async fn create(&self, new: NewSnapshot) -> Result<TaxonomySnapshot, RepositoryError> {
        let mut snapshots = write_lock(&self.snapshots)?;
        let id = snapshots.insert(|id| TaxonomySnapshot {
            id,
            snapshot_data: new.snapshot_data.clone(),
            record_metadata: new.record_metadata.clone(),
            created_by: new.created_by.clone(),
            source_run_id: new.source_run_id.clone(),
            created_at: Utc::now(),
        });
        Ok(snapshots.rows[&id].clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TaxonomySnapshot>, RepositoryError> {
        Ok(read_lock(&self.snapshots)?.rows.get(&id).cloned())
    }
}

#[async_trait]
impl TaxonomyChangeRepository for InMemoryCanonicalRepository {
    async fn append(&self, new: NewTaxonomyChange) -> Result<TaxonomyChange, RepositoryError> {
        let mut changes = write_lock(&self.changes)?;
        let id = changes.insert(|id| TaxonomyChange {
            id,
            taxonomy_id: new.taxonomy_id,
            status: new.status,
            change_type: new.change_type,
            taxonomy_data: new.taxonomy_data.clone(),
            created_by: new.created_by.clone(),
            source_run_id: new.source_run_id.clone(),
            created_at: Utc::now(),
        });
        Ok(changes.rows[&id].clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<TaxonomyChange>, RepositoryError> {
        Ok(read_lock(&self.changes)?.rows.get(&id).cloned())
    }

    async fn list(&self, limit: i64) -> Result<Vec<TaxonomyChange>, RepositoryError> {
        let changes = read_lock(&self.changes)?;
        let mut entries: Vec<TaxonomyChange> = changes.rows.values().cloned().collect();
        entries.sort_by(|a, b| newest_first((a.created_at, a.id), (b.created_at, b.id)));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}

#[derive(Default)]
pub struct InMemorySiteOpsRepository {
    test_runs: RwLock<Table<SiteTestRun>>,
    deployments: RwLock<Table<SiteDeployment>>,
}

impl InMemorySiteOpsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SiteOpsRepository for InMemorySiteOpsRepository {
    async fn create_test_run(&self, new: NewSiteTestRun) -> Result<SiteTestRun, RepositoryError> {
        let mut test_runs = write_lock(&self.test_runs)?;
        let id = test_runs.insert(|id| SiteTestRun {
            id,
            version: new.version.clone(),
            environment: new.environment.clone(),
            status: new.status.clone(),
            summary: new.summary.clone(),
            results: new.results.clone(),
            created_at: Utc::now(),
            completed_at: new.completed_at,
        });
        Ok(test_runs.rows[&id].clone())
    }

    async fn latest_test_run(
        &self,
        version: &str,
        environment: &str,
    ) -> Result<Option<SiteTestRun>, RepositoryError> {
        let test_runs = read_lock(&self.test_runs)?;
        Ok(test_runs
            .rows
            .values()
            .filter(|run| run.version == version && run.environment == environment)
            .max_by_key(|run| (run.created_at, run.id))
            .cloned())
    }

    async fn create_deployment(
        &self,
        new: NewSiteDeployment,
    ) -> Result<SiteDeployment, RepositoryError> {
        let mut deployments = write_lock(&self.deployments)?;
        let id = deployments.insert(|id| SiteDeployment {
            id,
            environment: new.environment.clone(),
            version: new.version.clone(),
            status: new.status.clone(),
            rollback_version: new.rollback_version.clone(),
            record_metadata: new.record_metadata.clone(),
            created_at: Utc::now(),
            deployed_at: new.deployed_at,
        });
        Ok(deployments.rows[&id].clone())
    }

    async fn latest_deployment(
        &self,
        environment: &str,
    ) -> Result<Option<SiteDeployment>, RepositoryError> {
        let deployments = read_lock(&self.deployments)?;
        Ok(deployments
            .rows
            .values()
            .filter(|deployment| deployment.environment == environment)
            .max_by_key(|deployment| (deployment.created_at, deployment.id))
            .cloned())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::canonical::VersionStatus;

    fn draft(family: VersionFamily, parent: Option<i64>) -> NewVersion {
        NewVersion {
            family,
            parent_version_id: parent,
            scope_key: None,
            status: VersionStatus::Draft,
            payload: None,
            selection_rules: None,
            taxonomy_snapshot_id: None,
            created_by: "user".to_string(),
            source_run_id: None,
            commit_classification: "approval_required".to_string(),
            approved_at: None,
        }
    }

    #[tokio::test]
    async fn trim_keeps_newest_and_releases_lineage() {
        let repo = InMemoryCanonicalRepository::new();
        let mut parent = None;
        for _ in 0..5 {
            let version =
                CanonicalVersionRepository::create(&repo, draft(VersionFamily::BusinessProfile, parent))
                    .await
                    .unwrap();
            parent = Some(version.id);
        }
        let purged = CanonicalVersionRepository::trim(&repo, VersionFamily::BusinessProfile, 3)
            .await
            .unwrap();
        assert_eq!(purged.len(), 2);

        let history = repo
            .history(
                VersionFamily::BusinessProfile,
                &VersionFilter::default(),
                10,
            )
            .await
            .unwrap();
        assert_eq!(history.len(), 3);
        // Ids 1 and 2 are purged; version 3's parent pointer is released.
        let oldest = history.last().unwrap();
        assert_eq!(oldest.id, 3);
        assert_eq!(oldest.parent_version_id, None);
        assert_eq!(history[0].parent_version_id, Some(4));
    }

    #[tokio::test]
    async fn latest_respects_scope_and_status() {
        let repo = InMemoryCanonicalRepository::new();
        let mut page = draft(VersionFamily::PageConfig, None);
        page.scope_key = Some("home".to_string());
        CanonicalVersionRepository::create(&repo, page.clone())
            .await
            .unwrap();
        page.scope_key = Some("about".to_string());
        let about = CanonicalVersionRepository::create(&repo, page).await.unwrap();

        let filter = VersionFilter {
            status: None,
            scope_key: Some("about".to_string()),
        };
        let latest = repo
            .latest(VersionFamily::PageConfig, &filter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, about.id);

        let approved = repo
            .latest(
                VersionFamily::PageConfig,
                &VersionFilter::status(VersionStatus::Approved),
            )
            .await
            .unwrap();
        assert!(approved.is_none());
    }

    #[tokio::test]
    async fn poisoned_lock_is_reported_not_propagated() {
        let repo = std::sync::Arc::new(InMemoryToolCallRepository::new());
        let poisoner = repo.clone();
        std::thread::spawn(move || {
            let _guard = poisoner.state.write().unwrap();
            panic!("poison the lock");
        })
        .join()
        .unwrap_err();

        let err = repo.find_by_id(1).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Database(_)));
    }

    #[tokio::test]
    async fn tool_calls_list_newest_first() {
        let repo = InMemoryToolCallRepository::new();
        for index in 0..3 {
            repo.create(NewToolCall {
                run_id: "r1".to_string(),
                step_id: None,
                tool_name: format!("tool.{index}"),
                status: crate::domain::tool_call::ToolCallStatus::Running,
                correlation_id: None,
                input: None,
            })
            .await
            .unwrap();
        }
        let calls = repo.find_by_run("r1", 2).await.unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_name, "tool.2");
        assert!(repo.find_by_run("r2", 10).await.unwrap().is_empty());
    }
}
