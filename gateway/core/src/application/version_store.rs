// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Canonical Version Store
//!
//! Writes to the four versioned entity families go through this service,
//! which enforces the canonical-state invariants:
//!
//! - **Draft coalescing** — successive draft writes mutate the latest open
//!   draft in place instead of forking a new row; an approved write also
//!   promotes that draft rather than always allocating a new id. `force_new`
//!   opts out.
//! - **Lineage** — a new row's `parent_version_id` defaults to the family's
//!   latest version unless explicitly overridden.
//! - **Snapshot pinning** — a site-structure or page-config write carrying
//!   selection rules but no snapshot id gets the current taxonomy captured
//!   for it.
//! - **Change log** — every taxonomy mutation appends exactly one
//!   `TaxonomyChange` entry before the write is considered complete.
//! - **Retention** — after every write the family is trimmed to the newest
//!   `retained_versions` rows, synchronously. Purged rows release their
//!   descendants' parent pointers (set null, never cascade).
//!
//! Search indexing is best-effort: failures are logged and swallowed, never
//! propagated into the version write.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use crate::application::snapshot::TaxonomySnapshotService;
use crate::application::GatewayStores;
use crate::domain::canonical::{
    CanonicalVersion, NewTaxonomyChange, NewVersion, TaxonomyChange, TaxonomyChangeType,
    VersionFamily, VersionStatus, APPROVAL_REQUIRED,
};
use crate::domain::repository::{RepositoryError, VersionFilter};

#[derive(Debug, Error)]
pub enum VersionStoreError {
    #[error("Taxonomy change not found: {0}")]
    ChangeNotFound(i64),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

/// One canonical write. Defaults: draft status, `user` author,
/// `approval_required` classification, coalescing enabled.
#[derive(Debug, Clone, Default)]
pub struct VersionWrite {
    pub parent_version_id: Option<i64>,
    pub scope_key: Option<String>,
    pub status: Option<VersionStatus>,
    pub payload: Option<Value>,
    pub selection_rules: Option<Value>,
    pub taxonomy_snapshot_id: Option<i64>,
    pub force_new: bool,
    pub created_by: Option<String>,
    pub source_run_id: Option<String>,
    pub commit_classification: Option<String>,
}

pub struct CanonicalVersionStore {
    stores: Arc<GatewayStores>,
}

impl CanonicalVersionStore {
    pub fn new(stores: Arc<GatewayStores>) -> Self {
        Self { stores }
    }

    pub async fn create_version(
        &self,
        family: VersionFamily,
        write: VersionWrite,
    ) -> Result<CanonicalVersion, VersionStoreError> {
        self.create_internal(family, write, None).await
    }

    /// Re-apply a logged taxonomy payload as a fresh write, recorded in the
    /// change log as `restored`.
    pub async fn restore_taxonomy(
        &self,
        change_id: i64,
        mut write: VersionWrite,
    ) -> Result<CanonicalVersion, VersionStoreError> {
        let change = self
            .stores
            .taxonomy_changes
            .find_by_id(change_id)
            .await?
            .ok_or(VersionStoreError::ChangeNotFound(change_id))?;
        write.payload = change.taxonomy_data.clone();
        self.create_internal(
            VersionFamily::TopicTaxonomy,
            write,
            Some(TaxonomyChangeType::Restored),
        )
        .await
    }

    pub async fn latest(
        &self,
        family: VersionFamily,
        filter: &VersionFilter,
    ) -> Result<Option<CanonicalVersion>, VersionStoreError> {
        Ok(self.stores.versions.latest(family, filter).await?)
    }

    pub async fn history(
        &self,
        family: VersionFamily,
        filter: &VersionFilter,
        limit: i64,
    ) -> Result<Vec<CanonicalVersion>, VersionStoreError> {
        Ok(self.stores.versions.history(family, filter, limit).await?)
    }

    pub async fn taxonomy_changes(
        &self,
        limit: i64,
    ) -> Result<Vec<TaxonomyChange>, VersionStoreError> {
        Ok(self.stores.taxonomy_changes.list(limit).await?)
    }

    async fn create_internal(
        &self,
        family: VersionFamily,
        write: VersionWrite,
        change_override: Option<TaxonomyChangeType>,
    ) -> Result<CanonicalVersion, VersionStoreError> {
        let status = write.status.unwrap_or(VersionStatus::Draft);
        let created_by = write.created_by.clone().unwrap_or_else(|| "user".to_string());
        let classification = write
            .commit_classification
            .clone()
            .unwrap_or_else(|| APPROVAL_REQUIRED.to_string());

        // Draft and approved writes both coalesce into the latest open draft
        // unless the caller forces a new lineage node.
        let mut open_draft = None;
        if !write.force_new {
            let draft_filter = VersionFilter {
                status: Some(VersionStatus::Draft),
                scope_key: write.scope_key.clone(),
            };
            open_draft = self.stores.versions.latest(family, &draft_filter).await?;
        }

        let mut snapshot_id = write.taxonomy_snapshot_id;
        if family.supports_snapshots() && write.selection_rules.is_some() && snapshot_id.is_none() {
            snapshot_id = self
                .snapshot_service()
                .capture(&created_by, write.source_run_id.as_deref())
                .await?
                .map(|snapshot| snapshot.id);
        }

        let coalesced = open_draft.is_some();
        let version = match open_draft {
            Some(mut existing) => {
                existing.payload = write.payload.clone();
                if write.selection_rules.is_some() {
                    existing.selection_rules = write.selection_rules.clone();
                }
                if snapshot_id.is_some() {
                    existing.taxonomy_snapshot_id = snapshot_id;
                }
                existing.status = status;
                existing.commit_classification = classification;
                if status == VersionStatus::Approved {
                    existing.approved_at = Some(Utc::now());
                }
                self.stores.versions.update(&existing).await?;
                existing
            }
            None => {
                let parent_version_id = match write.parent_version_id {
                    Some(id) => Some(id),
                    None => {
                        let any_filter = VersionFilter {
                            status: None,
                            scope_key: write.scope_key.clone(),
                        };
                        self.stores
                            .versions
                            .latest(family, &any_filter)
                            .await?
                            .map(|version| version.id)
                    }
                };
                let approved_at =
                    (status == VersionStatus::Approved).then(Utc::now);
                self.stores
                    .versions
                    .create(NewVersion {
                        family,
                        parent_version_id,
                        scope_key: write.scope_key.clone(),
                        status,
                        payload: write.payload.clone(),
                        selection_rules: write.selection_rules.clone(),
                        taxonomy_snapshot_id: snapshot_id,
                        created_by: created_by.clone(),
                        source_run_id: write.source_run_id.clone(),
                        commit_classification: classification,
                        approved_at,
                    })
                    .await?
            }
        };

        // The change log entry lands before the write is considered complete;
        // it is the only taxonomy history that survives retention trimming.
        if family == VersionFamily::TopicTaxonomy {
            let change_type = change_override.unwrap_or(match (coalesced, status) {
                (_, VersionStatus::Approved) => TaxonomyChangeType::Approved,
                (true, VersionStatus::Draft) => TaxonomyChangeType::Updated,
                (false, VersionStatus::Draft) => TaxonomyChangeType::Created,
            });
            self.stores
                .taxonomy_changes
                .append(NewTaxonomyChange {
                    taxonomy_id: Some(version.id),
                    status,
                    change_type,
                    taxonomy_data: version.payload.clone(),
                    created_by: created_by.clone(),
                    source_run_id: write.source_run_id.clone(),
                })
                .await?;
        }

        self.index_version(family, &version).await;

        let purged = self
            .stores
            .versions
            .trim(family, self.stores.config.retained_versions)
            .await?;
        if !purged.is_empty() {
            tracing::debug!(
                family = family.as_str(),
                purged = purged.len(),
                "trimmed canonical versions past retention cap"
            );
        }

        Ok(version)
    }

    /// Best-effort search index upsert; never fails the version write.
    async fn index_version(&self, family: VersionFamily, version: &CanonicalVersion) {
        let content = version
            .payload
            .as_ref()
            .map(|payload| payload.to_string())
            .unwrap_or_default();
        let metadata = serde_json::json!({
            "status": version.status.as_str(),
        });
        if let Err(err) = self
            .stores
            .search
            .upsert(
                family.as_str(),
                &version.id.to_string(),
                &content,
                Some(metadata),
            )
            .await
        {
            tracing::warn!(
                error = %err,
                family = family.as_str(),
                version_id = version.id,
                "failed to index canonical version"
            );
        }
    }

    fn snapshot_service(&self) -> TaxonomySnapshotService {
        TaxonomySnapshotService::new(self.stores.clone())
    }
}
