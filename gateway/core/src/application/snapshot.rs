// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Taxonomy Snapshot Service
//!
//! Captures an immutable point-in-time copy of the current taxonomy for
//! embedding into a site-structure or page-config version. A version stores
//! the snapshot id rather than a live reference, so its selection rules are
//! always evaluated against the taxonomy that existed when it was created.

use std::sync::Arc;

use crate::application::GatewayStores;
use crate::domain::canonical::{NewSnapshot, TaxonomySnapshot, VersionFamily};
use crate::domain::repository::{RepositoryError, VersionFilter};
use crate::domain::canonical::VersionStatus;

pub struct TaxonomySnapshotService {
    stores: Arc<GatewayStores>,
}

impl TaxonomySnapshotService {
    pub fn new(stores: Arc<GatewayStores>) -> Self {
        Self { stores }
    }

    /// Snapshot the current taxonomy: the latest approved version, falling
    /// back to the latest of any status. Returns `None` when no taxonomy
    /// exists yet or it has no payload.
    pub async fn capture(
        &self,
        created_by: &str,
        source_run_id: Option<&str>,
    ) -> Result<Option<TaxonomySnapshot>, RepositoryError> {
        let Some(taxonomy) = self.resolve_current_taxonomy().await? else {
            return Ok(None);
        };
        let Some(payload) = taxonomy.payload.clone() else {
            return Ok(None);
        };
        let snapshot = self
            .stores
            .snapshots
            .create(NewSnapshot {
                snapshot_data: Some(payload),
                record_metadata: Some(serde_json::json!({
                    "topic_taxonomy_id": taxonomy.id,
                    "topic_taxonomy_status": taxonomy.status.as_str(),
                })),
                created_by: created_by.to_string(),
                source_run_id: source_run_id.map(str::to_string),
            })
            .await?;
        Ok(Some(snapshot))
    }

    async fn resolve_current_taxonomy(
        &self,
    ) -> Result<Option<crate::domain::canonical::CanonicalVersion>, RepositoryError> {
        let approved = self
            .stores
            .versions
            .latest(
                VersionFamily::TopicTaxonomy,
                &VersionFilter::status(VersionStatus::Approved),
            )
            .await?;
        if approved.is_some() {
            return Ok(approved);
        }
        self.stores
            .versions
            .latest(VersionFamily::TopicTaxonomy, &VersionFilter::default())
            .await
    }
}
