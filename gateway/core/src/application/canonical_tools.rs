// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Canonical Tools
//!
//! The tool surface over the canonical version store, one group per entity
//! family. Mutation tools carry the `canonical.` prefix and a mutation verb,
//! which is what the policy engine keys on; none of them set
//! `requires_approval` on their `ToolSpec`. The gating comes entirely from
//! the naming convention plus the payload's `commit_classification`.
//!
//! `*.create` writes a draft by default (callers may pass an explicit
//! status); `*.approve` forces an approved write, which promotes the open
//! draft in place when one exists.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::application::registry::{
    ExecutionContext, RegistryError, ToolHandler, ToolRegistry, ToolSpec,
};
use crate::application::version_store::{CanonicalVersionStore, VersionWrite};
use crate::domain::canonical::{CanonicalVersion, TaxonomyChange, VersionFamily, VersionStatus};
use crate::domain::repository::VersionFilter;

const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// Fields shared by every canonical write.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct WriteCommon {
    #[serde(default)]
    pub parent_version_id: Option<i64>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub source_run_id: Option<String>,
    #[serde(default)]
    pub commit_classification: Option<String>,
    #[serde(default)]
    pub status: Option<VersionStatus>,
    #[serde(default)]
    pub force_new: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BusinessProfileWrite {
    #[serde(default)]
    pub profile_data: Option<Value>,
    #[serde(flatten)]
    pub common: WriteCommon,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SiteStructureWrite {
    #[serde(default)]
    pub structure_data: Option<Value>,
    #[serde(default)]
    pub selection_rules: Option<Value>,
    #[serde(default)]
    pub taxonomy_snapshot_id: Option<i64>,
    #[serde(flatten)]
    pub common: WriteCommon,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct PageConfigWrite {
    /// Page this configuration belongs to.
    pub page_id: String,
    #[serde(default)]
    pub page_data: Option<Value>,
    #[serde(default)]
    pub selection_rules: Option<Value>,
    #[serde(default)]
    pub taxonomy_snapshot_id: Option<i64>,
    #[serde(flatten)]
    pub common: WriteCommon,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TaxonomyWrite {
    #[serde(default)]
    pub taxonomy_data: Option<Value>,
    #[serde(flatten)]
    pub common: WriteCommon,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TaxonomyRestoreInput {
    /// Change-log entry whose payload to re-apply.
    pub change_id: i64,
    #[serde(flatten)]
    pub common: WriteCommon,
}

/// Query parameters for `*.latest` and `*.history`. `page_id` scopes page
/// config lookups and is ignored by the other families.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct VersionQuery {
    #[serde(default)]
    pub status: Option<VersionStatus>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LatestVersionOutput {
    pub version: Option<CanonicalVersion>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionHistoryOutput {
    pub items: Vec<CanonicalVersion>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ChangesQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TaxonomyChangesOutput {
    pub items: Vec<TaxonomyChange>,
}

fn base_write(common: WriteCommon, promote: bool) -> VersionWrite {
    VersionWrite {
        parent_version_id: common.parent_version_id,
        status: if promote {
            Some(VersionStatus::Approved)
        } else {
            common.status
        },
        force_new: common.force_new,
        created_by: common.created_by,
        source_run_id: common.source_run_id,
        commit_classification: common.commit_classification,
        ..VersionWrite::default()
    }
}

fn version_store(ctx: &ExecutionContext) -> CanonicalVersionStore {
    CanonicalVersionStore::new(ctx.stores.clone())
}

struct BusinessProfileWriteHandler {
    promote: bool,
}

#[async_trait]
impl ToolHandler for BusinessProfileWriteHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let input: BusinessProfileWrite = serde_json::from_value(input)?;
        let mut write = base_write(input.common, self.promote);
        write.payload = input.profile_data;
        let version = version_store(&ctx)
            .create_version(VersionFamily::BusinessProfile, write)
            .await?;
        Ok(serde_json::to_value(version)?)
    }
}

struct SiteStructureWriteHandler {
    promote: bool,
}

#[async_trait]
impl ToolHandler for SiteStructureWriteHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let input: SiteStructureWrite = serde_json::from_value(input)?;
        let mut write = base_write(input.common, self.promote);
        write.payload = input.structure_data;
        write.selection_rules = input.selection_rules;
        write.taxonomy_snapshot_id = input.taxonomy_snapshot_id;
        let version = version_store(&ctx)
            .create_version(VersionFamily::SiteStructure, write)
            .await?;
        Ok(serde_json::to_value(version)?)
    }
}

struct PageConfigWriteHandler;

#[async_trait]
impl ToolHandler for PageConfigWriteHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let input: PageConfigWrite = serde_json::from_value(input)?;
        let mut write = base_write(input.common, false);
        write.scope_key = Some(input.page_id);
        write.payload = input.page_data;
        write.selection_rules = input.selection_rules;
        write.taxonomy_snapshot_id = input.taxonomy_snapshot_id;
        let version = version_store(&ctx)
            .create_version(VersionFamily::PageConfig, write)
            .await?;
        Ok(serde_json::to_value(version)?)
    }
}

struct TaxonomyWriteHandler {
    promote: bool,
}

#[async_trait]
impl ToolHandler for TaxonomyWriteHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let input: TaxonomyWrite = serde_json::from_value(input)?;
        let mut write = base_write(input.common, self.promote);
        write.payload = input.taxonomy_data;
        let version = version_store(&ctx)
            .create_version(VersionFamily::TopicTaxonomy, write)
            .await?;
        Ok(serde_json::to_value(version)?)
    }
}

struct TaxonomyRestoreHandler;

#[async_trait]
impl ToolHandler for TaxonomyRestoreHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let input: TaxonomyRestoreInput = serde_json::from_value(input)?;
        let write = base_write(input.common, false);
        let version = version_store(&ctx)
            .restore_taxonomy(input.change_id, write)
            .await?;
        Ok(serde_json::to_value(version)?)
    }
}

struct LatestVersionHandler {
    family: VersionFamily,
}

#[async_trait]
impl ToolHandler for LatestVersionHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let query: VersionQuery = serde_json::from_value(input)?;
        let filter = VersionFilter {
            status: query.status,
            scope_key: query.page_id,
        };
        let version = version_store(&ctx).latest(self.family, &filter).await?;
        Ok(serde_json::to_value(LatestVersionOutput { version })?)
    }
}

struct VersionHistoryHandler {
    family: VersionFamily,
}

#[async_trait]
impl ToolHandler for VersionHistoryHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let query: VersionQuery = serde_json::from_value(input)?;
        let filter = VersionFilter {
            status: query.status,
            scope_key: query.page_id,
        };
        let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        let items = version_store(&ctx)
            .history(self.family, &filter, limit)
            .await?;
        Ok(serde_json::to_value(VersionHistoryOutput { items })?)
    }
}

struct TaxonomyChangesHandler;

#[async_trait]
impl ToolHandler for TaxonomyChangesHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let query: ChangesQuery = serde_json::from_value(input)?;
        let items = version_store(&ctx)
            .taxonomy_changes(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await?;
        Ok(serde_json::to_value(TaxonomyChangesOutput { items })?)
    }
}

/// Install the canonical tool groups into a registry.
pub fn register_canonical_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolSpec::new::<BusinessProfileWrite, CanonicalVersion>(
        "canonical.business_profile.create",
        Some("Write a business profile version.".to_string()),
        false,
        Arc::new(BusinessProfileWriteHandler { promote: false }),
    )?)?;
    registry.register(ToolSpec::new::<BusinessProfileWrite, CanonicalVersion>(
        "canonical.business_profile.approve",
        Some("Write an approved business profile version.".to_string()),
        false,
        Arc::new(BusinessProfileWriteHandler { promote: true }),
    )?)?;
    registry.register(ToolSpec::new::<VersionQuery, LatestVersionOutput>(
        "canonical.business_profile.latest",
        Some("Fetch the latest business profile version.".to_string()),
        false,
        Arc::new(LatestVersionHandler {
            family: VersionFamily::BusinessProfile,
        }),
    )?)?;
    registry.register(ToolSpec::new::<VersionQuery, VersionHistoryOutput>(
        "canonical.business_profile.history",
        Some("List retained business profile versions, newest first.".to_string()),
        false,
        Arc::new(VersionHistoryHandler {
            family: VersionFamily::BusinessProfile,
        }),
    )?)?;

    registry.register(ToolSpec::new::<SiteStructureWrite, CanonicalVersion>(
        "canonical.site_structure.create",
        Some("Write a site structure version.".to_string()),
        false,
        Arc::new(SiteStructureWriteHandler { promote: false }),
    )?)?;
    registry.register(ToolSpec::new::<SiteStructureWrite, CanonicalVersion>(
        "canonical.site_structure.approve",
        Some("Write an approved site structure version.".to_string()),
        false,
        Arc::new(SiteStructureWriteHandler { promote: true }),
    )?)?;
    registry.register(ToolSpec::new::<VersionQuery, LatestVersionOutput>(
        "canonical.site_structure.latest",
        Some("Fetch the latest site structure version.".to_string()),
        false,
        Arc::new(LatestVersionHandler {
            family: VersionFamily::SiteStructure,
        }),
    )?)?;
    registry.register(ToolSpec::new::<VersionQuery, VersionHistoryOutput>(
        "canonical.site_structure.history",
        Some("List retained site structure versions, newest first.".to_string()),
        false,
        Arc::new(VersionHistoryHandler {
            family: VersionFamily::SiteStructure,
        }),
    )?)?;

    registry.register(ToolSpec::new::<PageConfigWrite, CanonicalVersion>(
        "canonical.page_config.create",
        Some("Write a page configuration version.".to_string()),
        false,
        Arc::new(PageConfigWriteHandler),
    )?)?;
    registry.register(ToolSpec::new::<VersionQuery, LatestVersionOutput>(
        "canonical.page_config.latest",
        Some("Fetch the latest page configuration version.".to_string()),
        false,
        Arc::new(LatestVersionHandler {
            family: VersionFamily::PageConfig,
        }),
    )?)?;
    registry.register(ToolSpec::new::<VersionQuery, VersionHistoryOutput>(
        "canonical.page_config.history",
        Some("List retained page configuration versions, newest first.".to_string()),
        false,
        Arc::new(VersionHistoryHandler {
            family: VersionFamily::PageConfig,
        }),
    )?)?;

    registry.register(ToolSpec::new::<TaxonomyWrite, CanonicalVersion>(
        "canonical.taxonomy.create",
        Some("Write a topic taxonomy version.".to_string()),
        false,
        Arc::new(TaxonomyWriteHandler { promote: false }),
    )?)?;
    registry.register(ToolSpec::new::<TaxonomyWrite, CanonicalVersion>(
        "canonical.taxonomy.approve",
        Some("Write an approved topic taxonomy version.".to_string()),
        false,
        Arc::new(TaxonomyWriteHandler { promote: true }),
    )?)?;
    registry.register(ToolSpec::new::<TaxonomyRestoreInput, CanonicalVersion>(
        "canonical.taxonomy.restore",
        Some("Restore a taxonomy payload from the change log.".to_string()),
        false,
        Arc::new(TaxonomyRestoreHandler),
    )?)?;
    registry.register(ToolSpec::new::<ChangesQuery, TaxonomyChangesOutput>(
        "canonical.taxonomy.changes",
        Some("List taxonomy change log entries, newest first.".to_string()),
        false,
        Arc::new(TaxonomyChangesHandler),
    )?)?;

    Ok(())
}
