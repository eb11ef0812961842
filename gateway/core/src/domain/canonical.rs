// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Canonical State — Versioned Entities
//!
//! Four entity families share one versioning scheme: business profile, site
//! structure, page configuration, and topic taxonomy. Each version carries a
//! `parent_version_id` pointer forming a lineage chain, a `draft|approved`
//! status, and a `commit_classification` that the policy engine inspects to
//! decide whether a mutation may auto-commit.
//!
//! ## Lineage rules
//!
//! - Every version except the first in a lineage points at the version it
//!   was derived from; the parent defaults to the family's latest version.
//! - Parent references use set-null-on-delete semantics: purging a version
//!   never cascades into its descendants, it only clears their pointers.
//!
//! ## Snapshots
//!
//! A site structure or page config version stores a `taxonomy_snapshot_id`
//! rather than a live taxonomy reference, so later taxonomy edits never
//! retroactively change how an already-approved version's selection rules
//! resolve.
//!
//! ## Change log
//!
//! `TaxonomyChange` is the append-only audit trail for the taxonomy family.
//! Retention trimming purges old `TopicTaxonomy` rows outright; the change
//! log is the only way to reconstruct taxonomy history afterwards.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sentinel `commit_classification` value meaning "safe to auto-commit".
pub const SAFE_AUTO_COMMIT: &str = "safe_auto_commit";

/// Default classification for canonical writes: require a human decision.
pub const APPROVAL_REQUIRED: &str = "approval_required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VersionFamily {
    BusinessProfile,
    SiteStructure,
    PageConfig,
    TopicTaxonomy,
}

impl VersionFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionFamily::BusinessProfile => "business_profile",
            VersionFamily::SiteStructure => "site_structure",
            VersionFamily::PageConfig => "page_config",
            VersionFamily::TopicTaxonomy => "topic_taxonomy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "business_profile" => Some(VersionFamily::BusinessProfile),
            "site_structure" => Some(VersionFamily::SiteStructure),
            "page_config" => Some(VersionFamily::PageConfig),
            "topic_taxonomy" => Some(VersionFamily::TopicTaxonomy),
            _ => None,
        }
    }

    /// Families whose selection rules are pinned to a taxonomy snapshot.
    pub fn supports_snapshots(&self) -> bool {
        matches!(
            self,
            VersionFamily::SiteStructure | VersionFamily::PageConfig
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Approved,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Approved => "approved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(VersionStatus::Draft),
            "approved" => Some(VersionStatus::Approved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalVersion {
    pub id: i64,
    pub family: VersionFamily,
    pub parent_version_id: Option<i64>,
    /// Family-specific scoping key; the page id for page config versions.
    pub scope_key: Option<String>,
    pub status: VersionStatus,
    pub payload: Option<Value>,
    pub selection_rules: Option<Value>,
    pub taxonomy_snapshot_id: Option<i64>,
    pub created_by: String,
    pub source_run_id: Option<String>,
    pub commit_classification: String,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewVersion {
    pub family: VersionFamily,
    pub parent_version_id: Option<i64>,
    pub scope_key: Option<String>,
    pub status: VersionStatus,
    pub payload: Option<Value>,
    pub selection_rules: Option<Value>,
    pub taxonomy_snapshot_id: Option<i64>,
    pub created_by: String,
    pub source_run_id: Option<String>,
    pub commit_classification: String,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Immutable point-in-time copy of the current taxonomy payload.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaxonomySnapshot {
    pub id: i64,
    pub snapshot_data: Option<Value>,
    pub record_metadata: Option<Value>,
    pub created_by: String,
    pub source_run_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub snapshot_data: Option<Value>,
    pub record_metadata: Option<Value>,
    pub created_by: String,
    pub source_run_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyChangeType {
    Created,
    Updated,
    Approved,
    Restored,
}

impl TaxonomyChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyChangeType::Created => "created",
            TaxonomyChangeType::Updated => "updated",
            TaxonomyChangeType::Approved => "approved",
            TaxonomyChangeType::Restored => "restored",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(TaxonomyChangeType::Created),
            "updated" => Some(TaxonomyChangeType::Updated),
            "approved" => Some(TaxonomyChangeType::Approved),
            "restored" => Some(TaxonomyChangeType::Restored),
            _ => None,
        }
    }
}

/// Append-only audit entry; written before a taxonomy mutation is complete.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaxonomyChange {
    pub id: i64,
    pub taxonomy_id: Option<i64>,
    pub status: VersionStatus,
    pub change_type: TaxonomyChangeType,
    pub taxonomy_data: Option<Value>,
    pub created_by: String,
    pub source_run_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTaxonomyChange {
    pub taxonomy_id: Option<i64>,
    pub status: VersionStatus,
    pub change_type: TaxonomyChangeType,
    pub taxonomy_data: Option<Value>,
    pub created_by: String,
    pub source_run_id: Option<String>,
}

/// Extract the `commit_classification` field from an untyped tool payload.
pub fn commit_classification(payload: Option<&Value>) -> Option<&str> {
    payload?.get("commit_classification")?.as_str()
}
