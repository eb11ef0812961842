// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Site operations records: automated check runs and deployments. A deploy
//! is only allowed once the latest check run for the same version and
//! environment has passed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteTestRun {
    pub id: i64,
    pub version: String,
    pub environment: String,
    pub status: String,
    pub summary: Option<String>,
    pub results: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewSiteTestRun {
    pub version: String,
    pub environment: String,
    pub status: String,
    pub summary: Option<String>,
    pub results: Option<Value>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDeployment {
    pub id: i64,
    pub environment: String,
    pub version: String,
    pub status: String,
    pub rollback_version: Option<String>,
    pub record_metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub deployed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewSiteDeployment {
    pub environment: String,
    pub version: String,
    pub status: String,
    pub rollback_version: Option<String>,
    pub record_metadata: Option<Value>,
    pub deployed_at: Option<DateTime<Utc>>,
}
