// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: services orchestrating domain entities through the
//! repository traits. The wiring bundle (`GatewayStores`) is assembled once
//! at startup and shared by every service and tool handler.

pub mod approvals;
pub mod builtins;
pub mod canonical_tools;
pub mod gateway;
pub mod policy;
pub mod registry;
pub mod snapshot;
pub mod version_store;

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::repository::{
    AgentRunRepository, ApprovalRepository, CanonicalVersionRepository, SiteOpsRepository,
    TaxonomyChangeRepository, TaxonomySnapshotRepository, ToolCallRepository,
};
use crate::domain::search::SearchIndex;

/// Shared storage handle carried by the gateway and by tool execution
/// contexts. Everything is behind `Arc<dyn …>` so handlers can run against
/// in-memory repositories in tests and PostgreSQL in production.
pub struct GatewayStores {
    pub runs: Arc<dyn AgentRunRepository>,
    pub tool_calls: Arc<dyn ToolCallRepository>,
    pub approvals: Arc<dyn ApprovalRepository>,
    pub versions: Arc<dyn CanonicalVersionRepository>,
    pub snapshots: Arc<dyn TaxonomySnapshotRepository>,
    pub taxonomy_changes: Arc<dyn TaxonomyChangeRepository>,
    pub site_ops: Arc<dyn SiteOpsRepository>,
    pub search: Arc<dyn SearchIndex>,
    pub config: GatewayConfig,
}
