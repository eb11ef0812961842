// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: repository implementations and the search index,
//! plus the wiring helpers that assemble a `GatewayStores` bundle.

pub mod repositories;
pub mod search;

use std::sync::Arc;

use sqlx::postgres::PgPool;

use crate::application::GatewayStores;
use crate::config::GatewayConfig;
use crate::infrastructure::repositories::{
    InMemoryApprovalRepository, InMemoryCanonicalRepository, InMemoryRunRepository,
    InMemorySiteOpsRepository, InMemoryToolCallRepository, PostgresApprovalRepository,
    PostgresCanonicalRepository, PostgresRunRepository, PostgresSiteOpsRepository,
    PostgresToolCallRepository,
};
use crate::infrastructure::search::InMemorySearchIndex;

/// Assemble stores backed entirely by memory. Used by tests and local
/// development runs without a database.
pub fn in_memory_stores(config: GatewayConfig) -> Arc<GatewayStores> {
    let canonical = Arc::new(InMemoryCanonicalRepository::new());
    Arc::new(GatewayStores {
        runs: Arc::new(InMemoryRunRepository::new()),
        tool_calls: Arc::new(InMemoryToolCallRepository::new()),
        approvals: Arc::new(InMemoryApprovalRepository::new()),
        versions: canonical.clone(),
        snapshots: canonical.clone(),
        taxonomy_changes: canonical,
        site_ops: Arc::new(InMemorySiteOpsRepository::new()),
        search: Arc::new(InMemorySearchIndex::new()),
        config,
    })
}

/// Assemble stores backed by PostgreSQL. The search index stays in memory;
/// deployments with a vector backend swap in their own `SearchIndex`.
pub fn postgres_stores(pool: PgPool, config: GatewayConfig) -> Arc<GatewayStores> {
    let canonical = Arc::new(PostgresCanonicalRepository::new(pool.clone()));
    Arc::new(GatewayStores {
        runs: Arc::new(PostgresRunRepository::new(pool.clone())),
        tool_calls: Arc::new(PostgresToolCallRepository::new(pool.clone())),
        approvals: Arc::new(PostgresApprovalRepository::new(pool.clone())),
        versions: canonical.clone(),
        snapshots: canonical.clone(),
        taxonomy_changes: canonical,
        site_ops: Arc::new(PostgresSiteOpsRepository::new(pool)),
        search: Arc::new(InMemorySearchIndex::new()),
        config,
    })
}
