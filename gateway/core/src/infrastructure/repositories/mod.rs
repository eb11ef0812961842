// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Repository implementations: in-memory for tests and local development,
//! PostgreSQL for production.

pub mod memory;
pub mod postgres_approval;
pub mod postgres_canonical;
pub mod postgres_run;
pub mod postgres_site_ops;
pub mod postgres_tool_call;

pub use memory::{
    InMemoryApprovalRepository, InMemoryCanonicalRepository, InMemoryRunRepository,
    InMemorySiteOpsRepository, InMemoryToolCallRepository,
};
pub use postgres_approval::PostgresApprovalRepository;
pub use postgres_canonical::PostgresCanonicalRepository;
pub use postgres_run::PostgresRunRepository;
pub use postgres_site_ops::PostgresSiteOpsRepository;
pub use postgres_tool_call::PostgresToolCallRepository;
