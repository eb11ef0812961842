// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Search index contract. Embedding computation and vector storage are owned
//! by the external memory subsystem; the gateway only upserts content
//! (best-effort) after canonical writes and reads ranked matches.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub source_type: String,
    pub source_id: String,
    pub content: String,
    pub record_metadata: Option<Value>,
    pub score: f32,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Upsert an index entry keyed by `(source_type, source_id)`.
    ///
    /// Raises on misconfiguration; callers in the canonical write path treat
    /// any failure as best-effort and must not fail the primary write.
    async fn upsert(
        &self,
        source_type: &str,
        source_id: &str,
        content: &str,
        record_metadata: Option<Value>,
    ) -> anyhow::Result<()>;

    /// Ranked semantic search over indexed content.
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        source_types: Option<&[String]>,
    ) -> anyhow::Result<Vec<SearchHit>>;
}
