// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! In-memory search index. Scoring is naive token overlap, which is enough
//! for the console's "find the version that mentions X" lookups in tests and
//! local development; production wires a real vector store behind the same
//! trait.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::search::{SearchHit, SearchIndex};

#[derive(Clone)]
struct IndexedDocument {
    content: String,
    record_metadata: Option<Value>,
}

#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<HashMap<(String, String), IndexedDocument>>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert(
        &self,
        source_type: &str,
        source_id: &str,
        content: &str,
        record_metadata: Option<Value>,
    ) -> anyhow::Result<()> {
        self.documents
            .write()
            .map_err(|_| anyhow::anyhow!("lock poisoned"))?
            .insert(
                (source_type.to_string(), source_id.to_string()),
                IndexedDocument {
                    content: content.to_string(),
                    record_metadata,
                },
            );
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        top_k: usize,
        source_types: Option<&[String]>,
    ) -> anyhow::Result<Vec<SearchHit>> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let documents = self
            .documents
            .read()
            .map_err(|_| anyhow::anyhow!("lock poisoned"))?;
        let mut hits: Vec<SearchHit> = documents
            .iter()
            .filter(|((source_type, _), _)| {
                source_types.map_or(true, |types| types.iter().any(|t| t == source_type))
            })
            .filter_map(|((source_type, source_id), doc)| {
                let doc_tokens = tokenize(&doc.content);
                let overlap = query_tokens.intersection(&doc_tokens).count();
                if overlap == 0 {
                    return None;
                }
                Some(SearchHit {
                    source_type: source_type.clone(),
                    source_id: source_id.clone(),
                    content: doc.content.clone(),
                    record_metadata: doc.record_metadata.clone(),
                    score: overlap as f32 / query_tokens.len() as f32,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Search index that stores nothing and finds nothing. Useful when the
/// deployment has no search backend configured.
#[derive(Default)]
pub struct NullSearchIndex;

#[async_trait]
impl SearchIndex for NullSearchIndex {
    async fn upsert(
        &self,
        _source_type: &str,
        _source_id: &str,
        _content: &str,
        _record_metadata: Option<Value>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _query: &str,
        _top_k: usize,
        _source_types: Option<&[String]>,
    ) -> anyhow::Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}
