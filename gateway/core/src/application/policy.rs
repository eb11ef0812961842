// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Engine
//!
//! Pure decision function over `(tool spec, payload)`. It consults no
//! external state, so its output is deterministic and testable in isolation;
//! one instance per process needs no coordination.
//!
//! Rules, in order:
//! 1. `requires_approval` on the tool definition wins.
//! 2. Canonical-state mutations (name prefix `canonical.`, suffix in
//!    create/update/restore/delete/commit/approve) require approval unless
//!    the payload is classified `safe_auto_commit`.
//! 3. Everything else is allowed. Unknown tools never reach the engine; the
//!    gateway rejects them first.

use serde_json::Value;

use crate::application::registry::ToolSpec;
use crate::domain::canonical::{commit_classification, SAFE_AUTO_COMMIT};
use crate::domain::policy::PolicyDecision;

const CANONICAL_PREFIX: &str = "canonical.";
const CANONICAL_MUTATION_SUFFIXES: [&str; 6] = [
    ".create", ".update", ".restore", ".delete", ".commit", ".approve",
];

#[derive(Debug, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, tool: &ToolSpec, payload: Option<&Value>) -> PolicyDecision {
        if tool.requires_approval {
            return PolicyDecision::require_approval("Tool requires explicit approval.");
        }
        if is_canonical_mutation(&tool.name)
            && commit_classification(payload) != Some(SAFE_AUTO_COMMIT)
        {
            return PolicyDecision::require_approval(
                "Canonical changes require approval unless marked safe_auto_commit.",
            );
        }
        PolicyDecision::allow()
    }
}

fn is_canonical_mutation(name: &str) -> bool {
    name.starts_with(CANONICAL_PREFIX)
        && CANONICAL_MUTATION_SUFFIXES
            .iter()
            .any(|suffix| name.ends_with(suffix))
}
