// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Atelier Gateway Core
//!
//! Tool execution gateway for the Atelier console backend: a capability
//! registry of schema-validated tools, a policy engine deciding
//! allow / deny / require-approval, an approval workflow for human
//! sign-off, and a versioned canonical state store for business profile,
//! site structure, page configuration, and topic taxonomy.
//!
//! # Architecture
//!
//! - **`domain`** — entities, state machines, repository traits
//! - **`application`** — registry, policy engine, gateway, version store
//! - **`infrastructure`** — in-memory and PostgreSQL repositories

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
