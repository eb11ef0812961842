// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: entities, value objects, and persistence contracts.
//!
//! Nothing in this layer touches a database or the network; infrastructure
//! implementations live in `crate::infrastructure`.

pub mod approval;
pub mod canonical;
pub mod policy;
pub mod repository;
pub mod run;
pub mod search;
pub mod site_ops;
pub mod tool_call;
