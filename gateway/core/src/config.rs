// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! Gateway configuration, loaded from a YAML file at startup with serde
//! defaults for every field.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Number of versions each canonical family retains after trimming.
pub const DEFAULT_RETAINED_VERSIONS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// PostgreSQL connection string; `None` selects in-memory repositories.
    pub database_url: Option<String>,

    /// Root directory of the asset store, probed by `website.run_checks`.
    pub assets_storage_root: Option<PathBuf>,

    /// Hard retention cap per canonical family.
    pub retained_versions: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            assets_storage_root: None,
            retained_versions: DEFAULT_RETAINED_VERSIONS,
        }
    }
}

impl GatewayConfig {
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: GatewayConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}
