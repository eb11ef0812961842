// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Built-in Tools
//!
//! The non-canonical tools every gateway instance ships with:
//!
//! - `system.echo` — liveness probe, echoes its message back.
//! - `website.run_checks` — runs the pre-deploy check suite for a site
//!   version and persists the result as a `SiteTestRun`.
//! - `website.deploy` — records a deployment, always behind approval. The
//!   gateway separately blocks a deploy whose target has no passing checks.

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::application::registry::{
    ExecutionContext, RegistryError, ToolHandler, ToolRegistry, ToolSpec,
};
use crate::domain::site_ops::{NewSiteDeployment, NewSiteTestRun};

pub const ECHO_TOOL: &str = "system.echo";
pub const RUN_CHECKS_TOOL: &str = "website.run_checks";
pub const DEPLOY_TOOL: &str = "website.deploy";

const DEFAULT_ENVIRONMENT: &str = "staging";

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EchoInput {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct EchoOutput {
    pub echo: String,
}

struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    async fn call(&self, input: Value, _ctx: ExecutionContext) -> anyhow::Result<Value> {
        let input: EchoInput = serde_json::from_value(input)?;
        Ok(serde_json::to_value(EchoOutput {
            echo: input.message,
        })?)
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunChecksInput {
    /// Site version the checks apply to.
    pub version: String,
    #[serde(default)]
    pub environment: Option<String>,
    /// Explicit outcome; when absent the outcome is derived from the checks.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Extra check results from the caller, merged into the persisted set.
    #[serde(default)]
    pub results: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RunChecksOutput {
    pub test_run_id: i64,
    pub status: String,
    pub environment: String,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

struct RunChecksHandler;

#[async_trait]
impl ToolHandler for RunChecksHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let input: RunChecksInput = serde_json::from_value(input)?;
        let environment = input
            .environment
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        let mut checks = Vec::new();

        let database_ok = ctx.stores.site_ops.ping().await.is_ok();
        checks.push(CheckResult {
            name: "database".to_string(),
            passed: database_ok,
            detail: None,
        });

        if let Some(root) = &ctx.stores.config.assets_storage_root {
            let exists = root.is_dir();
            checks.push(CheckResult {
                name: "assets_storage".to_string(),
                passed: exists,
                detail: (!exists).then(|| format!("missing directory: {}", root.display())),
            });
        }

        if let Some(extra) = input.results.as_ref().and_then(Value::as_array) {
            for entry in extra {
                if let Ok(check) = serde_json::from_value::<CheckResult>(entry.clone()) {
                    checks.push(check);
                }
            }
        }

        // An explicit status from the caller wins over the derived one.
        let status = input.status.unwrap_or_else(|| {
            if checks.iter().all(|check| check.passed) {
                "passed".to_string()
            } else {
                "failed".to_string()
            }
        });
        let completed_at =
            matches!(status.as_str(), "passed" | "failed").then(Utc::now);

        let test_run = ctx
            .stores
            .site_ops
            .create_test_run(NewSiteTestRun {
                version: input.version,
                environment: environment.clone(),
                status: status.clone(),
                summary: input.summary,
                results: Some(serde_json::json!({ "checks": checks })),
                completed_at,
            })
            .await?;

        tracing::info!(
            test_run_id = test_run.id,
            environment = %environment,
            status = %status,
            "site checks recorded"
        );
        Ok(serde_json::to_value(RunChecksOutput {
            test_run_id: test_run.id,
            status,
            environment,
            checks,
        })?)
    }
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeployInput {
    /// Target environment.
    pub target: String,
    pub version: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub record_metadata: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeployOutput {
    pub deployment_id: i64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_version: Option<String>,
}

struct DeployHandler;

#[async_trait]
impl ToolHandler for DeployHandler {
    async fn call(&self, input: Value, ctx: ExecutionContext) -> anyhow::Result<Value> {
        let input: DeployInput = serde_json::from_value(input)?;
        let status = input.status.unwrap_or_else(|| "completed".to_string());

        // The previous deployment in this environment becomes the rollback
        // target, unless it deployed the same version.
        let rollback_version = ctx
            .stores
            .site_ops
            .latest_deployment(&input.target)
            .await?
            .filter(|deployment| deployment.version != input.version)
            .map(|deployment| deployment.version);

        let deployed_at = (status == "completed").then(Utc::now);
        let deployment = ctx
            .stores
            .site_ops
            .create_deployment(NewSiteDeployment {
                environment: input.target.clone(),
                version: input.version,
                status: status.clone(),
                rollback_version: rollback_version.clone(),
                record_metadata: input.record_metadata,
                deployed_at,
            })
            .await?;

        tracing::info!(
            deployment_id = deployment.id,
            environment = %input.target,
            status = %status,
            "deployment recorded"
        );
        Ok(serde_json::to_value(DeployOutput {
            deployment_id: deployment.id,
            status,
            rollback_version,
        })?)
    }
}

/// Install the built-in tools into a registry.
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ToolSpec::new::<EchoInput, EchoOutput>(
        ECHO_TOOL,
        Some("Echo a message back.".to_string()),
        false,
        Arc::new(EchoHandler),
    )?)?;
    registry.register(ToolSpec::new::<RunChecksInput, RunChecksOutput>(
        RUN_CHECKS_TOOL,
        Some("Run the pre-deploy check suite for a site version.".to_string()),
        false,
        Arc::new(RunChecksHandler),
    )?)?;
    registry.register(ToolSpec::new::<DeployInput, DeployOutput>(
        DEPLOY_TOOL,
        Some("Deploy a site version to an environment.".to_string()),
        true,
        Arc::new(DeployHandler),
    )?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_register_cleanly() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();
        assert!(registry.get(ECHO_TOOL).is_some());
        assert!(registry.get(RUN_CHECKS_TOOL).is_some());
        assert!(registry.get(DEPLOY_TOOL).is_some());
        // Deploys always go through approval.
        assert!(registry.get(DEPLOY_TOOL).unwrap().requires_approval);
        assert!(!registry.get(ECHO_TOOL).unwrap().requires_approval);
    }

    #[test]
    fn echo_schema_rejects_missing_message() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();
        let echo = registry.get(ECHO_TOOL).unwrap();
        assert!(echo.validate_input(&serde_json::json!({"message": "hi"})).is_ok());
        assert!(echo.validate_input(&serde_json::json!({})).is_err());
    }
}
