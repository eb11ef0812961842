// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! # Tool Execution Gateway
//!
//! Turns a tool request into at most one handler invocation:
//!
//! 1. resolve the tool (and the run/step it belongs to) — unknown names are
//!    client errors and leave no record behind;
//! 2. resolve and validate a supplied approval, reusing its bound call
//!    record so the approval round-trip never allocates a second record;
//! 3. validate input against the registered schema — the handler is never
//!    invoked on invalid input;
//! 4. run domain preconditions (a deploy needs a passing check run);
//! 5. consult the policy engine — `RequireApproval` suspends the call,
//!    returning an `approval_id` the caller resubmits with later;
//! 6. invoke the handler once, measuring wall-clock duration around the
//!    call only;
//! 7. validate the output schema;
//! 8. persist duration and final status on every exit path after the
//!    handler starts.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::application::builtins::DEPLOY_TOOL;
use crate::application::policy::PolicyEngine;
use crate::application::registry::{ExecutionContext, ToolRegistry, ToolSpec};
use crate::application::GatewayStores;
use crate::domain::approval::{ApprovalRecord, ApprovalStatus, NewApproval};
use crate::domain::repository::RepositoryError;
use crate::domain::tool_call::{NewToolCall, ToolCallRecord, ToolCallStatus};

/// Longest classified error message persisted on a call record.
const MAX_ERROR_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Agent run not found: {0}")]
    RunNotFound(String),

    #[error("Agent step not found: {0}")]
    StepNotFound(i64),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Approval not found: {0}")]
    ApprovalNotFound(i64),

    #[error("Approval does not match tool")]
    ApprovalToolMismatch,

    #[error("Approval does not match run")]
    ApprovalRunMismatch,

    #[error("Approval tool call mismatch")]
    ApprovalCallMismatch,

    #[error("Approval not granted")]
    ApprovalNotGranted,

    #[error("Tool call {0} already finished")]
    CallAlreadyFinished(i64),

    #[error("Tool input validation failed: {0}")]
    InvalidInput(String),

    #[error("Denied by policy: {0}")]
    Denied(String),

    #[error("{0}")]
    Blocked(String),

    #[error("Tool output validation failed: {0}")]
    InvalidOutput(String),

    #[error("Tool execution failed: {0}")]
    HandlerFailed(String),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl GatewayError {
    /// Client errors are recoverable by the caller (fix input, obtain
    /// approval, wait for a prerequisite) and never corrupt state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::RunNotFound(_)
                | GatewayError::StepNotFound(_)
                | GatewayError::ToolNotFound(_)
                | GatewayError::ApprovalNotFound(_)
                | GatewayError::ApprovalToolMismatch
                | GatewayError::ApprovalRunMismatch
                | GatewayError::ApprovalCallMismatch
                | GatewayError::ApprovalNotGranted
                | GatewayError::CallAlreadyFinished(_)
                | GatewayError::InvalidInput(_)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub run_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub step_id: Option<i64>,
    #[serde(default)]
    pub requester: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub approval_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteStatus {
    Completed,
    RequiresApproval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub status: ExecuteStatus,
    pub tool_call_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub struct ToolExecutionGateway {
    registry: Arc<ToolRegistry>,
    policy: PolicyEngine,
    stores: Arc<GatewayStores>,
}

impl ToolExecutionGateway {
    pub fn new(registry: Arc<ToolRegistry>, stores: Arc<GatewayStores>) -> Self {
        Self {
            registry,
            policy: PolicyEngine::new(),
            stores,
        }
    }

    pub async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, GatewayError> {
        // Step 1: resolve run, step, and tool before any record exists.
        if self.stores.runs.find_run(&request.run_id).await?.is_none() {
            return Err(GatewayError::RunNotFound(request.run_id));
        }
        if let Some(step_id) = request.step_id {
            if self.stores.runs.find_step(step_id).await?.is_none() {
                return Err(GatewayError::StepNotFound(step_id));
            }
        }
        let tool = self
            .registry
            .get(&request.tool_name)
            .ok_or_else(|| GatewayError::ToolNotFound(request.tool_name.clone()))?;

        // Step 2: resolve a supplied approval and its bound call record.
        let mut approval: Option<ApprovalRecord> = None;
        let mut bound_call: Option<ToolCallRecord> = None;
        if let Some(approval_id) = request.approval_id {
            let resolved = self
                .stores
                .approvals
                .find_by_id(approval_id)
                .await?
                .ok_or(GatewayError::ApprovalNotFound(approval_id))?;
            if resolved.action != request.tool_name {
                return Err(GatewayError::ApprovalToolMismatch);
            }
            if let Some(run_id) = &resolved.run_id {
                if run_id != &request.run_id {
                    return Err(GatewayError::ApprovalRunMismatch);
                }
            }
            if resolved.status != ApprovalStatus::Approved {
                return Err(GatewayError::ApprovalNotGranted);
            }
            if let Some(tool_call_id) = resolved.tool_call_id {
                if let Some(call) = self.stores.tool_calls.find_by_id(tool_call_id).await? {
                    if call.tool_name != request.tool_name {
                        return Err(GatewayError::ApprovalCallMismatch);
                    }
                    bound_call = Some(call);
                }
            }
            approval = Some(resolved);
        }

        let mut record = match bound_call {
            // Resuming a suspended call: reuse the record, never allocate a
            // second one. A record already in a terminal state is never
            // re-invoked; replaying a consumed approval is a client error.
            Some(mut existing) => {
                if existing.status.is_terminal() {
                    return Err(GatewayError::CallAlreadyFinished(existing.id));
                }
                existing.status = ToolCallStatus::Running;
                existing.step_id = request.step_id;
                existing.correlation_id = request.correlation_id.clone();
                existing.input = Some(request.input.clone());
                self.stores.tool_calls.update(&existing).await?;
                existing
            }
            None => {
                let created = self
                    .stores
                    .tool_calls
                    .create(NewToolCall {
                        run_id: request.run_id.clone(),
                        step_id: request.step_id,
                        tool_name: request.tool_name.clone(),
                        status: ToolCallStatus::Running,
                        correlation_id: request.correlation_id.clone(),
                        input: Some(request.input.clone()),
                    })
                    .await?;
                if let Some(approval) = approval.as_mut() {
                    if approval.tool_call_id.is_none() {
                        approval.tool_call_id = Some(created.id);
                        self.stores.approvals.update(approval).await?;
                    }
                }
                created
            }
        };

        // Step 3: input schema validation; the handler never sees bad input.
        if let Err(errors) = tool.validate_input(&request.input) {
            self.fail_record(&mut record, ToolCallStatus::Failed, &errors)
                .await?;
            return Err(GatewayError::InvalidInput(errors));
        }

        // Step 4: domain preconditions.
        if let Err(err) = self.check_preconditions(&tool, &request, &mut record).await {
            return Err(err);
        }

        // Step 5: policy.
        let decision = self.policy.evaluate(&tool, Some(&request.input));
        if decision.denied() {
            let reason = decision
                .reason
                .clone()
                .unwrap_or_else(|| "Denied by policy".to_string());
            self.fail_record(&mut record, ToolCallStatus::Denied, &reason)
                .await?;
            return Err(GatewayError::Denied(reason));
        }
        if decision.requires_approval() && approval.is_none() {
            let created = self
                .stores
                .approvals
                .create(NewApproval {
                    action: tool.name.clone(),
                    proposal: Some(request.input.clone()),
                    requester: request
                        .requester
                        .clone()
                        .unwrap_or_else(|| "system".to_string()),
                    run_id: Some(request.run_id.clone()),
                    tool_call_id: Some(record.id),
                })
                .await?;
            record.status = ToolCallStatus::RequiresApproval;
            self.stores.tool_calls.update(&record).await?;
            tracing::info!(
                tool = %tool.name,
                tool_call_id = record.id,
                approval_id = created.id,
                "tool call suspended pending approval"
            );
            return Ok(ExecuteResponse {
                status: ExecuteStatus::RequiresApproval,
                tool_call_id: record.id,
                output: None,
                approval_id: Some(created.id),
                reason: decision.reason,
            });
        }

        // Steps 6-8: invoke at most once; duration is persisted on every
        // exit path below, whichever one is taken.
        let ctx = ExecutionContext {
            run_id: request.run_id.clone(),
            step_id: request.step_id,
            requester: request.requester.clone(),
            stores: self.stores.clone(),
        };
        let started = Instant::now();
        let outcome = tool.invoke(request.input.clone(), ctx).await;
        record.duration_ms = Some(started.elapsed().as_millis() as i64);

        match outcome {
            Ok(output) => {
                if let Err(errors) = tool.validate_output(&output) {
                    self.fail_record(&mut record, ToolCallStatus::Failed, &errors)
                        .await?;
                    return Err(GatewayError::InvalidOutput(errors));
                }
                record.status = ToolCallStatus::Completed;
                record.output = Some(output);
                record.error_message = None;
                self.stores.tool_calls.update(&record).await?;
                Ok(ExecuteResponse {
                    status: ExecuteStatus::Completed,
                    tool_call_id: record.id,
                    output: record.output.clone(),
                    approval_id: approval.map(|a| a.id),
                    reason: None,
                })
            }
            Err(err) => {
                let message = classify_error(&err);
                self.fail_record(&mut record, ToolCallStatus::Failed, &message)
                    .await?;
                Err(GatewayError::HandlerFailed(message))
            }
        }
    }

    /// A deploy only proceeds when the latest check run for the same
    /// version and target environment passed; otherwise the record is
    /// `blocked` and the caller gets a conflict.
    async fn check_preconditions(
        &self,
        tool: &ToolSpec,
        request: &ExecuteRequest,
        record: &mut ToolCallRecord,
    ) -> Result<(), GatewayError> {
        if tool.name != DEPLOY_TOOL {
            return Ok(());
        }
        let target = request.input.get("target").and_then(Value::as_str);
        let version = request.input.get("version").and_then(Value::as_str);
        let (Some(target), Some(version)) = (target, version) else {
            return Ok(());
        };
        let latest = self.stores.site_ops.latest_test_run(version, target).await?;
        let passed = latest
            .map(|test_run| test_run.status == "passed")
            .unwrap_or(false);
        if passed {
            return Ok(());
        }
        self.fail_record(
            record,
            ToolCallStatus::Blocked,
            "Checks not passed for target environment.",
        )
        .await?;
        Err(GatewayError::Blocked(
            "Checks must pass before deploy.".to_string(),
        ))
    }

    async fn fail_record(
        &self,
        record: &mut ToolCallRecord,
        status: ToolCallStatus,
        message: &str,
    ) -> Result<(), RepositoryError> {
        record.status = status;
        record.error_message = Some(message.to_string());
        self.stores.tool_calls.update(record).await
    }
}

/// Short classified message (error chain, bounded to `MAX_ERROR_LEN`
/// bytes at a char boundary), never an unbounded backtrace.
fn classify_error(err: &anyhow::Error) -> String {
    let mut message = format!("{err:#}");
    if message.len() > MAX_ERROR_LEN {
        let mut cut = MAX_ERROR_LEN;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classified_errors_are_bounded() {
        let err = anyhow::anyhow!("x".repeat(2000));
        assert_eq!(classify_error(&err).len(), MAX_ERROR_LEN);
        let err = anyhow::anyhow!("short");
        assert_eq!(classify_error(&err), "short");
    }

    #[test]
    fn classified_errors_are_bounded_in_bytes_for_multibyte_text() {
        // 'é' is two bytes; the cap is a byte cap, cut at a char boundary.
        let err = anyhow::anyhow!("é".repeat(600));
        let message = classify_error(&err);
        assert!(message.len() <= MAX_ERROR_LEN);
        assert!(message.chars().all(|c| c == 'é'));
    }

    #[test]
    fn request_deserializes_with_optional_fields_absent() {
        let request: ExecuteRequest =
            serde_json::from_str(r#"{"run_id": "r1", "tool_name": "system.echo"}"#).unwrap();
        assert_eq!(request.input, Value::Null);
        assert!(request.approval_id.is_none());
        assert!(request.correlation_id.is_none());
    }
}
