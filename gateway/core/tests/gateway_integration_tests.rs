// Copyright (c) 2026 Atelier Console
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end gateway scenarios against in-memory stores: the approval
//! round-trip, execution preconditions, and the canonical-state invariants.

use std::sync::Arc;

use serde_json::{json, Value};

use atelier_gateway_core::application::approvals::ApprovalService;
use atelier_gateway_core::application::builtins::register_builtin_tools;
use atelier_gateway_core::application::canonical_tools::register_canonical_tools;
use atelier_gateway_core::application::gateway::{
    ExecuteRequest, ExecuteStatus, GatewayError, ToolExecutionGateway,
};
use atelier_gateway_core::application::registry::ToolRegistry;
use atelier_gateway_core::application::GatewayStores;
use atelier_gateway_core::config::GatewayConfig;
use atelier_gateway_core::domain::approval::{ApprovalDecision, ApprovalStatus};
use atelier_gateway_core::domain::run::AgentRun;
use atelier_gateway_core::domain::search::{SearchHit, SearchIndex};
use atelier_gateway_core::domain::tool_call::ToolCallStatus;
use atelier_gateway_core::infrastructure::in_memory_stores;
use atelier_gateway_core::infrastructure::repositories::{
    InMemoryApprovalRepository, InMemoryCanonicalRepository, InMemoryRunRepository,
    InMemorySiteOpsRepository, InMemoryToolCallRepository,
};

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry).unwrap();
    register_canonical_tools(&mut registry).unwrap();
    Arc::new(registry)
}

async fn setup() -> (Arc<GatewayStores>, ToolExecutionGateway, String) {
    let stores = in_memory_stores(GatewayConfig::default());
    let gateway = ToolExecutionGateway::new(registry(), stores.clone());
    let run = AgentRun::new("update the plumbing site".to_string());
    let run_id = run.id.clone();
    stores.runs.save_run(&run).await.unwrap();
    (stores, gateway, run_id)
}

fn request(run_id: &str, tool_name: &str, input: Value) -> ExecuteRequest {
    ExecuteRequest {
        run_id: run_id.to_string(),
        tool_name: tool_name.to_string(),
        input,
        step_id: None,
        requester: None,
        correlation_id: None,
        approval_id: None,
    }
}

async fn pass_checks(gateway: &ToolExecutionGateway, run_id: &str, version: &str) {
    let response = gateway
        .execute(request(
            run_id,
            "website.run_checks",
            json!({"version": version, "environment": "staging"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status, ExecuteStatus::Completed);
    let output = response.output.unwrap();
    assert_eq!(output["status"], "passed");
}

#[tokio::test]
async fn echo_completes_with_logged_duration() {
    let (stores, gateway, run_id) = setup().await;
    let response = gateway
        .execute(request(&run_id, "system.echo", json!({"message": "hello"})))
        .await
        .unwrap();
    assert_eq!(response.status, ExecuteStatus::Completed);
    assert_eq!(response.output.unwrap()["echo"], "hello");

    let record = stores
        .tool_calls
        .find_by_id(response.tool_call_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ToolCallStatus::Completed);
    assert!(record.duration_ms.is_some());
}

#[tokio::test]
async fn unknown_run_is_rejected_before_any_record() {
    let (stores, gateway, _) = setup().await;
    let err = gateway
        .execute(request("no-such-run", "system.echo", json!({"message": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::RunNotFound(_)));
    assert!(stores.tool_calls.find_by_id(1).await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_tool_is_rejected_before_any_record() {
    let (stores, gateway, run_id) = setup().await;
    let err = gateway
        .execute(request(&run_id, "website.does_not_exist", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::ToolNotFound(_)));
    assert!(stores.tool_calls.find_by_id(1).await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_input_marks_the_record_failed() {
    let (stores, gateway, run_id) = setup().await;
    let err = gateway
        .execute(request(&run_id, "system.echo", json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidInput(_)));

    let calls = stores.tool_calls.find_by_run(&run_id, 10).await.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, ToolCallStatus::Failed);
    assert!(calls[0].error_message.is_some());
}

#[tokio::test]
async fn deploy_round_trips_through_approval_on_one_record() {
    let (stores, gateway, run_id) = setup().await;
    pass_checks(&gateway, &run_id, "v1").await;

    let deploy_input = json!({"target": "staging", "version": "v1"});
    let suspended = gateway
        .execute(request(&run_id, "website.deploy", deploy_input.clone()))
        .await
        .unwrap();
    assert_eq!(suspended.status, ExecuteStatus::RequiresApproval);
    let approval_id = suspended.approval_id.unwrap();

    let record = stores
        .tool_calls
        .find_by_id(suspended.tool_call_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ToolCallStatus::RequiresApproval);

    let approvals = ApprovalService::new(stores.clone());
    let approval = approvals.get(approval_id).await.unwrap();
    assert_eq!(approval.action, "website.deploy");
    assert_eq!(approval.tool_call_id, Some(suspended.tool_call_id));
    approvals
        .decide(
            approval_id,
            ApprovalDecision {
                status: ApprovalStatus::Approved,
                decided_by: Some("reviewer".to_string()),
                decision_notes: None,
                outcome: None,
            },
        )
        .await
        .unwrap();

    let mut resume = request(&run_id, "website.deploy", deploy_input);
    resume.approval_id = Some(approval_id);
    let completed = gateway.execute(resume).await.unwrap();
    assert_eq!(completed.status, ExecuteStatus::Completed);
    // The suspended record is reused, not duplicated.
    assert_eq!(completed.tool_call_id, suspended.tool_call_id);
    assert_eq!(stores.tool_calls.find_by_run(&run_id, 10).await.unwrap().len(), 2);

    let output = completed.output.unwrap();
    assert_eq!(output["status"], "completed");
    let deployment = stores
        .site_ops
        .latest_deployment("staging")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deployment.version, "v1");
    assert!(deployment.deployed_at.is_some());
}

struct ExplodingHandler;

#[async_trait::async_trait]
impl atelier_gateway_core::application::registry::ToolHandler for ExplodingHandler {
    async fn call(
        &self,
        _input: Value,
        _ctx: atelier_gateway_core::application::registry::ExecutionContext,
    ) -> anyhow::Result<Value> {
        panic!("handler must not run while approval is outstanding");
    }
}

#[tokio::test]
async fn gated_handler_is_never_invoked_without_approval() {
    let stores = in_memory_stores(GatewayConfig::default());
    let mut registry = ToolRegistry::new();
    registry
        .register(
            atelier_gateway_core::application::registry::ToolSpec::new::<Value, Value>(
                "system.gated",
                None,
                true,
                Arc::new(ExplodingHandler),
            )
            .unwrap(),
        )
        .unwrap();
    let gateway = ToolExecutionGateway::new(Arc::new(registry), stores.clone());
    let run = AgentRun::new("gated".to_string());
    stores.runs.save_run(&run).await.unwrap();

    let response = gateway
        .execute(request(&run.id, "system.gated", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status, ExecuteStatus::RequiresApproval);
    assert!(response.approval_id.is_some());
}

#[tokio::test]
async fn pending_approval_does_not_permit_execution() {
    let (stores, gateway, run_id) = setup().await;
    pass_checks(&gateway, &run_id, "v1").await;

    let deploy_input = json!({"target": "staging", "version": "v1"});
    let suspended = gateway
        .execute(request(&run_id, "website.deploy", deploy_input.clone()))
        .await
        .unwrap();

    let mut resume = request(&run_id, "website.deploy", deploy_input);
    resume.approval_id = suspended.approval_id;
    let err = gateway.execute(resume).await.unwrap_err();
    assert!(matches!(err, GatewayError::ApprovalNotGranted));
    assert!(stores.site_ops.latest_deployment("staging").await.unwrap().is_none());
}

#[tokio::test]
async fn consumed_approval_cannot_replay_a_finished_call() {
    let (stores, gateway, run_id) = setup().await;
    pass_checks(&gateway, &run_id, "v1").await;

    let deploy_input = json!({"target": "staging", "version": "v1"});
    let suspended = gateway
        .execute(request(&run_id, "website.deploy", deploy_input.clone()))
        .await
        .unwrap();
    let approval_id = suspended.approval_id.unwrap();
    ApprovalService::new(stores.clone())
        .decide(
            approval_id,
            ApprovalDecision {
                status: ApprovalStatus::Approved,
                decided_by: Some("reviewer".to_string()),
                decision_notes: None,
                outcome: None,
            },
        )
        .await
        .unwrap();

    let mut resume = request(&run_id, "website.deploy", deploy_input.clone());
    resume.approval_id = Some(approval_id);
    let completed = gateway.execute(resume).await.unwrap();
    assert_eq!(completed.status, ExecuteStatus::Completed);
    let first_deployment_id = completed.output.unwrap()["deployment_id"].as_i64().unwrap();

    // Submitting the consumed approval again finds the record terminal and
    // never reaches the handler.
    let mut replay = request(&run_id, "website.deploy", deploy_input);
    replay.approval_id = Some(approval_id);
    let err = gateway.execute(replay).await.unwrap_err();
    assert!(matches!(err, GatewayError::CallAlreadyFinished(id) if id == completed.tool_call_id));

    let record = stores
        .tool_calls
        .find_by_id(completed.tool_call_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ToolCallStatus::Completed);
    let latest = stores
        .site_ops
        .latest_deployment("staging")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, first_deployment_id);
}

#[tokio::test]
async fn rejected_approval_does_not_execute() {
    let (stores, gateway, run_id) = setup().await;
    pass_checks(&gateway, &run_id, "v1").await;

    let deploy_input = json!({"target": "staging", "version": "v1"});
    let suspended = gateway
        .execute(request(&run_id, "website.deploy", deploy_input.clone()))
        .await
        .unwrap();
    let approval_id = suspended.approval_id.unwrap();

    ApprovalService::new(stores.clone())
        .decide(
            approval_id,
            ApprovalDecision {
                status: ApprovalStatus::Rejected,
                decided_by: Some("reviewer".to_string()),
                decision_notes: Some("not yet".to_string()),
                outcome: None,
            },
        )
        .await
        .unwrap();

    let mut resume = request(&run_id, "website.deploy", deploy_input);
    resume.approval_id = Some(approval_id);
    let err = gateway.execute(resume).await.unwrap_err();
    assert!(matches!(err, GatewayError::ApprovalNotGranted));
    assert!(stores.site_ops.latest_deployment("staging").await.unwrap().is_none());
}

#[tokio::test]
async fn approval_must_match_the_submitted_tool() {
    let (stores, gateway, run_id) = setup().await;
    pass_checks(&gateway, &run_id, "v1").await;

    let suspended = gateway
        .execute(request(
            &run_id,
            "website.deploy",
            json!({"target": "staging", "version": "v1"}),
        ))
        .await
        .unwrap();
    let approval_id = suspended.approval_id.unwrap();
    ApprovalService::new(stores.clone())
        .decide(
            approval_id,
            ApprovalDecision {
                status: ApprovalStatus::Approved,
                decided_by: None,
                decision_notes: None,
                outcome: None,
            },
        )
        .await
        .unwrap();

    let mut misuse = request(&run_id, "system.echo", json!({"message": "hi"}));
    misuse.approval_id = Some(approval_id);
    let err = gateway.execute(misuse).await.unwrap_err();
    assert!(matches!(err, GatewayError::ApprovalToolMismatch));
}

#[tokio::test]
async fn approval_bound_to_another_run_is_rejected() {
    let (stores, gateway, run_id) = setup().await;
    pass_checks(&gateway, &run_id, "v1").await;

    let suspended = gateway
        .execute(request(
            &run_id,
            "website.deploy",
            json!({"target": "staging", "version": "v1"}),
        ))
        .await
        .unwrap();
    let approval_id = suspended.approval_id.unwrap();

    let other_run = AgentRun::new("another run".to_string());
    stores.runs.save_run(&other_run).await.unwrap();
    let mut cross = request(
        &other_run.id,
        "website.deploy",
        json!({"target": "staging", "version": "v1"}),
    );
    cross.approval_id = Some(approval_id);
    let err = gateway.execute(cross).await.unwrap_err();
    assert!(matches!(err, GatewayError::ApprovalRunMismatch));
}

#[tokio::test]
async fn deploy_is_blocked_without_passing_checks() {
    let (stores, gateway, run_id) = setup().await;
    let err = gateway
        .execute(request(
            &run_id,
            "website.deploy",
            json!({"target": "staging", "version": "v1"}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Blocked(_)));

    let calls = stores.tool_calls.find_by_run(&run_id, 10).await.unwrap();
    assert_eq!(calls[0].status, ToolCallStatus::Blocked);
    // Checks for a different version do not unblock this one.
    pass_checks(&gateway, &run_id, "v2").await;
    let err = gateway
        .execute(request(
            &run_id,
            "website.deploy",
            json!({"target": "staging", "version": "v1"}),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Blocked(_)));
}

#[tokio::test]
async fn canonical_mutation_without_classification_requires_approval() {
    let (_, gateway, run_id) = setup().await;
    let response = gateway
        .execute(request(
            &run_id,
            "canonical.business_profile.create",
            json!({"profile_data": {"name": "Smith Plumbing"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status, ExecuteStatus::RequiresApproval);
    assert!(response.approval_id.is_some());
}

#[tokio::test]
async fn safe_auto_commit_writes_coalesce_into_one_draft() {
    let (stores, gateway, run_id) = setup().await;
    let first = gateway
        .execute(request(
            &run_id,
            "canonical.business_profile.create",
            json!({
                "profile_data": {"name": "Smith Plumbing"},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();
    let second = gateway
        .execute(request(
            &run_id,
            "canonical.business_profile.create",
            json!({
                "profile_data": {"name": "Smith Plumbing & Heating"},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();

    let first_version = first.output.unwrap();
    let second_version = second.output.unwrap();
    assert_eq!(first_version["id"], second_version["id"]);
    assert_eq!(
        second_version["payload"]["name"],
        "Smith Plumbing & Heating"
    );
    assert_eq!(second_version["status"], "draft");

    // Each write also lands in the search index.
    let hits = stores.search.search("heating", 10, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source_type, "business_profile");
}

#[tokio::test]
async fn approve_promotes_the_open_draft_in_place() {
    let (_, gateway, run_id) = setup().await;
    let draft = gateway
        .execute(request(
            &run_id,
            "canonical.site_structure.create",
            json!({
                "structure_data": {"pages": ["home"]},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();
    let approved = gateway
        .execute(request(
            &run_id,
            "canonical.site_structure.approve",
            json!({
                "structure_data": {"pages": ["home", "contact"]},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();

    let draft_version = draft.output.unwrap();
    let approved_version = approved.output.unwrap();
    assert_eq!(draft_version["id"], approved_version["id"]);
    assert_eq!(approved_version["status"], "approved");
    assert!(!approved_version["approved_at"].is_null());
}

#[tokio::test]
async fn retention_keeps_only_the_newest_versions() {
    let (_, gateway, run_id) = setup().await;
    for n in 0..4 {
        gateway
            .execute(request(
                &run_id,
                "canonical.business_profile.create",
                json!({
                    "profile_data": {"revision": n},
                    "commit_classification": "safe_auto_commit",
                    "force_new": true
                }),
            ))
            .await
            .unwrap();
    }
    let history = gateway
        .execute(request(&run_id, "canonical.business_profile.history", json!({})))
        .await
        .unwrap();
    let items = history.output.unwrap();
    let items = items["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["payload"]["revision"], 3);
    assert_eq!(items[2]["payload"]["revision"], 1);
    // The oldest survivor lost its purged parent.
    assert!(items[2]["parent_version_id"].is_null());
}

#[tokio::test]
async fn selection_rules_pin_a_taxonomy_snapshot() {
    let (stores, gateway, run_id) = setup().await;
    gateway
        .execute(request(
            &run_id,
            "canonical.taxonomy.approve",
            json!({
                "taxonomy_data": {"topics": ["boilers"]},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();

    let structure = gateway
        .execute(request(
            &run_id,
            "canonical.site_structure.create",
            json!({
                "structure_data": {"pages": ["services"]},
                "selection_rules": {"include": ["boilers"]},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();
    let structure_version = structure.output.unwrap();
    let snapshot_id = structure_version["taxonomy_snapshot_id"].as_i64().unwrap();

    // A later taxonomy edit leaves the captured snapshot untouched.
    gateway
        .execute(request(
            &run_id,
            "canonical.taxonomy.create",
            json!({
                "taxonomy_data": {"topics": ["boilers", "radiators"]},
                "commit_classification": "safe_auto_commit",
                "force_new": true
            }),
        ))
        .await
        .unwrap();

    let snapshot = stores
        .snapshots
        .find_by_id(snapshot_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.snapshot_data.unwrap()["topics"], json!(["boilers"]));
}

#[tokio::test]
async fn taxonomy_mutations_append_to_the_change_log() {
    let (_, gateway, run_id) = setup().await;
    gateway
        .execute(request(
            &run_id,
            "canonical.taxonomy.create",
            json!({
                "taxonomy_data": {"topics": ["boilers"]},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();
    gateway
        .execute(request(
            &run_id,
            "canonical.taxonomy.approve",
            json!({
                "taxonomy_data": {"topics": ["boilers", "leaks"]},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();

    let changes = gateway
        .execute(request(&run_id, "canonical.taxonomy.changes", json!({})))
        .await
        .unwrap();
    let output = changes.output.unwrap();
    let items = output["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["change_type"], "approved");
    assert_eq!(items[1]["change_type"], "created");
}

#[tokio::test]
async fn restore_replays_a_logged_payload() {
    let (_, gateway, run_id) = setup().await;
    gateway
        .execute(request(
            &run_id,
            "canonical.taxonomy.approve",
            json!({
                "taxonomy_data": {"topics": ["original"]},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();
    gateway
        .execute(request(
            &run_id,
            "canonical.taxonomy.approve",
            json!({
                "taxonomy_data": {"topics": ["replacement"]},
                "commit_classification": "safe_auto_commit",
                "force_new": true
            }),
        ))
        .await
        .unwrap();

    let changes = gateway
        .execute(request(&run_id, "canonical.taxonomy.changes", json!({})))
        .await
        .unwrap();
    let output = changes.output.unwrap();
    let original_change_id = output["items"].as_array().unwrap()[1]["id"].as_i64().unwrap();

    let restored = gateway
        .execute(request(
            &run_id,
            "canonical.taxonomy.restore",
            json!({
                "change_id": original_change_id,
                "commit_classification": "safe_auto_commit",
                "force_new": true
            }),
        ))
        .await
        .unwrap();
    let version = restored.output.unwrap();
    assert_eq!(version["payload"]["topics"], json!(["original"]));

    let changes = gateway
        .execute(request(&run_id, "canonical.taxonomy.changes", json!({})))
        .await
        .unwrap();
    let output = changes.output.unwrap();
    assert_eq!(output["items"].as_array().unwrap()[0]["change_type"], "restored");
}

struct FailingSearchIndex;

#[async_trait::async_trait]
impl SearchIndex for FailingSearchIndex {
    async fn upsert(
        &self,
        _source_type: &str,
        _source_id: &str,
        _content: &str,
        _record_metadata: Option<serde_json::Value>,
    ) -> anyhow::Result<()> {
        anyhow::bail!("search backend unavailable")
    }

    async fn search(
        &self,
        _query: &str,
        _top_k: usize,
        _source_types: Option<&[String]>,
    ) -> anyhow::Result<Vec<SearchHit>> {
        anyhow::bail!("search backend unavailable")
    }
}

#[tokio::test]
async fn failing_search_index_never_fails_a_write() {
    let canonical = Arc::new(InMemoryCanonicalRepository::new());
    let stores = Arc::new(GatewayStores {
        runs: Arc::new(InMemoryRunRepository::new()),
        tool_calls: Arc::new(InMemoryToolCallRepository::new()),
        approvals: Arc::new(InMemoryApprovalRepository::new()),
        versions: canonical.clone(),
        snapshots: canonical.clone(),
        taxonomy_changes: canonical,
        site_ops: Arc::new(InMemorySiteOpsRepository::new()),
        search: Arc::new(FailingSearchIndex),
        config: GatewayConfig::default(),
    });
    let gateway = ToolExecutionGateway::new(registry(), stores.clone());
    let run = AgentRun::new("indexing outage".to_string());
    stores.runs.save_run(&run).await.unwrap();

    let response = gateway
        .execute(request(
            &run.id,
            "canonical.business_profile.create",
            json!({
                "profile_data": {"name": "Smith Plumbing"},
                "commit_classification": "safe_auto_commit"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status, ExecuteStatus::Completed);
}
