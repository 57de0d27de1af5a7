//! End-to-end tests across the engine surface.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use cadre::gates::GateOutcome;
use cadre::hooks::{HookError, dispatch_request};
use cadre::prelude::*;
use cadre::retrieval::{
    Bm25Index, BruteForceVectorStore, EmbeddingProvider, HashingEmbedder, HybridSearcher,
};
use cadre::router::MockProvider;
use cadre::tools::EchoTool;
use cadre::workflow::Dag;

fn engine_with(script: Vec<cadre::router::CompletionResponse>) -> Arc<Engine> {
    let router = Arc::new(ModelRouter::new());
    router.register("mock", Arc::new(MockProvider::scripted(script)));
    let engine = Engine::builder()
        .router(router)
        .default_model("mock-model")
        .build();
    engine.tools().register(Arc::new(EchoTool));
    engine
}

// Scenario: a request.pre hook that aborts short-circuits with a 403 and
// post hooks never run.
#[tokio::test]
async fn hook_abort_blocks_request_with_403() {
    struct BlockingHook;

    #[async_trait]
    impl Hook for BlockingHook {
        fn name(&self) -> &str {
            "blocker"
        }
        fn event_type(&self) -> HookEventType {
            HookEventType::RequestPre
        }
        fn priority(&self) -> u32 {
            10
        }
        async fn execute(
            &self,
            mut context: HookContext,
            _next: Next<'_>,
        ) -> Result<HookContext, HookError> {
            context.abort_with("blocked_by_test");
            Ok(context)
        }
    }

    let registry = HookRegistry::default();
    registry.register(Arc::new(BlockingHook), None).unwrap();

    let outcome = dispatch_request(
        &registry,
        cadre::hooks::RequestInfo {
            method: "GET".into(),
            path: "/any/route".into(),
            ..cadre::hooks::RequestInfo::default()
        },
        |_| async { (200, "should not run".to_string()) },
    )
    .await;

    assert_eq!(outcome.status_code, 403);
    assert!(outcome.body.contains("blocked_by_test"));
    assert!(outcome.post_chain.is_none());
}

// Scenario: the diamond DAG groups into [[a, b], [c, d]].
#[test]
fn dag_parallel_groups_match_expected_layers() {
    let steps = vec![
        WorkflowStep::new("a", StepAction::Validate),
        WorkflowStep::new("b", StepAction::Validate),
        WorkflowStep::new("c", StepAction::Validate).depends(&["a"]),
        WorkflowStep::new("d", StepAction::Validate).depends(&["a", "b"]),
    ];
    let groups = Dag::from_steps(&steps).unwrap().parallel_groups().unwrap();
    assert_eq!(groups, vec![vec!["a", "b"], vec!["c", "d"]]);
}

// Scenario: a win between two fresh 1500-rated agents moves them to
// 1516.00 / 1484.00.
#[test]
fn elo_symmetry_on_first_win() {
    let mut service = ComparativeService::new();
    service.record_scores(&[
        AgentScore::new("a", "quality", 0.9),
        AgentScore::new("b", "quality", 0.1),
    ]);
    let result = service
        .run_pairwise_evaluation("a", "b", "quality")
        .unwrap();
    assert_eq!(
        result.outcome,
        cadre::comparative::ComparisonOutcome::Win
    );

    let a = service.elo_rating("a").unwrap();
    let b = service.elo_rating("b").unwrap();
    assert_eq!(a.rating, 1516.00);
    assert_eq!(b.rating, 1484.00);
    assert_eq!((a.games_played, b.games_played), (1, 1));
    assert_eq!((a.win_count, a.loss_count), (1, 0));
    assert_eq!((b.win_count, b.loss_count), (0, 1));
}

// Scenario: G-PR with M-01=85, M-03=35, M-05=92 evaluates to warn.
#[test]
fn gate_evaluation_warns_on_rework_breach() {
    let enforcer = GateEnforcer::default();
    let metrics = HashMap::from([
        (MetricId::SuccessRate, 85.0),
        (MetricId::ReworkRate, 35.0),
        (MetricId::ScopeAdherence, 92.0),
    ]);
    let report = enforcer.check_gate(GateType::Pr, &metrics, None);
    assert_eq!(report.overall, GateOutcome::Warn);
}

// Scenario: weighted RRF fusion ranks doc2, doc3, doc1, doc4.
#[test]
fn hybrid_fusion_ranks_shared_documents_first() {
    let vector = vec![
        ("doc1".to_string(), 0.9, json!({})),
        ("doc2".to_string(), 0.8, json!({})),
        ("doc3".to_string(), 0.7, json!({})),
    ];
    let bm25 = vec![
        ("doc2".to_string(), 5.0, json!({})),
        ("doc3".to_string(), 4.0, json!({})),
        ("doc4".to_string(), 3.0, json!({})),
    ];
    let fused = cadre::retrieval::fuse_rrf(&vector, &bm25, 0.7, 60, 10);
    let order: Vec<&str> = fused.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(order, vec!["doc2", "doc3", "doc1", "doc4"]);
}

// Scenario: an http-request step targeting the metadata service fails
// synchronously with a validation error.
#[tokio::test]
async fn ssrf_guard_blocks_metadata_service() {
    let mut step = WorkflowStep::new("probe", StepAction::HttpRequest);
    step.url = Some("http://169.254.169.254/metadata".into());
    let definition = WorkflowDefinition::new("probing", vec![step]);

    let result = WorkflowRunner::default()
        .run(&definition, HashMap::new(), "")
        .await
        .unwrap();
    assert_eq!(result.status, WorkflowStatus::Failed);
    let error = result.step_results[0].error.as_deref().unwrap();
    assert!(error.contains("blocked"), "{error}");
}

// Full arc: request-scoped agent invocation through governance, the tool
// loop, and the trace collector.
#[tokio::test]
async fn agent_invocation_leaves_queryable_trace() {
    let engine = engine_with(vec![
        MockProvider::tool_call("c1", "echo", "{\"message\":\"ping\"}"),
        MockProvider::final_message("pong"),
    ]);
    engine
        .agents()
        .register(AgentDefinition::new("runner", AgentRole::Implementer))
        .unwrap();

    let result = engine
        .invoke_agent("runner", json!({"task": "ping"}), "tenant-1")
        .await
        .unwrap();
    assert_eq!(result.output, "pong");

    let traces = engine.query_traces(&TraceFilter {
        tenant_id: Some("tenant-1".into()),
        status: Some(TraceStatus::Completed),
        ..TraceFilter::default()
    });
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].trace_id, result.trace_id);
    let completed = traces[0].completed_at.unwrap();
    assert!(completed >= traces[0].started_at);
    for step in &traces[0].execution {
        assert!(step.completed_at.is_some());
    }
}

// Governance denial surfaces as a failed trace with the security subcode.
#[tokio::test]
async fn denied_tool_call_is_classified_as_security_failure() {
    let router = Arc::new(ModelRouter::new());
    router.register(
        "mock",
        Arc::new(MockProvider::scripted(vec![
            MockProvider::tool_call("c1", "shell", "{\"command\":\"ls\"}"),
            MockProvider::final_message("unreachable"),
        ])),
    );
    let engine = Engine::builder()
        .router(router)
        .default_model("mock-model")
        .build();

    // A read-only agent proposing a shell call gets denied.
    struct ShellTool;
    #[async_trait]
    impl Tool for ShellTool {
        fn name(&self) -> &str {
            "shell"
        }
        fn description(&self) -> &str {
            "Run a shell command."
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object", "properties": {"command": {"type": "string"}}})
        }
        async fn execute(&self, _args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::ok("ran")
        }
    }
    engine.tools().register(Arc::new(ShellTool));

    let mut definition = AgentDefinition::new("auditor", AgentRole::Reviewer);
    definition.autonomy = AutonomyLevel::ReadOnly;
    engine.agents().register(definition).unwrap();

    let result = engine
        .invoke_agent("auditor", json!({}), "")
        .await
        .unwrap();
    assert_eq!(
        result.termination_reason,
        TerminationReason::ToolGovernanceDenied
    );

    let failures = engine.traces().list_failures(None, None, None);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].classification.subcode, "F-SEC-TL03");
}

// Offline evaluation arc: gate report feeds comparative scoring.
#[tokio::test]
async fn evaluation_arc_updates_leaderboard() {
    let engine = engine_with(vec![MockProvider::final_message("done")]);

    let report = engine.evaluate_gate(
        GateType::Pr,
        &HashMap::from([
            (MetricId::SuccessRate, 95.0),
            (MetricId::ReworkRate, 5.0),
            (MetricId::ScopeAdherence, 99.0),
        ]),
        None,
    );
    assert_eq!(report.overall, GateOutcome::Pass);

    engine.with_comparative(|service| {
        service.record_scores(&[
            AgentScore::new("candidate", "M-01", 95.0),
            AgentScore::new("baseline", "M-01", 88.0),
        ]);
        let _ = service.run_round_robin("M-01");
        let board = service.generate_leaderboard();
        assert_eq!(board.entries[0].agent_name, "candidate");
    });
}

// Hybrid search end-to-end over both indexes.
#[tokio::test]
async fn hybrid_search_over_live_indexes() {
    let embedder = HashingEmbedder::default();
    let mut store = BruteForceVectorStore::new();
    let mut bm25 = Bm25Index::default();
    for text in [
        "scheduling workflows as dependency layers",
        "elo ratings for agent populations",
        "governed tool execution with allowlists",
    ] {
        store.add(
            text,
            embedder.embed(text).await.unwrap(),
            json!({}),
        );
        bm25.add_document(text, json!({}));
    }

    let searcher = HybridSearcher::new(&store, &bm25, &embedder);
    let results = searcher.search("dependency workflow layers", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].text.contains("dependency"));
}
