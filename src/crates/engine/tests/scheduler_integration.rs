use engine::config::EngineConfig;
use engine::events::{Event, EventSink};
use engine::graph::Graph;
use engine::scheduler::Scheduler;
use engine::search::UnconfiguredSearchClient;
use std::sync::Arc;

fn config() -> Arc<EngineConfig> {
    Arc::new(EngineConfig {
        lm_base_url: "http://127.0.0.1:1".into(),
        lm_api_key: None,
        search_endpoint: None,
        search_api_key: None,
        listen_addr: "127.0.0.1:0".into(),
        cors_origins: vec![],
        max_concurrent: 5,
        max_retries: 1,
    })
}

async fn run(graph_json: &str) -> Vec<Event> {
    let graph = Graph::parse(graph_json).unwrap();
    let (sink, mut rx) = EventSink::new();
    let chat_model = Arc::new(llm::OpenRouterClient::new(llm::RemoteLlmConfig::new("k", "http://127.0.0.1:1")));
    let scheduler = Scheduler::new(graph, sink, chat_model, Arc::new(UnconfiguredSearchClient), config());
    scheduler.run().await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn splitter_to_reduce_pipeline_completes() {
    let graph = r#"{
        "nodes": [
            {"id": "in", "type": "input", "data": {"node_config": {"inputValue": "first paragraph\n\nsecond paragraph\n\nthird paragraph"}}},
            {"id": "split", "type": "splitter", "data": {"node_config": {"strategy": "semantic", "chunk_size": 20}}},
            {"id": "reduce", "type": "reduce", "data": {"node_config": {"strategy": "other"}}},
            {"id": "out", "type": "output", "data": {}}
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "split"},
            {"id": "e2", "source": "split", "target": "reduce"},
            {"id": "e3", "source": "reduce", "target": "out"}
        ]
    }"#;

    let events = run(graph).await;
    assert!(matches!(events.first(), Some(Event::ExecutionStart)));
    let stats = match events.last() {
        Some(Event::ExecutionComplete { stats }) => *stats,
        other => panic!("expected execution_complete, got {other:?}"),
    };
    assert_eq!(stats.completed, 4);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn condition_dead_branch_is_reported_as_skipped_not_failed_silently() {
    let graph = r#"{
        "nodes": [
            {"id": "in", "type": "input", "data": {"node_config": {"inputValue": "no match here"}}},
            {"id": "cond", "type": "condition", "data": {"node_config": {"conditionType": "contains", "targetValue": "needle"}}},
            {"id": "found", "type": "output", "data": {}},
            {"id": "not_found", "type": "output", "data": {}}
        ],
        "edges": [
            {"id": "e1", "source": "in", "target": "cond"},
            {"id": "e2", "source": "cond", "target": "found", "sourceHandle": "true"},
            {"id": "e3", "source": "cond", "target": "not_found", "sourceHandle": "false"}
        ]
    }"#;

    let events = run(graph).await;
    assert!(events.iter().any(|e| matches!(e, Event::NodeSkipped { node_id } if node_id == "found")));
    assert!(events.iter().any(|e| matches!(e, Event::NodeFinish { node_id, .. } if node_id == "not_found")));
}

#[tokio::test]
async fn malformed_graph_is_rejected_before_scheduling() {
    let err = Graph::parse(r#"{"nodes":[{"id":"a","type":"not-a-kind","data":{}}],"edges":[]}"#).unwrap_err();
    assert!(matches!(err, engine::EngineError::Validation(_)));
}

#[tokio::test]
async fn cyclic_graph_with_no_entry_point_is_rejected() {
    let err = Graph::parse(
        r#"{"nodes":[{"id":"a","type":"llm","data":{}},{"id":"b","type":"llm","data":{}}],"edges":[{"id":"e1","source":"a","target":"b"},{"id":"e2","source":"b","target":"a"}]}"#,
    )
    .unwrap_err();
    assert!(matches!(err, engine::EngineError::Structural(ref m) if m == "Cycle detected or empty graph"));
}
