use super::{concat_inputs, GatheredInput, NodeContext, LoopState};
use crate::error::Result;
use crate::graph::Node;
use crate::result::{NodeResult, TaggedResult};
use serde_json::Map;

/// **condition**: `config.conditionType ∈ {contains, equals, not_contains}`
/// against the concatenated inputs, case-insensitive; `equals` trims.
pub fn condition(node: &Node, inputs: &[GatheredInput]) -> Result<NodeResult> {
    let condition_type = node.config_str("conditionType").unwrap_or("contains");
    let target = node.config_str("targetValue").unwrap_or("").to_lowercase();
    let concatenated = concat_inputs(inputs);
    let haystack = concatenated.to_lowercase();

    let matched = match condition_type {
        "equals" => haystack.trim() == target.trim(),
        "not_contains" => !haystack.contains(&target),
        _ => haystack.contains(&target),
    };

    Ok(NodeResult::tagged(if matched { "true" } else { "false" }, concatenated))
}

/// **loop**: advances per-node iteration state, terminating when
/// `config.targetValue` is found in the concatenated input or
/// `config.max_iterations` (default 3) is exceeded.
pub async fn loop_node(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    let target = node.config_str("targetValue").unwrap_or("").to_string();
    let max_iterations = node.config_u64("max_iterations", 3);
    let concatenated = concat_inputs(inputs);

    let iteration = {
        let mut loop_state = ctx.run_state.loop_state.lock().await;
        let state = loop_state.entry(node.id.clone()).or_insert_with(LoopState::default);
        state.iteration += 1;
        state.iteration
    };

    ctx.sink.node_usage(
        &node.id,
        serde_json::json!({"current_iteration": iteration, "max_iterations": max_iterations}),
    );

    let should_terminate = !target.is_empty() && concatenated.to_lowercase().contains(&target.to_lowercase());

    if !should_terminate && iteration <= max_iterations {
        let mut extra = Map::new();
        extra.insert("iteration".to_string(), serde_json::json!(iteration));
        Ok(NodeResult::Tagged(TaggedResult { signal: "loop".to_string(), data: concatenated, extra }))
    } else {
        Ok(NodeResult::tagged("done", concatenated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::events::EventSink;
    use crate::executors::RunState;
    use crate::graph::NodeKind;
    use crate::search::UnconfiguredSearchClient;
    use serde_json::json;
    use std::sync::Arc;

    fn input(text: &str) -> Vec<GatheredInput> {
        vec![GatheredInput { source_id: "a".into(), result: NodeResult::Plain(text.into()) }]
    }

    #[test]
    fn contains_matches_case_insensitively() {
        let node = Node { id: "c".into(), kind: NodeKind::Condition, config: json!({"conditionType": "contains", "targetValue": "Banana"}) };
        let result = condition(&node, &input("I like bananas")).unwrap();
        let NodeResult::Tagged(t) = result else { panic!("expected tagged") };
        assert_eq!(t.signal, "true");
    }

    #[test]
    fn not_contains_inverts_match() {
        let node = Node { id: "c".into(), kind: NodeKind::Condition, config: json!({"conditionType": "not_contains", "targetValue": "banana"}) };
        let result = condition(&node, &input("apples")).unwrap();
        let NodeResult::Tagged(t) = result else { panic!("expected tagged") };
        assert_eq!(t.signal, "true");
    }

    #[test]
    fn equals_trims_whitespace() {
        let node = Node { id: "c".into(), kind: NodeKind::Condition, config: json!({"conditionType": "equals", "targetValue": "done"}) };
        let result = condition(&node, &input("  done  ")).unwrap();
        let NodeResult::Tagged(t) = result else { panic!("expected tagged") };
        assert_eq!(t.signal, "true");
    }

    fn loop_ctx() -> NodeContext {
        NodeContext {
            sink: EventSink::new().0,
            chat_model: Arc::new(llm::OpenRouterClient::new(llm::RemoteLlmConfig::new("k", "http://127.0.0.1:1"))),
            search_client: Arc::new(UnconfiguredSearchClient),
            run_state: Arc::new(RunState::new()),
            config: Arc::new(EngineConfig {
                lm_base_url: "http://127.0.0.1:1".into(),
                lm_api_key: None,
                search_endpoint: None,
                search_api_key: None,
                listen_addr: "127.0.0.1:0".into(),
                cors_origins: vec![],
                max_concurrent: 5,
                max_retries: 1,
            }),
        }
    }

    #[tokio::test]
    async fn loop_emits_loop_then_done_at_bound() {
        let node = Node { id: "l".into(), kind: NodeKind::Loop, config: json!({"max_iterations": 2}) };
        let ctx = loop_ctx();

        let r1 = loop_node(&node, &input("keep going"), &ctx).await.unwrap();
        assert!(matches!(r1, NodeResult::Tagged(ref t) if t.signal == "loop"));

        let r2 = loop_node(&node, &input("keep going"), &ctx).await.unwrap();
        assert!(matches!(r2, NodeResult::Tagged(ref t) if t.signal == "loop"));

        let r3 = loop_node(&node, &input("keep going"), &ctx).await.unwrap();
        assert!(matches!(r3, NodeResult::Tagged(ref t) if t.signal == "done"));
    }

    #[tokio::test]
    async fn loop_terminates_early_when_target_value_found() {
        let node = Node { id: "l".into(), kind: NodeKind::Loop, config: json!({"max_iterations": 5, "targetValue": "finished"}) };
        let ctx = loop_ctx();
        let result = loop_node(&node, &input("the task is finished"), &ctx).await.unwrap();
        assert!(matches!(result, NodeResult::Tagged(ref t) if t.signal == "done"));
    }
}
