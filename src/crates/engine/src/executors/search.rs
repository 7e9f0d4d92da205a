use super::{concat_inputs, GatheredInput, NodeContext};
use crate::error::Result;
use crate::graph::Node;
use crate::result::NodeResult;

/// **search**: queries `config.searchQuery` (falling back to the
/// concatenated inputs) against the search collaborator for up to 3
/// results. The client itself is a cooperative async call (reqwest), so
/// awaiting it here yields to sibling handlers rather than stalling them.
/// Failure produces a readable error string rather than a handler failure.
pub async fn execute(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    let query = node
        .config_str("searchQuery")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| concat_inputs(inputs));

    let text = match ctx.search_client.search(&query, 3).await {
        Ok(results) if !results.is_empty() => results
            .iter()
            .map(|r| format!("Title: {}\nURL: {}\nSnippet: {}", r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n---\n"),
        Ok(_) => "No search results found".to_string(),
        Err(err) => format!("Search failed: {err}"),
    };

    Ok(NodeResult::Plain(text))
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

    fn test_config() -> Arc<EngineConfig> {
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

    #[tokio::test]
    async fn search_failure_yields_readable_text_not_an_error() {
        let (sink, _rx) = EventSink::new();
        let ctx = NodeContext {
            sink,
            chat_model: Arc::new(llm::OpenRouterClient::new(llm::RemoteLlmConfig::new("k", "http://127.0.0.1:1"))),
            search_client: Arc::new(UnconfiguredSearchClient),
            run_state: Arc::new(RunState::new()),
            config: test_config(),
        };
        let node = Node { id: "s".into(), kind: NodeKind::Search, config: json!({"searchQuery": "rust"}) };
        let result = execute(&node, &[], &ctx).await.unwrap();
        let NodeResult::Plain(text) = result else { panic!("expected plain result") };
        assert!(text.starts_with("Search failed:"));
    }
}
