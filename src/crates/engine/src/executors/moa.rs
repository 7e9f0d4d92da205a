use super::{concat_inputs, GatheredInput, NodeContext};
use crate::error::Result;
use crate::events::FallbackEventSink;
use crate::graph::Node;
use crate::result::NodeResult;
use engine_core::{ChatRequest, Message};
use serde_json::{Map, Value};

const DEFAULT_PROPOSER_MODEL: &str = "openai/gpt-3.5-turbo";
const DEFAULT_AGGREGATOR_MODEL: &str = "openai/gpt-4-turbo";

/// **moa-proposer**: launches one streaming completion per `config.models`
/// concurrently, over the same user prompt.
pub async fn proposer(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    let models: Vec<String> = node
        .config
        .get("models")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_else(|| vec![DEFAULT_PROPOSER_MODEL.to_string()]);
    let prompt = concat_inputs(inputs);

    let temperature = node.config_f64("temperature", 0.7) as f32;
    let mut join_set = tokio::task::JoinSet::new();
    for (i, model) in models.iter().cloned().enumerate() {
        ctx.sink.node_progress(&node.id, i + 1, models.len(), format!("launching {model}"));
        let request = ChatRequest::new(model.clone(), vec![Message::human(prompt.clone())]).with_temperature(temperature);
        let chat_model = ctx.chat_model.clone();
        let max_retries = ctx.config.max_retries;
        let event_sink = ctx.sink.clone();
        let node_id = node.id.clone();
        join_set.spawn(async move {
            let fallback_sink = FallbackEventSink { sink: &event_sink, node_id: &node_id };
            let full = llm::stream_with_fallback(&chat_model, &request, max_retries, &fallback_sink, |_delta| {}).await;
            (model, full)
        });
    }

    let mut outputs = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        if let Ok((model, text)) = joined {
            outputs.push(serde_json::json!({"model": model, "output": text}));
        }
    }

    let success_rate = if models.is_empty() { 0.0 } else { outputs.len() as f64 / models.len() as f64 };
    let text = outputs
        .iter()
        .filter_map(|o| o.get("output").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let mut fields = Map::new();
    fields.insert("proposer_outputs".to_string(), serde_json::json!(outputs));
    fields.insert("models_used".to_string(), serde_json::json!(models));
    fields.insert("success_rate".to_string(), serde_json::json!(success_rate));

    Ok(NodeResult::structured(text, fields))
}

/// **moa-aggregator**: synthesizes proposer outputs under `config.strategy`.
/// If no input carries `proposer_outputs`, returns a no-op text result.
pub async fn aggregator(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    let mut combined = String::new();
    let mut found_any = false;
    for input in inputs {
        if let Some(Value::Array(outputs)) = input.result.field("proposer_outputs") {
            found_any = true;
            for entry in outputs {
                let model = entry.get("model").and_then(Value::as_str).unwrap_or("unknown");
                let output = entry.get("output").and_then(Value::as_str).unwrap_or("");
                combined.push_str(&format!("--- {model} ---\n{output}\n\n"));
            }
        }
    }

    if !found_any {
        return Ok(NodeResult::Plain("No proposer outputs to aggregate".to_string()));
    }

    let strategy = node.config_str("strategy").unwrap_or("synthesis");
    let instruction = match strategy {
        "critique" => "Critique the following proposals and point out their weaknesses:",
        "best" => "Select and return the single best proposal below, verbatim:",
        _ => "Synthesize the following proposals into one coherent answer:",
    };
    let model = node.config_str("model").unwrap_or(DEFAULT_AGGREGATOR_MODEL).to_string();
    let temperature = node.config_f64("temperature", 0.6) as f32;
    let prompt = format!("{instruction}\n\n{combined}");
    let request = ChatRequest::new(model, vec![Message::human(prompt)]).with_temperature(temperature);
    let fallback_sink = FallbackEventSink { sink: &ctx.sink, node_id: &node.id };
    let full = llm::stream_with_fallback(&ctx.chat_model, &request, ctx.config.max_retries, &fallback_sink, |delta| {
        ctx.sink.token_stream(&node.id, delta.to_string());
    })
    .await;

    Ok(NodeResult::Plain(full))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::events::EventSink;
    use crate::executors::RunState;
    use crate::graph::NodeKind;
    use crate::result::NodeResult as NR;
    use crate::search::UnconfiguredSearchClient;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> NodeContext {
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
    async fn proposer_reports_one_output_per_model() {
        let node = Node { id: "p".into(), kind: NodeKind::MoaProposer, config: json!({"models": ["a/model", "b/model"]}) };
        let result = proposer(&node, &[], &ctx()).await.unwrap();
        let NR::Structured(value) = result else { panic!("expected structured result") };
        assert_eq!(value["proposer_outputs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn aggregator_with_no_proposer_input_is_a_no_op() {
        let node = Node { id: "agg".into(), kind: NodeKind::MoaAggregator, config: json!({}) };
        let inputs = vec![GatheredInput { source_id: "x".into(), result: NR::Plain("irrelevant".into()) }];
        let result = aggregator(&node, &inputs, &ctx()).await.unwrap();
        let NR::Plain(text) = result else { panic!("expected plain result") };
        assert_eq!(text, "No proposer outputs to aggregate");
    }
}
