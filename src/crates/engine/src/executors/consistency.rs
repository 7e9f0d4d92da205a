use super::{concat_inputs, GatheredInput, NodeContext};
use crate::error::Result;
use crate::events::FallbackEventSink;
use crate::graph::Node;
use crate::result::NodeResult;
use engine_core::{ChatRequest, Message};
use serde_json::Map;
use std::collections::HashMap;

const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
const MAX_TEMPERATURE: f32 = 2.0;

/// **self-consistency**: samples `config.samples` (default 5) completions
/// at increasing temperature and votes on the answer under `config.voting`.
pub async fn execute(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    let samples = node.config_usize("samples", 5).max(1);
    let base_temp = node.config_f64("temperature", 0.7) as f32;
    let model = node.config_str("model").unwrap_or(DEFAULT_MODEL).to_string();
    let voting_method = node.config_str("voting").unwrap_or("majority").to_string();
    let prompt = concat_inputs(inputs);

    let mut responses = Vec::with_capacity(samples);
    for i in 0..samples {
        ctx.sink.node_progress(&node.id, i + 1, samples, format!("sampling {}/{}", i + 1, samples));
        let temperature = (base_temp + 0.1 * i as f32).min(MAX_TEMPERATURE);
        let request = ChatRequest::new(model.clone(), vec![Message::human(prompt.clone())]).with_temperature(temperature);
        let fallback_sink = FallbackEventSink { sink: &ctx.sink, node_id: &node.id };
        let full = llm::stream_with_fallback(&ctx.chat_model, &request, ctx.config.max_retries, &fallback_sink, |_delta| {}).await;
        responses.push(full);
    }

    let (answer, confidence) = vote(&responses, &voting_method);

    let mut fields = Map::new();
    fields.insert("answer".to_string(), serde_json::json!(answer));
    fields.insert("confidence".to_string(), serde_json::json!(confidence));
    fields.insert("all_responses".to_string(), serde_json::json!(responses));
    fields.insert("voting_method".to_string(), serde_json::json!(voting_method));

    let consensus_block = format!("Consensus ({voting_method}, confidence {confidence:.2}):\n{answer}");
    ctx.sink.token_stream(&node.id, consensus_block);

    Ok(NodeResult::structured(answer, fields))
}

fn vote(responses: &[String], method: &str) -> (String, f64) {
    let total = responses.len().max(1);
    match method {
        "first" => (responses.first().cloned().unwrap_or_default(), 1.0 / total as f64),
        "longest" => {
            let total_len: usize = responses.iter().map(String::len).sum();
            let winner = responses.iter().max_by_key(|r| r.len()).cloned().unwrap_or_default();
            let confidence = if total_len == 0 { 0.0 } else { winner.len() as f64 / total_len as f64 };
            (winner, confidence)
        }
        _ => {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for response in responses {
                *counts.entry(response.as_str()).or_insert(0) += 1;
            }
            let winner = counts.iter().max_by_key(|(_, count)| **count).map(|(text, _)| text.to_string()).unwrap_or_default();
            let wins = counts.get(winner.as_str()).copied().unwrap_or(0);
            (winner, wins as f64 / total as f64)
        }
    }
}
