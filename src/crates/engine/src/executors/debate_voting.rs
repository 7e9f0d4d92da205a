use super::{concat_inputs, GatheredInput, NodeContext};
use crate::error::Result;
use crate::events::FallbackEventSink;
use crate::graph::Node;
use crate::result::NodeResult;
use engine_core::{ChatRequest, Message};
use serde_json::{Map, Value};

const POSITIONS: &[&str] = &["Pro", "Con", "Neutral", "Perspective 4", "Perspective 5", "Perspective 6"];
const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
const DEFAULT_JUDGE_MODEL: &str = "openai/gpt-4-turbo";

/// **debate**: `rounds × debaters` LM calls, debaters within a round run
/// concurrently and each sees the full history of prior rounds; rounds run
/// sequentially.
pub async fn debate(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    let topic = node.config_str("topic").map(str::to_string).unwrap_or_else(|| concat_inputs(inputs));
    let num_debaters = node.config_usize("debaters", 3).max(1);
    let num_rounds = node.config_usize("rounds", 2).max(1);
    let model = node.config_str("model").unwrap_or(DEFAULT_MODEL).to_string();
    let temperature = node.config_f64("temperature", 0.8) as f32;

    let mut history: Vec<Value> = Vec::new();

    for round in 0..num_rounds {
        ctx.sink.node_progress(&node.id, round + 1, num_rounds, format!("debate round {}/{}", round + 1, num_rounds));
        let transcript = format_history(&history);

        let mut join_set = tokio::task::JoinSet::new();
        for debater in 0..num_debaters {
            let position = POSITIONS[debater % POSITIONS.len()].to_string();
            let prompt = format!(
                "Topic: {topic}\n\nYou are arguing the '{position}' position. Debate history so far:\n{transcript}\n\nMake your argument."
            );
            let request = ChatRequest::new(model.clone(), vec![Message::human(prompt)]).with_temperature(temperature);
            let chat_model = ctx.chat_model.clone();
            let max_retries = ctx.config.max_retries;
            let event_sink = ctx.sink.clone();
            let node_id = node.id.clone();
            join_set.spawn(async move {
                let fallback_sink = FallbackEventSink { sink: &event_sink, node_id: &node_id };
                let full = llm::stream_with_fallback(&chat_model, &request, max_retries, &fallback_sink, |_delta| {}).await;
                (position, full)
            });
        }

        let mut round_turns = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok((position, text)) = joined {
                round_turns.push(serde_json::json!({"round": round + 1, "position": position, "text": text}));
            }
        }
        history.extend(round_turns);
    }

    let mut fields = Map::new();
    fields.insert("debate_history".to_string(), serde_json::json!(history));
    fields.insert("question".to_string(), serde_json::json!(topic));
    fields.insert("num_debaters".to_string(), serde_json::json!(num_debaters));
    fields.insert("num_rounds".to_string(), serde_json::json!(num_rounds));

    Ok(NodeResult::structured(format_history(&history), fields))
}

fn format_history(history: &[Value]) -> String {
    history
        .iter()
        .map(|turn| {
            let round = turn.get("round").and_then(Value::as_u64).unwrap_or(0);
            let position = turn.get("position").and_then(Value::as_str).unwrap_or("");
            let text = turn.get("text").and_then(Value::as_str).unwrap_or("");
            format!("Round {round} [{position}]: {text}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// **voting**: `judge` asks one LM call to deliver a verdict over a debate
/// transcript; `consensus` asks for common ground across opinions; `count`
/// (and anything else) is a plain summary, no LM call.
pub async fn voting(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    let method = node.config_str("method").unwrap_or("count");
    let debate_input = inputs.iter().find(|i| i.result.field("debate_history").is_some());

    if method == "judge" {
        if let Some(input) = debate_input {
            let history: Vec<Value> = input.result.field("debate_history").and_then(Value::as_array).cloned().unwrap_or_default();
            let question = input.result.field("question").and_then(Value::as_str).unwrap_or("").to_string();
            let transcript = format_history(&history);
            let model = node.config_str("model").unwrap_or(DEFAULT_JUDGE_MODEL).to_string();
            let temperature = node.config_f64("temperature", 0.5) as f32;
            let prompt = format!("Question: {question}\n\nDebate transcript:\n{transcript}\n\nDeliver your verdict.");
            let request = ChatRequest::new(model, vec![Message::system("You are an impartial debate judge."), Message::human(prompt)])
                .with_temperature(temperature);
            return stream_verdict(node, ctx, request).await;
        }
    }

    if method == "consensus" {
        let combined = concat_inputs(inputs);
        let model = node.config_str("model").unwrap_or(DEFAULT_MODEL).to_string();
        let temperature = node.config_f64("temperature", 0.7) as f32;
        let request = ChatRequest::new(model, vec![Message::human(format!("Find the common ground between these opinions:\n\n{combined}"))])
            .with_temperature(temperature);
        return stream_verdict(node, ctx, request).await;
    }

    Ok(NodeResult::Plain(format!("Received {} opinions", inputs.len())))
}

async fn stream_verdict(node: &Node, ctx: &NodeContext, request: ChatRequest) -> Result<NodeResult> {
    let fallback_sink = FallbackEventSink { sink: &ctx.sink, node_id: &node.id };
    let full = llm::stream_with_fallback(&ctx.chat_model, &request, ctx.config.max_retries, &fallback_sink, |delta| {
        ctx.sink.token_stream(&node.id, delta.to_string());
    })
    .await;
    Ok(NodeResult::Plain(full))
}
