use super::{concat_inputs_labeled, GatheredInput, NodeContext};
use crate::error::Result;
use crate::events::FallbackEventSink;
use crate::graph::Node;
use crate::result::NodeResult;
use engine_core::{ChatRequest, Message};

const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// **llm**: seeds per-node conversation memory with a system turn on first
/// execution, appends this execution's user turn, and streams a completion
/// through the tiered fallback policy. `stream_with_fallback` never returns
/// `Err` — total exhaustion comes back as a synthetic error delta that is
/// still a successful completion (§4.4, §7), so there is no rollback branch
/// here: the user turn that was just appended is always followed by a real
/// (possibly apologetic) assistant turn.
pub async fn execute(node: &Node, inputs: &[GatheredInput], ctx: &NodeContext) -> Result<NodeResult> {
    let model = node.config_str("model").unwrap_or(DEFAULT_MODEL).to_string();
    let temperature = node.config_f64("temperature", 0.7) as f32;
    let user_turn = Message::human(concat_inputs_labeled(inputs));

    let messages = {
        let mut memory = ctx.run_state.memory.lock().await;
        let history = memory.entry(node.id.clone()).or_insert_with(|| {
            let system_prompt = node.config_str("systemPrompt").unwrap_or(DEFAULT_SYSTEM_PROMPT);
            vec![Message::system(system_prompt)]
        });
        history.push(user_turn);
        history.clone()
    };

    let request = ChatRequest::new(model, messages).with_temperature(temperature);
    let fallback_sink = FallbackEventSink { sink: &ctx.sink, node_id: &node.id };
    let full = llm::stream_with_fallback(&ctx.chat_model, &request, ctx.config.max_retries, &fallback_sink, |delta| {
        ctx.sink.token_stream(&node.id, delta.to_string());
    })
    .await;

    {
        let mut memory = ctx.run_state.memory.lock().await;
        if let Some(history) = memory.get_mut(&node.id) {
            history.push(Message::assistant(full.clone()));
        }
    }

    let input_chars: usize = request.messages.iter().map(|m| m.content.len()).sum();
    let input_tokens = input_chars / 4;
    let output_tokens = full.len() / 4;
    ctx.sink.node_usage(
        &node.id,
        serde_json::json!({
            "input_tokens": input_tokens,
            "output_tokens": output_tokens,
            "total_tokens": input_tokens + output_tokens,
        }),
    );

    Ok(NodeResult::Plain(full))
}
