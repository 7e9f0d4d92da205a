//! Tiered model fallback with exponential backoff.
//!
//! Wraps [`OpenRouterClient::stream_with_model`] with the retry policy from
//! §4.4: try the requested model, and on failure retry against up to
//! `max_retries - 1` other members of its tier, waiting `2^attempt` seconds
//! (no jitter) between attempts. On total exhaustion the caller gets one
//! final text chunk describing the failure instead of an error — from the
//! scheduler's point of view the node still produced output.

use crate::error::LlmError;
use crate::provider::OpenRouterClient;
use crate::tiers::fallback_list;
use async_trait::async_trait;
use engine_core::llm::{ChatRequest, StreamChunk};
use engine_core::RetryPolicy;
use futures::StreamExt;

/// Notified before each non-first fallback attempt. Kept separate from the
/// engine's concrete event types so this crate has no dependency on `engine`.
#[async_trait]
pub trait FallbackSink: Send + Sync {
    async fn model_fallback(&self, original_model: &str, fallback_model: &str, attempt: usize, reason: &str);
}

/// A sink that does nothing; used by callers (and tests) that don't care
/// about fallback notifications.
pub struct NoopSink;

#[async_trait]
impl FallbackSink for NoopSink {
    async fn model_fallback(&self, _original_model: &str, _fallback_model: &str, _attempt: usize, _reason: &str) {}
}

/// Streams a completion, retrying across tier siblings on failure, and
/// forwards every delta to `on_delta` the moment it is read off the
/// provider stream — the caller's own token-forwarding (or accumulation)
/// happens inline, not after the whole generation has finished, so siblings
/// sharing the scheduler can interleave with this node's output (§5).
///
/// Returns the full concatenated text — either genuine model output or, on
/// total exhaustion, a single synthetic error message also passed to
/// `on_delta`. This never panics or escalates: exhaustion is represented as
/// a value, matching the "exhaustion yields a successful completion" rule.
///
/// Once at least one delta of an attempt has already reached `on_delta`,
/// that attempt's output is irrevocably downstream: a later failure of the
/// *same* attempt stops the whole call rather than retrying a fresh model,
/// since a fallback can't retroactively unsend what the caller already saw.
/// Falling back to the next tier sibling is only attempted when an attempt
/// fails before its first delta was ever forwarded.
pub async fn stream_with_fallback(
    client: &OpenRouterClient,
    request: &ChatRequest,
    max_retries: u32,
    sink: &dyn FallbackSink,
    mut on_delta: impl FnMut(&str),
) -> String {
    let original_model = request.model.clone();
    let candidates = fallback_list(&original_model, max_retries);
    let policy = RetryPolicy::new(candidates.len())
        .with_initial_interval(1.0)
        .with_backoff_factor(2.0)
        .with_jitter(false);

    let mut last_error: Option<LlmError> = None;
    let mut full = String::new();

    for (attempt, model) in candidates.iter().enumerate() {
        if attempt > 0 {
            sink.model_fallback(
                &original_model,
                model,
                attempt,
                last_error.as_ref().map(|e| e.to_string()).unwrap_or_default().as_str(),
            )
            .await;
            tokio::time::sleep(policy.calculate_delay(attempt - 1)).await;
        }

        match client.stream_with_model(request, model).await {
            Ok(mut stream) => {
                let mut emitted_any = false;
                loop {
                    match stream.next().await {
                        Some(Ok(StreamChunk::Delta(text))) => {
                            on_delta(&text);
                            full.push_str(&text);
                            emitted_any = true;
                        }
                        Some(Ok(StreamChunk::Done { .. })) | None => return full,
                        Some(Err(err)) => {
                            last_error = Some(LlmError::Other(err.to_string()));
                            if emitted_any {
                                return full;
                            }
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                last_error = Some(err);
            }
        }
    }

    let message = last_error
        .map(|e| format!("All models exhausted: {e}"))
        .unwrap_or_else(|| "All models exhausted".to_string());
    on_delta(&message);
    full.push_str(&message);
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::Message;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSink(Arc<AtomicUsize>);

    #[async_trait]
    impl FallbackSink for CountingSink {
        async fn model_fallback(&self, _o: &str, _f: &str, _a: usize, _r: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn exhaustion_against_unreachable_host_yields_error_text_not_err() {
        let client = OpenRouterClient::new(crate::config::RemoteLlmConfig::new(
            "k",
            "http://127.0.0.1:1",
        ));
        let request = ChatRequest::new("some/unlisted-model", vec![Message::human("hi")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = CountingSink(calls.clone());

        let mut forwarded = Vec::new();
        let full = stream_with_fallback(&client, &request, 2, &sink, |delta| forwarded.push(delta.to_string())).await;
        assert_eq!(forwarded.len(), 1);
        assert!(forwarded[0].contains("exhausted"));
        assert_eq!(full, forwarded[0]);
        // unlisted model has no tier siblings, so there is nothing to fall back to
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn on_delta_receives_the_same_text_as_the_returned_total() {
        let client = OpenRouterClient::new(crate::config::RemoteLlmConfig::new("k", "http://127.0.0.1:1"));
        let request = ChatRequest::new("some/unlisted-model", vec![Message::human("hi")]);
        let mut seen = String::new();
        let full = stream_with_fallback(&client, &request, 1, &NoopSink, |delta| seen.push_str(delta)).await;
        assert_eq!(seen, full);
    }
}
