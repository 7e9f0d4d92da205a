//! The `/ws/execute` session loop (§6): one graph submission per text frame,
//! one scheduler run per submission, events streamed back as they're
//! produced. A parse/validation failure reports an `error` event on the same
//! socket and the session stays open for the next submission.

use crate::api::AppState;
use crate::events::Event;
use crate::graph::Graph;
use crate::scheduler::Scheduler;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state))
}

async fn run_session(mut socket: WebSocket, state: AppState) {
    loop {
        let Some(frame) = socket.recv().await else { break };
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(_) => break,
        };

        match Graph::parse(&text) {
            Ok(graph) => {
                if run_graph(&mut socket, graph, &state).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                let event = Event::Error { message: err.to_string() };
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Runs one submission to completion, forwarding every emitted event onto
/// the socket as it arrives. Returns `Err` only on a socket write failure,
/// which ends the whole session; node/execution failures stay inside the
/// event stream per §7.
async fn run_graph(socket: &mut WebSocket, graph: Graph, state: &AppState) -> Result<(), axum::Error> {
    let (sink, mut rx) = crate::events::EventSink::new();
    let scheduler = Scheduler::new(graph, sink, state.chat_model.clone(), state.search_client.clone(), state.config.clone());

    let run_handle = tokio::spawn(scheduler.run());

    while let Some(event) = rx.recv().await {
        send_event(socket, &event).await?;
    }

    let _ = run_handle.await;
    Ok(())
}

async fn send_event(socket: &mut WebSocket, event: &Event) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{\"type\":\"error\",\"message\":\"failed to serialize event\"}".to_string());
    socket.send(WsMessage::Text(payload)).await
}
