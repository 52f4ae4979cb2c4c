use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[inline]
fn is_refresh_command(text: &str) -> bool {
    text.trim() == "refresh"
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_tx.subscribe();

    // Current refresh state first, tagged like the stream messages
    {
        let snapshot = state.snapshot_rx.borrow().clone();
        let hello = serde_json::json!({ "type": "state", "state": snapshot });
        if sender.send(Message::Text(hello.to_string().into())).await.is_err() {
            return;
        }
    }

    // Forward broadcast messages to this client
    let send_task = tokio::spawn(async move {
        loop {
            let ws_msg = match rx.recv().await {
                Ok(m) => m,
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "ws client lagging");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let Ok(json) = serde_json::to_string(&ws_msg) else { continue };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // A client may ask for a refresh; anything else is ignored
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) if is_refresh_command(text.as_str()) => {
                    if let Err(e) = state.request_refresh() {
                        tracing::warn!(error = %e, "ws refresh request failed");
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    // Either side finishing means the client is gone
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_command_parsing() {
        assert!(is_refresh_command(" refresh\n"));
        assert!(!is_refresh_command("refresh now"));
    }
}
