use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn snapshot_json(state: &AppState) -> Option<String> {
    let snapshot = state.snapshot_rx.borrow().clone();
    serde_json::to_string(&snapshot).ok()
}

async fn send_text(sink: &mut SplitSink<WebSocket, Message>, json: String) -> bool {
    sink.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ws_tx.subscribe();

    // Initial snapshot so the screen renders before the next event
    if let Some(json) = snapshot_json(&state) {
        if !send_text(&mut sender, json).await {
            return;
        }
    }

    // Client asks for a fresh snapshot by sending "snapshot"
    let (resync_tx, mut resync_rx) = mpsc::channel::<()>(4);

    let send_state = state.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let json = tokio::select! {
                msg = rx.recv() => match msg {
                    Ok(ws_msg) => match serde_json::to_string(&ws_msg) {
                        Ok(json) => json,
                        Err(_) => continue,
                    },
                    // Slow client: skip the backlog and resync from the snapshot
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped = skipped, "ws client lagged, resyncing");
                        match snapshot_json(&send_state) {
                            Some(json) => json,
                            None => continue,
                        }
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(()) = resync_rx.recv() => match snapshot_json(&send_state) {
                    Some(json) => json,
                    None => continue,
                },
            };
            if !send_text(&mut sender, json).await {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) if text.as_str().trim() == "snapshot" => {
                    if resync_tx.send(()).await.is_err() {
                        break;
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
