use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::render;
use crate::search::SearchQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientMessage {
    SetFilter { query: String },
    Refresh,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.store.subscribe();
    let (filter_tx, mut filter_rx) = watch::channel(SearchQuery::default());

    info!("websocket client connected");

    let send_task = tokio::spawn(async move {
        let query = filter_rx.borrow().clone();
        if !push_snapshot(&mut sender, &state, &query).await {
            return;
        }

        loop {
            let rerender = tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => render::is_visible_change(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket client lagged; sending full view");
                        true
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = filter_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    true
                }
            };

            if !rerender {
                continue;
            }

            let query = filter_rx.borrow().clone();
            if !push_snapshot(&mut sender, &state, &query).await {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else {
                continue;
            };

            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::SetFilter { query }) => {
                    let _ = filter_tx.send(SearchQuery::new(&query));
                }
                Ok(ClientMessage::Refresh) => filter_tx.send_modify(|_| {}),
                Err(err) => warn!(error = %err, "ignoring malformed websocket message"),
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!("websocket client disconnected");
}

async fn push_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
    query: &SearchQuery,
) -> bool {
    let snapshot = match render::render(&state.store, query) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(error = %err, "failed to render view for websocket client");
            return true;
        }
    };

    let json = match serde_json::to_string(&snapshot) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize view for ws");
            return true;
        }
    };

    sender.send(Message::Text(json.into())).await.is_ok()
}
