//! WebSocket subscription endpoint.
//!
//! Clients send JSON control frames:
//!   `{"op": "subscribe", "topic": "session:<id>"}`
//!   `{"op": "unsubscribe", "topic": "session:<id>"}`
//! and receive the broadcaster's frames for every topic they hold.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use voltstream_realtime::Topic;

use crate::state::AppState;

/// Client control frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ClientFrame {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

/// Server acknowledgement / error frame.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ControlReply {
    Subscribed { topic: String },
    Unsubscribed { topic: String },
    Error { message: String },
}

/// GET /ws — WebSocket upgrade.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

struct ActiveSubscription {
    subscriber_id: Uuid,
    topic: Topic,
    forwarder: tokio::task::JoinHandle<()>,
}

async fn handle_connection(state: AppState, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "WebSocket client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    // All outbound traffic (events and control replies) funnels through
    // one queue so frames are never interleaved mid-write.
    let (out_tx, mut out_rx) = mpsc::channel::<String>(state.config.realtime.subscriber_buffer_size);

    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let max_subscriptions = state.config.realtime.max_subscriptions_per_connection;
    let mut subscriptions: HashMap<String, ActiveSubscription> = HashMap::new();

    while let Some(result) = ws_rx.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(error) => {
                warn!(connection_id = %connection_id, error = %error, "WebSocket error");
                break;
            }
        };

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(error) => {
                send_reply(
                    &out_tx,
                    ControlReply::Error {
                        message: format!("Malformed frame: {error}"),
                    },
                )
                .await;
                continue;
            }
        };

        match frame {
            ClientFrame::Subscribe { topic: name } => {
                if subscriptions.contains_key(&name) {
                    send_reply(&out_tx, ControlReply::Subscribed { topic: name }).await;
                    continue;
                }
                if subscriptions.len() >= max_subscriptions {
                    send_reply(
                        &out_tx,
                        ControlReply::Error {
                            message: format!("Subscription limit of {max_subscriptions} reached"),
                        },
                    )
                    .await;
                    continue;
                }
                let topic = match Topic::parse(&name) {
                    Ok(topic) => topic,
                    Err(error) => {
                        send_reply(
                            &out_tx,
                            ControlReply::Error {
                                message: error.message,
                            },
                        )
                        .await;
                        continue;
                    }
                };
                match state.broadcaster.subscribe(&topic).await {
                    Ok(mut subscription) => {
                        let subscriber_id = subscription.id;
                        let forward_tx = out_tx.clone();
                        let forwarder = tokio::spawn(async move {
                            while let Some(frame) = subscription.recv().await {
                                let Ok(text) = serde_json::to_string(&frame) else {
                                    continue;
                                };
                                if forward_tx.send(text).await.is_err() {
                                    break;
                                }
                            }
                        });
                        subscriptions.insert(
                            name.clone(),
                            ActiveSubscription {
                                subscriber_id,
                                topic,
                                forwarder,
                            },
                        );
                        send_reply(&out_tx, ControlReply::Subscribed { topic: name }).await;
                    }
                    Err(error) => {
                        send_reply(
                            &out_tx,
                            ControlReply::Error {
                                message: error.message,
                            },
                        )
                        .await;
                    }
                }
            }
            ClientFrame::Unsubscribe { topic: name } => {
                if let Some(active) = subscriptions.remove(&name) {
                    state
                        .broadcaster
                        .unsubscribe(&active.topic, active.subscriber_id);
                    active.forwarder.abort();
                }
                send_reply(&out_tx, ControlReply::Unsubscribed { topic: name }).await;
            }
        }
    }

    for (_, active) in subscriptions {
        state
            .broadcaster
            .unsubscribe(&active.topic, active.subscriber_id);
        active.forwarder.abort();
    }
    writer.abort();
    debug!(connection_id = %connection_id, "WebSocket client disconnected");
}

async fn send_reply(out_tx: &mpsc::Sender<String>, reply: ControlReply) {
    if let Ok(text) = serde_json::to_string(&reply) {
        let _ = out_tx.send(text).await;
    }
}
