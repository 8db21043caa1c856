use tracing::{info, error};
use std::sync::Arc;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;
use chrono::Utc;

use crate::models::{PingMessage, PongMessage, SendMessage};
use crate::ws::group::PageGroup;

/// Handle PingMessage
pub async fn handle_ping_message(
    _ping_msg: &PingMessage,
    group: &Arc<PageGroup>,
    sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) {
    info!("Ping message received for page '{}'", group.key());

    // Reply with pong
    let pong = SendMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
    let pong_msg = serde_json::to_string(&pong).unwrap();
    if sender.lock().await.send(Message::Text(pong_msg)).await.is_err() {
        error!("Failed to send Pong message for page '{}'", group.key());
    }
}
