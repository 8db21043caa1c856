use tracing::{info, error};
use std::sync::Arc;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;

use crate::models::{InitMessage, LoadMessage, SendMessage, SerializedPageDoc};
use crate::ws::group::PageGroup;

/// Handle LoadMessage: reply with the group's current snapshot.
pub async fn handle_load_message(
    load_msg: &LoadMessage,
    group: &Arc<PageGroup>,
    sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) {
    info!(
        "Load message received for page '{}': user={}, peer={}",
        group.key(), load_msg.user, load_msg.peer
    );

    let snapshot = match group.export_snapshot() {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to export snapshot for page '{}': {}", group.key(), e);
            return;
        }
    };

    // Send Init message back to client
    let init_msg = SendMessage::Init(InitMessage {
        page_doc: SerializedPageDoc {
            id: group.key().to_string(),
            snapshot,
        },
    });
    let init_msg_text = serde_json::to_string(&init_msg).unwrap();

    if sender.lock().await.send(Message::Text(init_msg_text)).await.is_err() {
        error!("Failed to send Init message for page '{}'", group.key());
    }
}
