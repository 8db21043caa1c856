use tracing::{info, error};
use std::sync::Arc;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;

use crate::models::{BroadcastMessage, ErrorMessage, SendMessage, UpdateMessage};
use crate::ws::group::PageGroup;

/// Handle UpdateMessage: merge the delta into the shared document and fan it
/// out to the other connections of the page.
pub async fn handle_update_message(
    update_msg: &UpdateMessage,
    group: &Arc<PageGroup>,
    connection_id: String,
    sender: &Arc<Mutex<SplitSink<WebSocket, Message>>>,
) {
    info!(
        "Update message received for page '{}': user={}, peer={}",
        group.key(), update_msg.user, update_msg.peer
    );

    if let Err(e) = group.apply_update(&update_msg.delta) {
        // A rejected delta is scoped to this sender; the session stays open.
        error!("Rejected update for page '{}': {}", group.key(), e);
        let frame = SendMessage::Error(ErrorMessage {
            code: e.code(),
            error: e.to_string(),
        });
        let text = serde_json::to_string(&frame).unwrap();
        let _ = sender.lock().await.send(Message::Text(text)).await;
        return;
    }

    let broadcast_msg = BroadcastMessage {
        sender_id: connection_id,
        content: serde_json::to_string(&SendMessage::Update(update_msg.clone())).unwrap(),
    };
    group.publish(broadcast_msg);
}
