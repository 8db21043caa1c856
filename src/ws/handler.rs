
use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, ws::{Message, WebSocket, WebSocketUpgrade}},
    response::Response,
};
use futures_util::{StreamExt, SinkExt};
use tokio::sync::Mutex;
use tracing::{info, error};
use uuid::Uuid;

use crate::models::{ErrorMessage, ReceivedMessage, SendMessage};
use crate::ws::msg_load_handler::handle_load_message;
use crate::ws::msg_ping_handler::handle_ping_message;
use crate::ws::msg_update_handler::handle_update_message;
use crate::ws::pagekey::PageKey;
use crate::ws::registry::SessionRegistry;
use crate::ws::userctx::UserCtx;

/// WebSocket handler for the collaboration endpoint
pub async fn collaboration_handler(
    Path((workspace_slug, project_id, page_id)): Path<(String, String, String)>,
    Query(user): Query<UserCtx>,
    State(registry): State<Arc<SessionRegistry>>,
    ws: WebSocketUpgrade,
) -> Response {
    let key = PageKey::new(workspace_slug, project_id, page_id);
    info!("New WebSocket connection attempt for page '{}' by user {}", key, user.user_id);
    ws.on_upgrade(move |socket| handle_socket(socket, key, user, registry))
}

/// Handle WebSocket connection
async fn handle_socket(
    mut socket: WebSocket,
    key: PageKey,
    user: UserCtx,
    registry: Arc<SessionRegistry>,
) {
    // Join (or seed) the shared page group before accepting any messages. A
    // load failure refuses the connection with an explicit error frame, so a
    // real-but-unloadable page is never silently replaced by an empty one.
    let group = match registry.checkout(&key).await {
        Ok(group) => group,
        Err(e) => {
            error!("Refusing connection for page '{}': {}", key, e);
            let frame = SendMessage::Error(ErrorMessage {
                code: e.code(),
                error: e.to_string(),
            });
            if let Ok(text) = serde_json::to_string(&frame) {
                let _ = socket.send(Message::Text(text)).await;
            }
            let _ = socket.close().await;
            return;
        }
    };

    // Generate unique connection ID to identify this client
    let connection_id1 = Uuid::new_v4().to_string();
    let connection_id2 = connection_id1.clone();

    info!(
        "WebSocket connection established for page '{}' with connection_id: {} (user: {})",
        key, connection_id1, user.user_name
    );

    // Split the socket into sender and receiver
    let (sender, mut receiver) = socket.split();

    // As we will need a reference to sender in multiple tasks, wrap it in an Arc and Mutex
    let sender1 = Arc::new(Mutex::new(sender));
    let sender2 = sender1.clone();

    let mut rbc = group.subscribe();
    let group1 = group.clone();
    let key1 = key.clone();

    // Start an async task to listen to the websocket for incoming messages
    let mut send_task = tokio::spawn(async move {
        while let Some(Ok(Message::Text(msg))) = receiver.next().await {
            // Parse the incoming message as JSON
            let json_msg: ReceivedMessage = match serde_json::from_str(&msg) {
                Ok(json_msg) => json_msg,
                Err(e) => {
                    error!("Failed to parse message for page '{}': {}", key1, e);
                    continue;
                }
            };

            // Handle different message types
            match json_msg {
                ReceivedMessage::Load(load_msg) => {
                    handle_load_message(&load_msg, &group1, &sender1).await;
                }
                ReceivedMessage::Update(update_msg) => {
                    handle_update_message(&update_msg, &group1, connection_id1.clone(), &sender1).await;
                }
                ReceivedMessage::Ping(ping_msg) => {
                    handle_ping_message(&ping_msg, &group1, &sender1).await;
                }
            }
        }
    });

    // Start a task to forward broadcast messages from other connections of the same page
    let mut recv_task = tokio::spawn(async move {
        while let Ok(broadcast_msg) = rbc.recv().await {
            // Skip messages from this connection to prevent echo
            if broadcast_msg.sender_id == connection_id2 {
                continue;
            }

            if sender2.lock().await.send(Message::Text(broadcast_msg.content)).await.is_err() {
                break;
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    registry.release(group).await;
    info!("WebSocket connection terminated for page '{}'", key);
}
