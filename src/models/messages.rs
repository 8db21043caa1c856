
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, base64::Base64};

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoadMessage {
    pub user: String,
    pub peer: String,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessage {
    #[serde_as(as = "Base64")]
    pub delta: Vec<u8>,
    pub user: String,
    pub peer: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PingMessage {
    pub user: String,
    pub peer: String,
}

/// Snapshot payload sent in an Init frame.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SerializedPageDoc {
    pub id: String,
    #[serde_as(as = "Base64")]
    pub snapshot: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InitMessage {
    pub page_doc: SerializedPageDoc,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    pub date: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub code: u16,
    pub error: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ReceivedMessage {
    #[serde(rename = "load")]
    Load(LoadMessage),
    #[serde(rename = "update")]
    Update(UpdateMessage),
    #[serde(rename = "ping")]
    Ping(PingMessage),
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum SendMessage {
    #[serde(rename = "init")]
    Init(InitMessage),
    #[serde(rename = "update")]
    Update(UpdateMessage),
    #[serde(rename = "pong")]
    Pong(PongMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BroadcastMessage {
    pub sender_id: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_message_delta_is_base64_on_the_wire() {
        let msg = ReceivedMessage::Update(UpdateMessage {
            delta: vec![1, 2, 3, 4],
            user: "u1".to_string(),
            peer: "p1".to_string(),
        });
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains("\"type\":\"update\""));
        assert!(text.contains("\"delta\":\"AQIDBA==\""));

        let parsed: ReceivedMessage = serde_json::from_str(&text).unwrap();
        match parsed {
            ReceivedMessage::Update(update) => assert_eq!(update.delta, vec![1, 2, 3, 4]),
            other => panic!("expected update message, got {:?}", other),
        }
    }

    #[test]
    fn error_frame_is_tagged() {
        let msg = SendMessage::Error(ErrorMessage {
            code: 404,
            error: "page not found".to_string(),
        });
        let text = serde_json::to_string(&msg).unwrap();
        assert!(text.contains("\"type\":\"error\""));
        assert!(text.contains("\"code\":404"));
    }
}
