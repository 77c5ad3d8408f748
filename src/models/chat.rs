use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: u64,
    #[serde(default, alias = "participant_name")]
    pub participant_name: Option<String>,
    #[serde(default, alias = "last_message")]
    pub last_message: Option<String>,
    #[serde(default, alias = "unread_count")]
    pub unread_count: u32,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u64,
    #[serde(alias = "conversation_id")]
    pub conversation_id: u64,
    #[serde(default, alias = "sender_id")]
    pub sender_id: Option<u64>,
    #[serde(default, alias = "sender_name")]
    pub sender_name: Option<String>,
    pub content: String,
    #[serde(default, alias = "is_read")]
    pub is_read: bool,
    #[serde(default, alias = "sent_at", alias = "createdAt", alias = "created_at")]
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub conversation_id: u64,
    pub content: String,
}

/// Read receipt pushed as `MessageRead`. Without a message id every
/// message in the conversation counts as read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRead {
    #[serde(alias = "conversation_id")]
    pub conversation_id: u64,
    #[serde(default, alias = "message_id")]
    pub message_id: Option<u64>,
}
