use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of message content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    File,
    Audio,
    Video,
    System,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "image" => Self::Image,
            "file" => Self::File,
            "audio" => Self::Audio,
            "video" => Self::Video,
            "system" => Self::System,
            _ => Self::Text,
        }
    }
}

/// A message as known by the remote server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A client-originated message waiting for remote acceptance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxItem {
    /// Assigned at compose time, stable across retries
    pub temp_id: String,
    pub conversation_id: String,
    pub content: String,
    pub message_type: MessageType,
    /// Local path or handle of attached media
    pub media_ref: Option<String>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OutboxItem {
    pub fn new(
        conversation_id: impl Into<String>,
        content: impl Into<String>,
        message_type: MessageType,
        media_ref: Option<String>,
    ) -> Self {
        Self {
            temp_id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            content: content.into(),
            message_type,
            media_ref,
            retry_count: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Request body for the remote send.
    pub fn to_outgoing(&self) -> OutgoingMessage {
        OutgoingMessage {
            client_message_id: self.temp_id.clone(),
            conversation_id: self.conversation_id.clone(),
            content: self.content.clone(),
            message_type: self.message_type,
            media_refs: self.media_ref.iter().cloned().collect(),
        }
    }
}

/// Payload handed to [`crate::sync::RemoteApi::send_message`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// The outbox temp id, lets the server drop replays
    pub client_message_id: String,
    #[serde(skip)]
    pub conversation_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub media_refs: Vec<String>,
}

/// Pull state for one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSyncMetadata {
    pub conversation_id: String,
    pub last_sync_at: DateTime<Utc>,
    /// Id of the newest message stored by the last non-empty pull
    pub last_message_id: Option<String>,
    /// The last pull stopped on a full page
    pub has_more: bool,
}
