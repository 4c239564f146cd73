//! Message-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    File,
    Image,
    System,
}

/// File attached to a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: String,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: String,
}

/// Sender summary embedded in a message
///
/// The live push carries this trimmed shape rather than the full user
/// record; REST responses include extra fields which deserialize into it
/// just as well.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSender {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_color: String,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub group_id: String,
    pub sender_id: Option<String>,
    #[serde(default)]
    pub sender: Option<MessageSender>,
    pub content: Option<String>,
    pub message_type: MessageKind,
    pub created_at: DateTime<Utc>,
    pub file_attachment: Option<FileAttachment>,
}
