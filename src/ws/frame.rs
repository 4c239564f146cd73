//! Wire frames for the chat socket
//!
//! Every frame is a JSON text message tagged by a `type` field. Inbound
//! frames that fail to parse are dropped by the dispatcher; outbound
//! frames are produced from [`Intent`] values so validation happens in one
//! place before anything touches the socket.

use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageKind};

/// Frame pushed by the server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// New message in one of the client's groups.
    ChatMessage(Message),
    /// A user's connection came up or went away.
    UserStatus { user_id: String, is_online: bool },
    /// Someone started or stopped typing in a group.
    Typing {
        group_id: String,
        user_id: String,
        is_typing: bool,
    },
}

/// Frame sent to the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    ChatMessage {
        group_id: String,
        content: Option<String>,
        message_type: MessageKind,
        file_attachment_id: Option<String>,
    },
    Typing { group_id: String, is_typing: bool },
    JoinRoom { group_id: String },
}

/// User action headed for the live socket.
#[derive(Debug, Clone)]
pub enum Intent {
    SendMessage {
        group_id: String,
        content: Option<String>,
        kind: MessageKind,
        file_attachment_id: Option<String>,
    },
    Typing { group_id: String, is_typing: bool },
    JoinGroup { group_id: String },
}

impl Intent {
    /// Encode this action as a wire frame.
    ///
    /// Returns `None` for actions that must not reach the server, like a
    /// message with neither text nor an attachment. Whitespace-only
    /// content counts as no text.
    pub fn encode(self) -> Option<ClientFrame> {
        match self {
            Intent::SendMessage {
                group_id,
                content,
                kind,
                file_attachment_id,
            } => {
                let content = content.filter(|c| !c.trim().is_empty());
                if content.is_none() && file_attachment_id.is_none() {
                    return None;
                }
                Some(ClientFrame::ChatMessage {
                    group_id,
                    content,
                    message_type: kind,
                    file_attachment_id,
                })
            }
            Intent::Typing {
                group_id,
                is_typing,
            } => Some(ClientFrame::Typing {
                group_id,
                is_typing,
            }),
            Intent::JoinGroup { group_id } => Some(ClientFrame::JoinRoom { group_id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_chat_message() {
        let text = r##"{
            "type": "chat_message",
            "id": "6f1c",
            "group_id": "g1",
            "sender_id": "u1",
            "sender": {
                "id": "u1",
                "username": "alice",
                "display_name": "Alice",
                "avatar_color": "#3B82F6"
            },
            "content": "hello there",
            "message_type": "text",
            "created_at": "2025-03-14T09:26:53.589793+00:00",
            "file_attachment": null
        }"##;

        let event: ServerEvent = serde_json::from_str(text).unwrap();
        match event {
            ServerEvent::ChatMessage(msg) => {
                assert_eq!(msg.id, "6f1c");
                assert_eq!(msg.group_id, "g1");
                assert_eq!(msg.content.as_deref(), Some("hello there"));
                assert_eq!(msg.message_type, MessageKind::Text);
                assert_eq!(msg.sender.unwrap().username, "alice");
                assert!(msg.file_attachment.is_none());
            }
            other => panic!("wrong event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_file_message() {
        let text = r#"{
            "type": "chat_message",
            "id": "6f1d",
            "group_id": "g1",
            "sender_id": "u1",
            "sender": null,
            "content": null,
            "message_type": "file",
            "created_at": "2025-03-14T09:27:00+00:00",
            "file_attachment": {
                "id": "f1",
                "original_filename": "report.pdf",
                "file_size": 52417,
                "mime_type": "application/pdf"
            }
        }"#;

        let event: ServerEvent = serde_json::from_str(text).unwrap();
        match event {
            ServerEvent::ChatMessage(msg) => {
                assert_eq!(msg.message_type, MessageKind::File);
                let att = msg.file_attachment.unwrap();
                assert_eq!(att.original_filename, "report.pdf");
                assert_eq!(att.file_size, 52417);
            }
            other => panic!("wrong event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_user_status() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"user_status","user_id":"u2","is_online":true}"#)
                .unwrap();
        match event {
            ServerEvent::UserStatus { user_id, is_online } => {
                assert_eq!(user_id, "u2");
                assert!(is_online);
            }
            other => panic!("wrong event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_typing() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"typing","group_id":"g1","user_id":"u2","is_typing":false}"#,
        )
        .unwrap();
        match event {
            ServerEvent::Typing {
                group_id,
                user_id,
                is_typing,
            } => {
                assert_eq!(group_id, "g1");
                assert_eq!(user_id, "u2");
                assert!(!is_typing);
            }
            other => panic!("wrong event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let res: Result<ServerEvent, _> =
            serde_json::from_str(r#"{"type":"room_renamed","group_id":"g1"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        // typing without user_id doesn't map to anything we can apply.
        let res: Result<ServerEvent, _> =
            serde_json::from_str(r#"{"type":"typing","group_id":"g1","is_typing":true}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_encode_send_message() {
        let frame = Intent::SendMessage {
            group_id: "g1".to_string(),
            content: Some("hi all".to_string()),
            kind: MessageKind::Text,
            file_attachment_id: None,
        }
        .encode()
        .unwrap();

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "chat_message",
                "group_id": "g1",
                "content": "hi all",
                "message_type": "text",
                "file_attachment_id": null
            })
        );
    }

    #[test]
    fn test_encode_rejects_blank_message() {
        let intent = Intent::SendMessage {
            group_id: "g1".to_string(),
            content: Some("   \n\t ".to_string()),
            kind: MessageKind::Text,
            file_attachment_id: None,
        };
        assert!(intent.encode().is_none());

        let intent = Intent::SendMessage {
            group_id: "g1".to_string(),
            content: None,
            kind: MessageKind::Text,
            file_attachment_id: None,
        };
        assert!(intent.encode().is_none());
    }

    #[test]
    fn test_encode_attachment_without_text() {
        // A bare upload is a valid send; blank caption collapses to null.
        let frame = Intent::SendMessage {
            group_id: "g1".to_string(),
            content: Some("  ".to_string()),
            kind: MessageKind::File,
            file_attachment_id: Some("f1".to_string()),
        }
        .encode()
        .unwrap();

        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["content"], serde_json::Value::Null);
        assert_eq!(value["file_attachment_id"], "f1");
        assert_eq!(value["message_type"], "file");
    }

    #[test]
    fn test_encode_typing_and_join() {
        let typing = Intent::Typing {
            group_id: "g1".to_string(),
            is_typing: true,
        }
        .encode()
        .unwrap();
        assert_eq!(
            serde_json::to_value(&typing).unwrap(),
            serde_json::json!({"type": "typing", "group_id": "g1", "is_typing": true})
        );

        let join = Intent::JoinGroup {
            group_id: "g2".to_string(),
        }
        .encode()
        .unwrap();
        assert_eq!(
            serde_json::to_value(&join).unwrap(),
            serde_json::json!({"type": "join_room", "group_id": "g2"})
        );
    }
}
