//! Inbound event dispatch
//!
//! Takes raw frame text off the socket, parses it, and applies exactly one
//! store op per event. A frame that fails to parse is logged at debug and
//! dropped; the connection stays up.

use std::time::Duration;

use crate::store::StoreHandle;
use crate::ws::frame::ServerEvent;

/// How long a typing indicator stays lit without a follow-up signal.
pub const TYPING_EXPIRY: Duration = Duration::from_millis(3000);

/// Applies server events to the store.
pub struct Dispatcher {
    store: StoreHandle,
    typing_expiry: Duration,
}

impl Dispatcher {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store,
            typing_expiry: TYPING_EXPIRY,
        }
    }

    #[cfg(test)]
    fn with_expiry(store: StoreHandle, typing_expiry: Duration) -> Self {
        Self {
            store,
            typing_expiry,
        }
    }

    /// Parse one frame and apply it. Returns the parsed event so callers
    /// can forward it, or `None` if the frame was dropped.
    pub fn dispatch(&self, text: &str) -> Option<ServerEvent> {
        let event: ServerEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!("dropping frame: {}", e);
                return None;
            }
        };
        self.apply(&event);
        Some(event)
    }

    fn apply(&self, event: &ServerEvent) {
        match event {
            ServerEvent::ChatMessage(message) => {
                self.store.append_message(message.clone());
            }
            ServerEvent::UserStatus { user_id, is_online } => {
                self.store.set_user_online(user_id, *is_online);
            }
            ServerEvent::Typing {
                group_id,
                user_id,
                is_typing,
            } => {
                self.store.set_user_typing(group_id, user_id, *is_typing);
                if *is_typing {
                    self.schedule_typing_clear(group_id.clone(), user_id.clone());
                }
            }
        }
    }

    /// Arm the expiry for a typing indicator.
    ///
    /// The clear fires unconditionally and is not cancelled by later
    /// signals; since clearing an absent entry is a no-op, a stale timer
    /// can at worst blank an indicator that the sender's next signal
    /// re-lights.
    fn schedule_typing_clear(&self, group_id: String, user_id: String) {
        let store = self.store.clone();
        let expiry = self.typing_expiry;
        tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            store.set_user_typing(&group_id, &user_id, false);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_frame(id: &str, group_id: &str, content: &str) -> String {
        format!(
            r#"{{"type":"chat_message","id":"{}","group_id":"{}","sender_id":"u1","sender":null,"content":"{}","message_type":"text","created_at":"2025-03-14T09:26:53+00:00","file_attachment":null}}"#,
            id, group_id, content
        )
    }

    #[tokio::test]
    async fn test_chat_message_lands_in_store() {
        let store = StoreHandle::new();
        let dispatcher = Dispatcher::new(store.clone());

        let event = dispatcher.dispatch(&chat_frame("m1", "g1", "hi"));
        assert!(event.is_some());

        let snap = store.snapshot();
        assert_eq!(snap.messages("g1").len(), 1);
        assert_eq!(snap.messages("g1")[0].content.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_duplicate_push_stored_once() {
        let store = StoreHandle::new();
        let dispatcher = Dispatcher::new(store.clone());

        dispatcher.dispatch(&chat_frame("m1", "g1", "hi"));
        dispatcher.dispatch(&chat_frame("m1", "g1", "hi"));

        assert_eq!(store.snapshot().messages("g1").len(), 1);
    }

    #[tokio::test]
    async fn test_user_status_updates_presence() {
        let store = StoreHandle::new();
        let dispatcher = Dispatcher::new(store.clone());

        dispatcher.dispatch(r#"{"type":"user_status","user_id":"u2","is_online":true}"#);
        assert!(store.snapshot().is_online("u2"));

        dispatcher.dispatch(r#"{"type":"user_status","user_id":"u2","is_online":false}"#);
        assert!(!store.snapshot().is_online("u2"));
    }

    #[tokio::test]
    async fn test_typing_expires() {
        let store = StoreHandle::new();
        let dispatcher = Dispatcher::with_expiry(store.clone(), Duration::from_millis(25));

        dispatcher.dispatch(r#"{"type":"typing","group_id":"g1","user_id":"u2","is_typing":true}"#);
        assert_eq!(store.snapshot().typing_users("g1"), vec!["u2"]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.snapshot().typing_users("g1").is_empty());
    }

    #[tokio::test]
    async fn test_typing_false_clears_immediately() {
        let store = StoreHandle::new();
        let dispatcher = Dispatcher::new(store.clone());

        dispatcher.dispatch(r#"{"type":"typing","group_id":"g1","user_id":"u2","is_typing":true}"#);
        dispatcher
            .dispatch(r#"{"type":"typing","group_id":"g1","user_id":"u2","is_typing":false}"#);

        assert!(store.snapshot().typing_users("g1").is_empty());
    }

    #[tokio::test]
    async fn test_stale_timer_is_harmless() {
        let store = StoreHandle::new();
        let dispatcher = Dispatcher::with_expiry(store.clone(), Duration::from_millis(25));

        // Stop signal beats the timer; the timer still fires later and
        // must find nothing to do.
        dispatcher.dispatch(r#"{"type":"typing","group_id":"g1","user_id":"u2","is_typing":true}"#);
        dispatcher
            .dispatch(r#"{"type":"typing","group_id":"g1","user_id":"u2","is_typing":false}"#);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.snapshot().typing_users("g1").is_empty());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let store = StoreHandle::new();
        let dispatcher = Dispatcher::new(store.clone());

        assert!(dispatcher.dispatch("not json at all").is_none());
        assert!(dispatcher.dispatch(r#"{"type":"chat_message"}"#).is_none());
        assert!(dispatcher
            .dispatch(r#"{"type":"server_shutdown","in":"60s"}"#)
            .is_none());

        let snap = store.snapshot();
        assert!(snap.messages("g1").is_empty());
        assert!(snap.online_users().is_empty());
    }
}
