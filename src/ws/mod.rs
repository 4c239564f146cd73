//! Real-time sync over the chat WebSocket
//!
//! The server pushes messages, presence, and typing signals over one
//! socket; this module keeps the local store in step with them. `conn`
//! owns the socket lifecycle and reconnects, `dispatch` folds inbound
//! events into the store, `frame` defines the wire shapes, and
//! `transport` hides the actual socket behind traits.

pub mod conn;
pub mod dispatch;
pub mod frame;
pub mod transport;

pub use conn::{open, ConnState, LiveHandle};
pub use frame::{Intent, ServerEvent};

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time;

use crate::api::{self, client::ApiClient};
use crate::config::Config;
use crate::models::{Message, MessageKind};
use crate::store::StoreHandle;

/// How long `send`/`upload` wait for the connection and the echo.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(10);

/// Fold a fetched history page into a group's sequence.
///
/// The first page a group sees replaces its (empty) sequence. A page
/// fetched with a cursor is strictly older than everything loaded, so
/// it goes in front as-is. A cursor-less page is the newest slice and
/// can straddle what is already there, e.g. after a reconnect, so it
/// merges by timestamp instead.
pub fn merge_history_page(
    store: &StoreHandle,
    group_id: &str,
    before: Option<DateTime<Utc>>,
    page: Vec<Message>,
) {
    if store.has_no_messages(group_id) {
        store.set_messages(group_id, page);
    } else if before.is_some() {
        store.prepend_messages(group_id, page);
    } else {
        store.merge_messages(group_id, page);
    }
}

/// Follow live traffic, printing each event until Ctrl-C.
pub async fn watch(group_filter: Option<String>) -> Result<()> {
    let client = ApiClient::new()?;
    let store = StoreHandle::new();

    let groups = api::list_groups_data(&client).await?;
    let users = api::list_users_data(&client).await?;
    let group_names: HashMap<String, String> = groups
        .iter()
        .map(|g| (g.id.clone(), g.name.clone()))
        .collect();
    let user_names: HashMap<String, String> = users
        .iter()
        .map(|u| (u.id.clone(), u.display_name.clone()))
        .collect();
    store.set_groups(groups);

    let online = api::online_users_data(&client).await?;
    store.set_online_users(online.into_iter().map(|u| u.id).collect());

    let filter = match group_filter.as_deref() {
        Some(wanted) => Some(resolve_group(&group_names, wanted)?),
        None => None,
    };

    let (tap_tx, mut tap_rx) = mpsc::unbounded_channel();
    let handle = conn::open(client.server_addr(), client.token(), store, Some(tap_tx))
        .context("Live connection did not start")?;

    println!("Watching for events (Ctrl-C to stop)...");
    loop {
        tokio::select! {
            event = tap_rx.recv() => match event {
                Some(event) => print_event(&event, filter.as_deref(), &group_names, &user_names),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.close().await;
    println!("Stopped.");
    Ok(())
}

/// Send one text message over a short-lived live connection.
///
/// The server stores the message and broadcasts it back to every member
/// including the sender, so the echo doubles as delivery confirmation.
pub async fn send_message(group_id: &str, content: &str) -> Result<()> {
    if content.trim().is_empty() {
        bail!("Message is empty.");
    }
    let client = ApiClient::new()?;
    let me = Config::load()?.user.map(|u| u.id);

    let intent = Intent::SendMessage {
        group_id: group_id.to_string(),
        content: Some(content.to_string()),
        kind: MessageKind::Text,
        file_attachment_id: None,
    };
    let want_group = group_id.to_string();
    let want_text = content.to_string();
    deliver(&client, intent, move |msg: &Message| {
        msg.group_id == want_group
            && msg.content.as_deref() == Some(want_text.as_str())
            && me
                .as_deref()
                .map_or(true, |id| msg.sender_id.as_deref() == Some(id))
    })
    .await?;

    println!("Message sent.");
    Ok(())
}

/// Upload a file, then send the attachment message over the live socket.
pub async fn send_file(group_id: &str, path: &Path, caption: Option<String>) -> Result<()> {
    let client = ApiClient::new()?;

    let attachment = api::upload_file_data(&client, path).await?;
    println!(
        "Uploaded {} ({} bytes).",
        attachment.original_filename, attachment.file_size
    );

    let kind = if attachment.mime_type.starts_with("image/") {
        MessageKind::Image
    } else {
        MessageKind::File
    };
    let intent = Intent::SendMessage {
        group_id: group_id.to_string(),
        content: caption.filter(|c| !c.trim().is_empty()),
        kind,
        file_attachment_id: Some(attachment.id.clone()),
    };
    let want_attachment = attachment.id;
    deliver(&client, intent, move |msg: &Message| {
        msg.file_attachment.as_ref().map(|a| a.id.as_str()) == Some(want_attachment.as_str())
    })
    .await?;

    println!("Message sent.");
    Ok(())
}

/// Open a one-off connection, send the intent, and wait for its echo.
async fn deliver(
    client: &ApiClient,
    intent: Intent,
    confirm: impl Fn(&Message) -> bool,
) -> Result<()> {
    let store = StoreHandle::new();
    let (tap_tx, mut tap_rx) = mpsc::unbounded_channel();
    let handle = conn::open(client.server_addr(), client.token(), store, Some(tap_tx))
        .context("Live connection did not start")?;

    let mut state_rx = handle.state_changes();
    let opened = time::timeout(CONFIRM_TIMEOUT, wait_for_open(&mut state_rx)).await;
    if !matches!(opened, Ok(true)) {
        handle.close().await;
        bail!(
            "Could not reach {} within {:?}",
            client.server_addr(),
            CONFIRM_TIMEOUT
        );
    }

    handle.send(intent);

    let confirmed = time::timeout(CONFIRM_TIMEOUT, async {
        while let Some(event) = tap_rx.recv().await {
            if let ServerEvent::ChatMessage(msg) = event {
                if confirm(&msg) {
                    return true;
                }
            }
        }
        false
    })
    .await;
    handle.close().await;

    match confirmed {
        Ok(true) => Ok(()),
        Ok(false) => bail!("Connection ended before the server echoed the message"),
        Err(_) => bail!("No echo from the server within {:?}", CONFIRM_TIMEOUT),
    }
}

async fn wait_for_open(state_rx: &mut watch::Receiver<ConnState>) -> bool {
    loop {
        if *state_rx.borrow_and_update() == ConnState::Open {
            return true;
        }
        if state_rx.changed().await.is_err() {
            return false;
        }
    }
}

fn resolve_group(group_names: &HashMap<String, String>, wanted: &str) -> Result<String> {
    group_names
        .iter()
        .find(|(id, name)| id.as_str() == wanted || name.as_str() == wanted)
        .map(|(id, _)| id.clone())
        .with_context(|| format!("No group matching {:?}", wanted))
}

fn print_event(
    event: &ServerEvent,
    filter: Option<&str>,
    group_names: &HashMap<String, String>,
    user_names: &HashMap<String, String>,
) {
    let group_label = |id: &str| group_names.get(id).cloned().unwrap_or_else(|| id.to_string());
    let user_label = |id: &str| user_names.get(id).cloned().unwrap_or_else(|| id.to_string());

    match event {
        ServerEvent::ChatMessage(msg) => {
            if filter.map_or(false, |f| f != msg.group_id) {
                return;
            }
            let group = group_label(&msg.group_id);
            let sender = msg
                .sender
                .as_ref()
                .map(|s| s.display_name.clone())
                .or_else(|| msg.sender_id.as_deref().map(user_label))
                .unwrap_or_else(|| "(system)".to_string());
            match (&msg.content, &msg.file_attachment) {
                (Some(text), Some(att)) => {
                    println!("[{}] {}: {} [file: {}]", group, sender, text, att.original_filename);
                }
                (None, Some(att)) => {
                    println!("[{}] {}: [file: {}]", group, sender, att.original_filename);
                }
                (Some(text), None) => println!("[{}] {}: {}", group, sender, text),
                (None, None) => {}
            }
        }
        ServerEvent::UserStatus { user_id, is_online } => {
            let state = if *is_online { "online" } else { "offline" };
            println!("* {} is now {}", user_label(user_id), state);
        }
        ServerEvent::Typing {
            group_id,
            user_id,
            is_typing,
        } => {
            if filter.map_or(false, |f| f != group_id) {
                return;
            }
            if *is_typing {
                println!("~ {} is typing in {}", user_label(user_id), group_label(group_id));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            group_id: "g1".to_string(),
            sender_id: Some("u1".to_string()),
            sender: None,
            content: Some(format!("msg {}", id)),
            message_type: MessageKind::Text,
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            file_attachment: None,
        }
    }

    fn ids(store: &StoreHandle) -> Vec<String> {
        store
            .snapshot()
            .messages("g1")
            .iter()
            .map(|m| m.id.clone())
            .collect()
    }

    #[test]
    fn test_first_page_replaces() {
        let store = StoreHandle::new();
        merge_history_page(&store, "g1", None, vec![msg("m1", 0), msg("m2", 10)]);
        assert_eq!(ids(&store), vec!["m1", "m2"]);
    }

    #[test]
    fn test_page_does_not_clobber_live_push() {
        let store = StoreHandle::new();

        // Push arrives while the fetch is in flight.
        store.append_message(msg("m3", 30));

        merge_history_page(&store, "g1", None, vec![msg("m1", 0), msg("m2", 10)]);
        assert_eq!(ids(&store), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_older_page_goes_in_front() {
        let store = StoreHandle::new();
        merge_history_page(&store, "g1", None, vec![msg("m3", 30), msg("m4", 40)]);

        // Scrollback: the cursor page is strictly older than the loaded
        // messages and keeps the order the server sent.
        let cursor = Some(Utc.timestamp_opt(1_700_000_030, 0).unwrap());
        merge_history_page(&store, "g1", cursor, vec![msg("m1", 0), msg("m2", 10)]);
        assert_eq!(ids(&store), vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_refetch_after_reconnect_dedups() {
        let store = StoreHandle::new();
        merge_history_page(&store, "g1", None, vec![msg("m1", 0), msg("m2", 10)]);
        store.append_message(msg("m3", 30));

        // Reconnect re-fetches the newest page, which now overlaps.
        merge_history_page(&store, "g1", None, vec![msg("m2", 10), msg("m3", 30)]);
        assert_eq!(ids(&store), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_refetch_bridges_disconnect_gap() {
        let store = StoreHandle::new();
        merge_history_page(&store, "g1", None, vec![msg("m1", 0)]);

        // m2 and m3 were pushed while the socket was down; m4 arrived
        // once it came back. The newest page carries all of them.
        store.append_message(msg("m4", 30));
        merge_history_page(
            &store,
            "g1",
            None,
            vec![msg("m1", 0), msg("m2", 10), msg("m3", 20), msg("m4", 30)],
        );
        assert_eq!(ids(&store), vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_resolve_group_by_id_or_name() {
        let names: HashMap<String, String> =
            [("g1".to_string(), "General".to_string())].into_iter().collect();
        assert_eq!(resolve_group(&names, "g1").ok().as_deref(), Some("g1"));
        assert_eq!(resolve_group(&names, "General").ok().as_deref(), Some("g1"));
        assert!(resolve_group(&names, "nope").is_err());
    }
}
