//! Local chat state
//!
//! One owned container holds everything the client knows: the group list,
//! per-group message sequences, the online-user set and the per-group
//! typing sets. All mutation goes through the enumerated ops below so each
//! transition is a single atomic step; rendering and command code read
//! point-in-time snapshots instead of holding the lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::models::{Group, Message};

/// Client-side chat state.
///
/// Message sequences are keyed by group id and kept in chronological order:
/// history pages land at the front, live pushes at the back, and existing
/// entries never reorder. Duplicate message ids are dropped on insert.
#[derive(Debug, Clone, Default)]
pub struct ChatStore {
    groups: Vec<Group>,
    active_group: Option<String>,
    messages: HashMap<String, Vec<Message>>,
    online_users: BTreeSet<String>,
    typing_users: HashMap<String, BTreeSet<String>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the group list.
    pub fn set_groups(&mut self, groups: Vec<Group>) {
        self.groups = groups;
    }

    /// Append one group to the list.
    pub fn add_group(&mut self, group: Group) {
        self.groups.push(group);
    }

    /// Set or clear the focused group.
    pub fn set_active_group(&mut self, group_id: Option<String>) {
        self.active_group = group_id;
    }

    /// Append a message to its group's sequence.
    ///
    /// Creates the sequence if the group has none yet. A message whose id
    /// is already present is dropped; returns whether it was stored.
    pub fn append_message(&mut self, message: Message) -> bool {
        let seq = self.messages.entry(message.group_id.clone()).or_default();
        if seq.iter().any(|m| m.id == message.id) {
            return false;
        }
        seq.push(message);
        true
    }

    /// Replace a group's message sequence wholesale.
    pub fn set_messages(&mut self, group_id: &str, messages: Vec<Message>) {
        self.messages.insert(group_id.to_string(), messages);
    }

    /// Insert an older history page at the front of a group's sequence.
    ///
    /// Pages can overlap what is already loaded; messages whose ids are
    /// present are skipped so the existing tail never duplicates or moves.
    pub fn prepend_messages(&mut self, group_id: &str, older: Vec<Message>) {
        let seq = self.messages.entry(group_id.to_string()).or_default();
        let mut merged: Vec<Message> = older
            .into_iter()
            .filter(|m| !seq.iter().any(|e| e.id == m.id))
            .collect();
        merged.append(seq);
        *seq = merged;
    }

    /// Fold a history page into a group's sequence by timestamp.
    ///
    /// For pages that can straddle what is already loaded, e.g. a re-fetch
    /// after pushes resumed past a disconnect gap. Messages whose ids are
    /// present are skipped; the rest slot in where their `created_at`
    /// falls, after any stored message with the same timestamp. Stored
    /// messages never move relative to each other.
    pub fn merge_messages(&mut self, group_id: &str, batch: Vec<Message>) {
        let seq = self.messages.entry(group_id.to_string()).or_default();
        for message in batch {
            if seq.iter().any(|m| m.id == message.id) {
                continue;
            }
            let at = seq
                .iter()
                .position(|m| m.created_at > message.created_at)
                .unwrap_or(seq.len());
            seq.insert(at, message);
        }
    }

    /// Mark one user online or offline.
    pub fn set_user_online(&mut self, user_id: &str, online: bool) {
        if online {
            self.online_users.insert(user_id.to_string());
        } else {
            self.online_users.remove(user_id);
        }
    }

    /// Replace the whole online set.
    pub fn set_online_users(&mut self, user_ids: Vec<String>) {
        self.online_users = user_ids.into_iter().collect();
    }

    /// Add or remove a user from a group's typing set.
    ///
    /// Clearing an absent entry is a no-op, which lets expiry timers fire
    /// unconditionally.
    pub fn set_user_typing(&mut self, group_id: &str, user_id: &str, typing: bool) {
        if typing {
            self.typing_users
                .entry(group_id.to_string())
                .or_default()
                .insert(user_id.to_string());
        } else if let Some(set) = self.typing_users.get_mut(group_id) {
            set.remove(user_id);
            if set.is_empty() {
                self.typing_users.remove(group_id);
            }
        }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    pub fn active_group(&self) -> Option<&str> {
        self.active_group.as_deref()
    }

    /// Messages for a group, oldest first. Empty if none are loaded.
    pub fn messages(&self, group_id: &str) -> &[Message] {
        self.messages.get(group_id).map_or(&[], Vec::as_slice)
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online_users.contains(user_id)
    }

    pub fn online_users(&self) -> &BTreeSet<String> {
        &self.online_users
    }

    /// Users currently typing in a group, sorted by id.
    pub fn typing_users(&self, group_id: &str) -> Vec<&str> {
        self.typing_users
            .get(group_id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Shared handle to the chat store.
///
/// The live connection task, REST glue, and the UI all hold clones. Each op
/// takes the lock for one mutation; readers clone a snapshot so nothing
/// holds the lock across await points or rendering. If the mutex is
/// poisoned we recover the inner data and continue - chat state is still
/// valid after a panicked reader.
#[derive(Clone, Default)]
pub struct StoreHandle {
    inner: Arc<Mutex<ChatStore>>,
}

impl StoreHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChatStore> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Point-in-time copy of the whole store.
    pub fn snapshot(&self) -> ChatStore {
        self.lock().clone()
    }

    pub fn set_groups(&self, groups: Vec<Group>) {
        self.lock().set_groups(groups);
    }

    pub fn add_group(&self, group: Group) {
        self.lock().add_group(group);
    }

    pub fn set_active_group(&self, group_id: Option<String>) {
        self.lock().set_active_group(group_id);
    }

    pub fn append_message(&self, message: Message) -> bool {
        self.lock().append_message(message)
    }

    pub fn set_messages(&self, group_id: &str, messages: Vec<Message>) {
        self.lock().set_messages(group_id, messages);
    }

    pub fn prepend_messages(&self, group_id: &str, older: Vec<Message>) {
        self.lock().prepend_messages(group_id, older);
    }

    pub fn merge_messages(&self, group_id: &str, batch: Vec<Message>) {
        self.lock().merge_messages(group_id, batch);
    }

    pub fn set_user_online(&self, user_id: &str, online: bool) {
        self.lock().set_user_online(user_id, online);
    }

    pub fn set_online_users(&self, user_ids: Vec<String>) {
        self.lock().set_online_users(user_ids);
    }

    pub fn set_user_typing(&self, group_id: &str, user_id: &str, typing: bool) {
        self.lock().set_user_typing(group_id, user_id, typing);
    }

    /// True when a group has no messages loaded yet.
    pub fn has_no_messages(&self, group_id: &str) -> bool {
        self.lock().messages(group_id).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKind;
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, group_id: &str, content: &str, secs: i64) -> Message {
        Message {
            id: id.to_string(),
            group_id: group_id.to_string(),
            sender_id: Some("u1".to_string()),
            sender: None,
            content: Some(content.to_string()),
            message_type: MessageKind::Text,
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            file_attachment: None,
        }
    }

    fn ids(store: &ChatStore, group_id: &str) -> Vec<String> {
        store
            .messages(group_id)
            .iter()
            .map(|m| m.id.clone())
            .collect()
    }

    #[test]
    fn test_append_creates_sequence() {
        let mut store = ChatStore::new();
        assert!(store.messages("g1").is_empty());

        assert!(store.append_message(msg("m1", "g1", "hello", 0)));
        assert_eq!(ids(&store, "g1"), vec!["m1"]);
    }

    #[test]
    fn test_append_drops_duplicate_id() {
        let mut store = ChatStore::new();
        assert!(store.append_message(msg("m1", "g1", "hello", 0)));
        assert!(!store.append_message(msg("m1", "g1", "hello again", 1)));

        assert_eq!(store.messages("g1").len(), 1);
        assert_eq!(store.messages("g1")[0].content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_append_keeps_groups_separate() {
        let mut store = ChatStore::new();
        store.append_message(msg("m1", "g1", "one", 0));
        store.append_message(msg("m2", "g2", "two", 1));

        assert_eq!(ids(&store, "g1"), vec!["m1"]);
        assert_eq!(ids(&store, "g2"), vec!["m2"]);
    }

    #[test]
    fn test_prepend_older_page() {
        let mut store = ChatStore::new();
        store.set_messages("g1", vec![msg("m1", "g1", "first loaded", 10)]);
        store.append_message(msg("m2", "g1", "live", 20));

        store.prepend_messages("g1", vec![msg("m0", "g1", "older", 0)]);
        assert_eq!(ids(&store, "g1"), vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn test_prepend_skips_already_loaded() {
        let mut store = ChatStore::new();
        store.set_messages(
            "g1",
            vec![msg("m1", "g1", "a", 10), msg("m2", "g1", "b", 20)],
        );

        // Overlapping page: m0 is new, m1 is already present.
        store.prepend_messages(
            "g1",
            vec![msg("m0", "g1", "older", 0), msg("m1", "g1", "a", 10)],
        );
        assert_eq!(ids(&store, "g1"), vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn test_prepend_into_empty_group() {
        let mut store = ChatStore::new();
        store.prepend_messages("g1", vec![msg("m1", "g1", "a", 0)]);
        assert_eq!(ids(&store, "g1"), vec!["m1"]);
    }

    #[test]
    fn test_live_push_then_history_page() {
        // A message pushed while history is still loading must survive the
        // page insert, in order.
        let mut store = ChatStore::new();
        store.append_message(msg("m1", "g1", "existing", 10));
        store.append_message(msg("m2", "g1", "live push", 20));
        store.prepend_messages("g1", vec![msg("m0", "g1", "from history", 0)]);

        assert_eq!(ids(&store, "g1"), vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn test_merge_fills_gap_in_order() {
        // Pushes resumed after a disconnect gap: m2 and m3 were missed,
        // m4 arrived live. The re-fetched page straddles all of it.
        let mut store = ChatStore::new();
        store.set_messages("g1", vec![msg("m1", "g1", "before gap", 0)]);
        store.append_message(msg("m4", "g1", "after gap", 30));

        store.merge_messages(
            "g1",
            vec![
                msg("m1", "g1", "before gap", 0),
                msg("m2", "g1", "missed", 10),
                msg("m3", "g1", "missed too", 20),
                msg("m4", "g1", "after gap", 30),
            ],
        );
        assert_eq!(ids(&store, "g1"), vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_merge_appends_newer_messages() {
        let mut store = ChatStore::new();
        store.set_messages("g1", vec![msg("m1", "g1", "old", 0)]);

        store.merge_messages(
            "g1",
            vec![msg("m2", "g1", "newer", 10), msg("m3", "g1", "newest", 20)],
        );
        assert_eq!(ids(&store, "g1"), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn test_merge_keeps_equal_timestamps_stable() {
        let mut store = ChatStore::new();
        store.set_messages("g1", vec![msg("m1", "g1", "stored", 10)]);

        // Same second as m1: lands after it, never in front.
        store.merge_messages("g1", vec![msg("m2", "g1", "same instant", 10)]);
        assert_eq!(ids(&store, "g1"), vec!["m1", "m2"]);
    }

    #[test]
    fn test_set_messages_replaces() {
        let mut store = ChatStore::new();
        store.append_message(msg("m1", "g1", "old", 0));
        store.set_messages("g1", vec![msg("m9", "g1", "fresh", 5)]);

        assert_eq!(ids(&store, "g1"), vec!["m9"]);
    }

    #[test]
    fn test_presence_add_remove() {
        let mut store = ChatStore::new();
        store.set_user_online("u1", true);
        store.set_user_online("u2", true);
        assert!(store.is_online("u1"));
        assert!(store.is_online("u2"));

        store.set_user_online("u1", false);
        assert!(!store.is_online("u1"));
        assert!(store.is_online("u2"));

        // Removing an unknown user changes nothing.
        store.set_user_online("u9", false);
        assert_eq!(store.online_users().len(), 1);
    }

    #[test]
    fn test_set_online_users_replaces() {
        let mut store = ChatStore::new();
        store.set_user_online("u1", true);
        store.set_online_users(vec!["u2".to_string(), "u3".to_string()]);

        assert!(!store.is_online("u1"));
        assert!(store.is_online("u2"));
        assert!(store.is_online("u3"));
    }

    #[test]
    fn test_typing_set_and_clear() {
        let mut store = ChatStore::new();
        store.set_user_typing("g1", "u1", true);
        store.set_user_typing("g1", "u2", true);
        assert_eq!(store.typing_users("g1"), vec!["u1", "u2"]);

        store.set_user_typing("g1", "u1", false);
        assert_eq!(store.typing_users("g1"), vec!["u2"]);
    }

    #[test]
    fn test_typing_clear_is_idempotent() {
        let mut store = ChatStore::new();
        store.set_user_typing("g1", "u1", true);

        store.set_user_typing("g1", "u1", false);
        store.set_user_typing("g1", "u1", false);
        store.set_user_typing("g2", "u1", false);

        assert!(store.typing_users("g1").is_empty());
        assert!(store.typing_users("g2").is_empty());
    }

    #[test]
    fn test_typing_tracked_per_group() {
        let mut store = ChatStore::new();
        store.set_user_typing("g1", "u1", true);
        store.set_user_typing("g2", "u1", true);

        store.set_user_typing("g1", "u1", false);
        assert!(store.typing_users("g1").is_empty());
        assert_eq!(store.typing_users("g2"), vec!["u1"]);
    }

    #[test]
    fn test_active_group() {
        let mut store = ChatStore::new();
        assert_eq!(store.active_group(), None);

        store.set_active_group(Some("g1".to_string()));
        assert_eq!(store.active_group(), Some("g1"));

        store.set_active_group(None);
        assert_eq!(store.active_group(), None);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let handle = StoreHandle::new();
        handle.append_message(msg("m1", "g1", "a", 0));

        let snap = handle.snapshot();
        handle.append_message(msg("m2", "g1", "b", 1));

        assert_eq!(snap.messages("g1").len(), 1);
        assert_eq!(handle.snapshot().messages("g1").len(), 2);
    }

    #[test]
    fn test_handle_shares_state() {
        let handle = StoreHandle::new();
        let other = handle.clone();

        other.set_user_online("u1", true);
        assert!(handle.snapshot().is_online("u1"));
    }
}
