//! TUI application state and frame loop
//!
//! The loop polls input at a fixed frame rate and never awaits: live
//! traffic lands in the store from the connection task, REST results come
//! through the [`Backend`] channel, and every frame starts by taking a
//! fresh store snapshot to draw from.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::DefaultTerminal;

use crate::api::client::ApiClient;
use crate::config::Config;
use crate::models::{MessageKind, User};
use crate::store::{ChatStore, StoreHandle};
use crate::ws::{self, ConnState, Intent, LiveHandle};

use super::backend::{Backend, BackendCommand, BackendResponse};
use super::compose::ComposeState;
use super::debug_log::LogViewState;
use super::log_capture::LogBuffer;
use super::messages::MessagesState;
use super::sidebar::SidebarState;
use super::ui;

/// Target frame rate for UI updates (~30 fps)
const FRAME_DURATION_MS: u64 = 33;

/// Minimum gap between typing signals while keys keep coming. Below the
/// server-side expiry window, so the indicator stays lit while typing.
const TYPING_SIGNAL_GAP: Duration = Duration::from_secs(2);

/// How long a status bar message stays up.
const STATUS_TTL: Duration = Duration::from_secs(5);

/// Lines per PageUp/PageDown step.
const PAGE_SCROLL: usize = 10;

/// Active pane in the TUI
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Sidebar,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Sidebar => "groups",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Sidebar,
        }
    }

    fn prev(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Compose,
            Pane::Messages => Pane::Sidebar,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// Application state
pub struct App {
    store: StoreHandle,
    live: LiveHandle,
    backend: Backend,
    /// Store copy taken at the top of the current frame.
    pub snapshot: ChatStore,
    pub me: Option<User>,
    /// Display names by user id, fed from every user-bearing response.
    user_names: HashMap<String, String>,
    pub conn_state: ConnState,
    pub should_exit: bool,
    pub active_pane: Pane,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub logs: LogViewState,
    pub show_help: bool,
    pub status_message: Option<String>,
    pub status_is_error: bool,
    status_set_at: Option<Instant>,
    /// Group id with a history page in flight, if any.
    history_loading: Option<String>,
    last_typing_sent: Option<Instant>,
}

impl App {
    fn new(
        store: StoreHandle,
        live: LiveHandle,
        backend: Backend,
        me: Option<User>,
        logs: LogBuffer,
    ) -> Self {
        backend.send(BackendCommand::LoadGroups);
        backend.send(BackendCommand::LoadProfile);
        backend.send(BackendCommand::LoadUsers);
        backend.send(BackendCommand::LoadOnlineUsers);

        let mut user_names = HashMap::new();
        if let Some(user) = &me {
            user_names.insert(user.id.clone(), user.display_name.clone());
            // Presence starts with this user; everything else arrives live.
            store.set_user_online(&user.id, true);
        }

        let snapshot = store.snapshot();
        Self {
            store,
            live,
            backend,
            snapshot,
            me,
            user_names,
            conn_state: ConnState::Disconnected,
            should_exit: false,
            active_pane: Pane::default(),
            sidebar: SidebarState::default(),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            logs: LogViewState::new(logs),
            show_help: false,
            status_message: None,
            status_is_error: false,
            status_set_at: None,
            history_loading: None,
            last_typing_sent: None,
        }
    }

    /// Per-frame upkeep: fresh snapshot, backend results, housekeeping.
    fn tick(&mut self) {
        while let Some(resp) = self.backend.try_recv() {
            self.handle_response(resp);
        }

        self.snapshot = self.store.snapshot();
        self.conn_state = self.live.state();
        self.logs.refresh();
        self.sidebar.clamp(self.snapshot.groups().len());

        if let Some(at) = self.status_set_at {
            if at.elapsed() >= STATUS_TTL {
                self.status_message = None;
                self.status_set_at = None;
            }
        }
    }

    fn handle_response(&mut self, resp: BackendResponse) {
        match resp {
            BackendResponse::Groups(Ok(groups)) => {
                self.sidebar.loading = false;
                let first = groups.first().map(|g| g.id.clone());
                self.store.set_groups(groups);
                // Drop the user into the first group (the global one) when
                // nothing is active yet.
                if self.store.snapshot().active_group().is_none() {
                    if let Some(group_id) = first {
                        self.activate_group(group_id);
                    }
                }
            }
            BackendResponse::Groups(Err(e)) => {
                self.sidebar.loading = false;
                self.report_error("Failed to load groups", &e);
            }
            BackendResponse::History {
                group_id,
                before,
                result,
            } => {
                if self.history_loading.as_deref() == Some(group_id.as_str()) {
                    self.history_loading = None;
                }
                match result {
                    Ok(page) => {
                        if page.is_empty() && before.is_some() {
                            self.set_status("No older messages.", false);
                        }
                        ws::merge_history_page(&self.store, &group_id, before, page);
                    }
                    Err(e) => self.report_error("Failed to load history", &e),
                }
            }
            BackendResponse::Profile(Ok(user)) => {
                self.user_names
                    .insert(user.id.clone(), user.display_name.clone());
                self.store.set_user_online(&user.id, true);
                self.me = Some(user);
            }
            BackendResponse::Profile(Err(e)) => {
                self.report_error("Failed to load profile", &e);
            }
            BackendResponse::Users(Ok(users)) => {
                for user in users {
                    self.user_names.insert(user.id, user.display_name);
                }
            }
            BackendResponse::Users(Err(e)) => {
                tracing::warn!("Failed to load user directory: {:#}", e);
            }
            BackendResponse::OnlineUsers(Ok(users)) => {
                let mut ids = Vec::with_capacity(users.len());
                for user in users {
                    ids.push(user.id.clone());
                    self.user_names.insert(user.id, user.display_name);
                }
                // The server list may predate our own socket registering;
                // this user stays online for the life of the session.
                if let Some(me) = &self.me {
                    if !ids.contains(&me.id) {
                        ids.push(me.id.clone());
                    }
                }
                self.store.set_online_users(ids);
            }
            BackendResponse::OnlineUsers(Err(e)) => {
                tracing::warn!("Failed to load online users: {:#}", e);
            }
        }
    }

    /// Handle input events
    fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(FRAME_DURATION_MS))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // The help popup swallows whatever closes it.
        if self.show_help {
            self.show_help = false;
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => {
                    self.should_exit = true;
                    return;
                }
                KeyCode::Char('l') => {
                    self.logs.toggle();
                    return;
                }
                KeyCode::Char('r') => {
                    self.refresh();
                    return;
                }
                KeyCode::Char('u') if self.active_pane == Pane::Compose => {
                    self.compose.clear();
                    return;
                }
                _ => {}
            }
        }

        if self.logs.visible {
            self.handle_log_key(key);
            return;
        }

        match key.code {
            KeyCode::Tab => self.active_pane = self.active_pane.next(),
            KeyCode::BackTab => self.active_pane = self.active_pane.prev(),
            _ => match self.active_pane {
                Pane::Sidebar => self.handle_sidebar_key(key),
                Pane::Messages => self.handle_messages_key(key),
                Pane::Compose => self.handle_compose_key(key),
            },
        }
    }

    fn handle_log_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.logs.scroll_up(1),
            KeyCode::Down => self.logs.scroll_down(1),
            KeyCode::PageUp => self.logs.scroll_up(PAGE_SCROLL),
            KeyCode::PageDown => self.logs.scroll_down(PAGE_SCROLL),
            KeyCode::Esc => self.logs.toggle(),
            KeyCode::Char('q') => self.should_exit = true,
            _ => {}
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.sidebar.move_up(),
            KeyCode::Down => self.sidebar.move_down(self.snapshot.groups().len()),
            KeyCode::Enter => {
                if let Some(group) = self.snapshot.groups().get(self.sidebar.selected) {
                    let group_id = group.id.clone();
                    self.activate_group(group_id);
                    self.active_pane = Pane::Compose;
                }
            }
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
    }

    fn handle_messages_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up => self.messages.scroll_up(1),
            KeyCode::Down => self.messages.scroll_down(1),
            KeyCode::PageUp => {
                self.messages.scroll_up(PAGE_SCROLL);
                // Already at the oldest loaded line: pull the page before it.
                if self.messages.top_visible() {
                    self.request_older_page();
                }
            }
            KeyCode::PageDown => self.messages.scroll_down(PAGE_SCROLL),
            KeyCode::End => self.messages.jump_to_bottom(),
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Char('?') => self.show_help = true,
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => self.send_current_message(),
            KeyCode::Backspace => {
                self.compose.backspace();
                self.signal_typing();
            }
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            KeyCode::Esc => self.active_pane = Pane::Sidebar,
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.compose.insert_char(c);
                self.signal_typing();
            }
            _ => {}
        }
    }

    /// Make a group the one the messages pane and compose box talk to.
    ///
    /// Always asks for the newest page, even when messages are already
    /// loaded: anything pushed while the socket was down only comes back
    /// through a fetch, and the merge drops what is already there.
    fn activate_group(&mut self, group_id: String) {
        self.live.send(Intent::JoinGroup {
            group_id: group_id.clone(),
        });
        self.request_history(group_id.clone(), None);
        self.store.set_active_group(Some(group_id));
        self.messages.jump_to_bottom();
    }

    fn request_older_page(&mut self) {
        let Some(group_id) = self.snapshot.active_group().map(str::to_string) else {
            return;
        };
        let before = self
            .snapshot
            .messages(&group_id)
            .first()
            .map(|m| m.created_at);
        self.request_history(group_id, before);
    }

    /// Ask the backend for one history page, unless one is already in
    /// flight. Duplicate pages would still merge clean, so this is only
    /// about not hammering the server from a held-down key.
    fn request_history(&mut self, group_id: String, before: Option<DateTime<Utc>>) {
        if self.history_loading.is_some() {
            return;
        }
        self.history_loading = Some(group_id.clone());
        self.backend
            .send(BackendCommand::LoadHistory { group_id, before });
    }

    fn send_current_message(&mut self) {
        let Some(group_id) = self.snapshot.active_group().map(str::to_string) else {
            self.set_status("Pick a group before sending.", true);
            return;
        };
        if self.conn_state != ConnState::Open {
            // Keep the draft; frames sent now would be dropped.
            self.set_status("Not connected; message not sent.", true);
            return;
        }
        let Some(text) = self.compose.send() else {
            return;
        };
        self.live.send(Intent::SendMessage {
            group_id: group_id.clone(),
            content: Some(text),
            kind: MessageKind::Text,
            file_attachment_id: None,
        });
        self.live.send(Intent::Typing {
            group_id,
            is_typing: false,
        });
        self.last_typing_sent = None;
        self.messages.jump_to_bottom();
    }

    /// Tell the group someone is typing, rate-limited per keystroke burst.
    fn signal_typing(&mut self) {
        if self.conn_state != ConnState::Open {
            return;
        }
        let Some(group_id) = self.snapshot.active_group().map(str::to_string) else {
            return;
        };
        let now = Instant::now();
        let due = self
            .last_typing_sent
            .map_or(true, |at| now.duration_since(at) >= TYPING_SIGNAL_GAP);
        if due {
            self.live.send(Intent::Typing {
                group_id,
                is_typing: true,
            });
            self.last_typing_sent = Some(now);
        }
    }

    fn refresh(&mut self) {
        self.backend.send(BackendCommand::LoadGroups);
        self.backend.send(BackendCommand::LoadOnlineUsers);
        if let Some(group_id) = self.snapshot.active_group().map(str::to_string) {
            self.request_history(group_id, None);
        }
        self.set_status("Refreshing...", false);
    }

    fn set_status(&mut self, msg: &str, is_error: bool) {
        self.status_message = Some(msg.to_string());
        self.status_is_error = is_error;
        self.status_set_at = Some(Instant::now());
    }

    fn report_error(&mut self, what: &str, e: &anyhow::Error) {
        tracing::error!("{}: {:#}", what, e);
        self.set_status(&format!("{}: {:#}", what, e), true);
    }

    /// Display name for a user id, if any response has carried it.
    pub fn display_name(&self, user_id: &str) -> String {
        self.user_names
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| "someone".to_string())
    }

    /// Ids of groups where someone other than this user is typing.
    pub fn typing_groups(&self) -> HashSet<String> {
        let me = self.me.as_ref().map(|u| u.id.as_str());
        self.snapshot
            .groups()
            .iter()
            .filter(|g| {
                self.snapshot
                    .typing_users(&g.id)
                    .into_iter()
                    .any(|id| Some(id) != me)
            })
            .map(|g| g.id.clone())
            .collect()
    }

    /// Whether a history page for this group is still in flight.
    pub fn history_in_flight(&self, group_id: Option<&str>) -> bool {
        match (self.history_loading.as_deref(), group_id) {
            (Some(loading), Some(shown)) => loading == shown,
            _ => false,
        }
    }

    async fn shutdown(self) {
        self.live.close().await;
    }
}

/// Run the TUI. `logs` is the ring buffer the tracing layer writes into
/// while the terminal is in raw mode.
pub async fn run(logs: LogBuffer) -> Result<()> {
    // Resolve credentials before touching the terminal so a "not logged
    // in" error prints like any other CLI failure.
    let client = ApiClient::new()?;
    let config = Config::load()?;
    let store = StoreHandle::new();

    let live = ws::open(client.server_addr(), client.token(), store.clone(), None)
        .context("Live connection did not start")?;
    let backend = Backend::start(client);
    let app = App::new(store, live, backend, config.user, logs);

    // ratatui::init installs a panic hook that restores the terminal.
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, app).await;
    ratatui::restore();
    result
}

async fn run_app(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
    while !app.should_exit {
        app.tick();
        terminal.draw(|frame| ui::render(frame, &mut app))?;
        app.handle_events()?;
    }
    app.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;
    use chrono::TimeZone;
    use tokio::sync::mpsc;

    /// App over a channel-only backend and a dead connection handle.
    /// Needs a runtime for the handle's placeholder task.
    fn test_app() -> (App, mpsc::UnboundedReceiver<BackendCommand>) {
        let (backend, cmd_rx, _resp_tx) = Backend::detached();
        let app = App::new(
            StoreHandle::new(),
            LiveHandle::disconnected(),
            backend,
            None,
            LogBuffer::new(8),
        );
        (app, cmd_rx)
    }

    /// History requests posted so far, skipping the other command kinds.
    fn history_requests(
        cmd_rx: &mut mpsc::UnboundedReceiver<BackendCommand>,
    ) -> Vec<(String, Option<DateTime<Utc>>)> {
        let mut out = Vec::new();
        while let Ok(cmd) = cmd_rx.try_recv() {
            if let BackendCommand::LoadHistory { group_id, before } = cmd {
                out.push((group_id, before));
            }
        }
        out
    }

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

    #[test]
    fn test_pane_cycle_round_trips() {
        let mut pane = Pane::Sidebar;
        for _ in 0..3 {
            pane = pane.next();
        }
        assert_eq!(pane, Pane::Sidebar);

        assert_eq!(Pane::Sidebar.prev(), Pane::Compose);
        assert_eq!(Pane::Compose.next(), Pane::Sidebar);
        assert_eq!(Pane::Messages.prev(), Pane::Sidebar);
    }

    #[tokio::test]
    async fn test_reactivation_refetches_newest_page() {
        let (mut app, mut cmd_rx) = test_app();

        app.activate_group("g1".to_string());
        assert_eq!(history_requests(&mut cmd_rx), vec![("g1".to_string(), None)]);

        // The page lands; coming back to the group must still ask again,
        // or messages pushed while the socket was down never show up.
        app.handle_response(BackendResponse::History {
            group_id: "g1".to_string(),
            before: None,
            result: Ok(vec![msg("m1", 0)]),
        });
        app.activate_group("g1".to_string());
        assert_eq!(history_requests(&mut cmd_rx), vec![("g1".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_refresh_refetches_active_group() {
        let (mut app, mut cmd_rx) = test_app();

        app.activate_group("g1".to_string());
        app.handle_response(BackendResponse::History {
            group_id: "g1".to_string(),
            before: None,
            result: Ok(vec![msg("m1", 0)]),
        });
        let _ = history_requests(&mut cmd_rx);

        // Snapshot picks up the active group, then Ctrl-R lands.
        app.tick();
        app.refresh();
        assert_eq!(history_requests(&mut cmd_rx), vec![("g1".to_string(), None)]);
    }
}
