//! Async backend for the TUI event loop
//!
//! The frame loop never awaits; it posts `BackendCommand` values here and
//! picks up `BackendResponse` values on later frames. Each command runs in
//! its own task over a shared [`ApiClient`], so a slow history fetch does
//! not hold up a groups refresh.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::api;
use crate::api::client::ApiClient;
use crate::models::{Group, Message, User};

/// Commands sent from the frame loop to the backend.
pub enum BackendCommand {
    LoadGroups,
    LoadHistory {
        group_id: String,
        before: Option<DateTime<Utc>>,
    },
    LoadProfile,
    LoadUsers,
    LoadOnlineUsers,
}

/// Results headed back to the frame loop.
pub enum BackendResponse {
    Groups(Result<Vec<Group>>),
    History {
        group_id: String,
        before: Option<DateTime<Utc>>,
        result: Result<Vec<Message>>,
    },
    Profile(Result<User>),
    Users(Result<Vec<User>>),
    OnlineUsers(Result<Vec<User>>),
}

/// Handle for the frame loop side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Start the command loop over an already-authenticated client.
    pub fn start(client: ApiClient) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(Arc::new(client), cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Post a command without blocking.
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Backend channel closed -- command dropped");
        }
    }

    /// Pull one finished response if any is waiting. The frame loop calls
    /// this until empty on every tick.
    pub fn try_recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.try_recv().ok()
    }
}

#[cfg(test)]
impl Backend {
    /// Channel-only backend with no command loop behind it. Tests read
    /// commands off the returned receiver and feed responses through the
    /// returned sender.
    pub(crate) fn detached() -> (
        Self,
        mpsc::UnboundedReceiver<BackendCommand>,
        mpsc::UnboundedSender<BackendResponse>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();
        (Self { cmd_tx, resp_rx }, cmd_rx, resp_tx)
    }
}

async fn backend_loop(
    client: Arc<ApiClient>,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        let client = Arc::clone(&client);
        let resp_tx = resp_tx.clone();

        tokio::spawn(async move {
            match cmd {
                BackendCommand::LoadGroups => {
                    let result = api::list_groups_data(&client).await;
                    let _ = resp_tx.send(BackendResponse::Groups(result));
                }
                BackendCommand::LoadHistory { group_id, before } => {
                    let result =
                        api::fetch_history(&client, &group_id, before, api::PAGE_SIZE).await;
                    let _ = resp_tx.send(BackendResponse::History {
                        group_id,
                        before,
                        result,
                    });
                }
                BackendCommand::LoadProfile => {
                    let result = api::whoami_data(&client).await;
                    let _ = resp_tx.send(BackendResponse::Profile(result));
                }
                BackendCommand::LoadUsers => {
                    let result = api::list_users_data(&client).await;
                    let _ = resp_tx.send(BackendResponse::Users(result));
                }
                BackendCommand::LoadOnlineUsers => {
                    let result = api::online_users_data(&client).await;
                    let _ = resp_tx.send(BackendResponse::OnlineUsers(result));
                }
            }
        });
    }
}
