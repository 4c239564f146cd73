//! Live connection management
//!
//! One spawned task owns the socket for its whole life: dial, receive
//! loop, and the fixed-delay reconnect cycle. The rest of the program
//! talks to it through [`LiveHandle`]: fire-and-forget sends, a watch
//! channel for the connection state, and `close` for teardown. Nothing
//! here retries a frame; whatever is in flight when a session dies is
//! gone, and the next session starts clean.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time;
use url::Url;

use crate::store::StoreHandle;
use crate::ws::dispatch::Dispatcher;
use crate::ws::frame::{Intent, ServerEvent};
use crate::ws::transport::{Socket, Transport, WsTransport};

/// Delay between reconnect attempts. Attempts continue until `close`.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Where the live connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No task running, or torn down.
    Disconnected,
    /// Dial in progress.
    Connecting,
    /// Socket established; frames flow.
    Open,
    /// Last session ended; the reconnect timer is running.
    PendingReconnect,
}

/// Channel for forwarding parsed events to an observer.
pub type EventTap = mpsc::UnboundedSender<ServerEvent>;

type SenderSlot = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

/// Start the live connection.
///
/// Returns `None` without starting anything when the server address or
/// token is missing, or when the address cannot form a URL. Otherwise the
/// connection task runs until [`LiveHandle::close`]; it reconnects through
/// every failure on a fixed delay.
pub fn open(
    server_addr: &str,
    token: &str,
    store: StoreHandle,
    events: Option<EventTap>,
) -> Option<LiveHandle> {
    if server_addr.trim().is_empty() || token.trim().is_empty() {
        tracing::debug!("Live connection not started: no server address or token");
        return None;
    }
    let url = match ws_url(server_addr, token) {
        Some(url) => url,
        None => {
            tracing::warn!("Live connection not started: bad server address {:?}", server_addr);
            return None;
        }
    };
    Some(spawn_session_loop(
        WsTransport,
        url.to_string(),
        store,
        events,
        RECONNECT_DELAY,
    ))
}

/// Build the socket URL. The token rides as a query parameter; the server
/// rejects the upgrade without it.
fn ws_url(server_addr: &str, token: &str) -> Option<Url> {
    let mut url = Url::parse(&format!("ws://{}/ws", server_addr)).ok()?;
    url.query_pairs_mut().append_pair("token", token);
    Some(url)
}

fn spawn_session_loop<T: Transport>(
    transport: T,
    url: String,
    store: StoreHandle,
    events: Option<EventTap>,
    reconnect_delay: Duration,
) -> LiveHandle {
    let outbound: SenderSlot = Arc::new(Mutex::new(None));
    let (state_tx, state_rx) = watch::channel(ConnState::Disconnected);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run_sessions(
        transport,
        url,
        store,
        events,
        reconnect_delay,
        outbound.clone(),
        state_tx,
        shutdown_rx,
    ));
    LiveHandle {
        outbound,
        state_rx,
        shutdown_tx,
        task,
    }
}

/// Handle to the running connection task.
pub struct LiveHandle {
    outbound: SenderSlot,
    state_rx: watch::Receiver<ConnState>,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl LiveHandle {
    /// Submit a user action to the socket.
    ///
    /// Fire and forget: there is no delivery confirmation, and when the
    /// connection is not open the frame is dropped, not queued.
    pub fn send(&self, intent: Intent) {
        let Some(frame) = intent.encode() else {
            tracing::debug!("Rejected outbound action before encoding");
            return;
        };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to encode frame: {}", e);
                return;
            }
        };
        let guard = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(text).is_err() {
                    tracing::debug!("Connection task gone; frame dropped");
                }
            }
            None => tracing::debug!("Not connected; frame dropped"),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnState {
        *self.state_rx.borrow()
    }

    /// Watch the connection state as it changes.
    pub fn state_changes(&self) -> watch::Receiver<ConnState> {
        self.state_rx.clone()
    }

    /// Tear the connection down and stop reconnecting.
    ///
    /// Cancels a pending reconnect timer if one is running. This is the
    /// only way the task stops on purpose; dropping the handle has the
    /// same effect but without waiting for the task to finish.
    pub async fn close(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
impl LiveHandle {
    /// Handle with no session behind it: sends drop, state stays
    /// `Disconnected`. Needs a runtime for the placeholder task.
    pub(crate) fn disconnected() -> Self {
        let (_state_tx, state_rx) = watch::channel(ConnState::Disconnected);
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            outbound: Arc::new(Mutex::new(None)),
            state_rx,
            shutdown_tx,
            task: tokio::spawn(async {}),
        }
    }
}

/// Why one socket session ended.
enum SessionEnd {
    /// `close` was called. Do not reconnect.
    Shutdown,
    /// Dial failure, socket error, or server close. Reconnect.
    Lost,
}

async fn run_sessions<T: Transport>(
    transport: T,
    url: String,
    store: StoreHandle,
    events: Option<EventTap>,
    reconnect_delay: Duration,
    outbound: SenderSlot,
    state_tx: watch::Sender<ConnState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let dispatcher = Dispatcher::new(store);
    loop {
        let _ = state_tx.send(ConnState::Connecting);
        let end = run_one_session(
            &transport,
            &url,
            &dispatcher,
            events.as_ref(),
            &outbound,
            &state_tx,
            &mut shutdown_rx,
        )
        .await;
        match end {
            SessionEnd::Shutdown => break,
            SessionEnd::Lost => {
                let _ = state_tx.send(ConnState::PendingReconnect);
                tracing::info!("Reconnecting in {}ms", reconnect_delay.as_millis());
                tokio::select! {
                    _ = time::sleep(reconnect_delay) => {}
                    _ = shutdown_signal(&mut shutdown_rx) => break,
                }
            }
        }
    }
    let _ = state_tx.send(ConnState::Disconnected);
    tracing::debug!("Live connection task stopped");
}

/// Dial once and pump frames until the session dies or `close` is called.
async fn run_one_session<T: Transport>(
    transport: &T,
    url: &str,
    dispatcher: &Dispatcher,
    events: Option<&EventTap>,
    outbound: &SenderSlot,
    state_tx: &watch::Sender<ConnState>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let mut socket = tokio::select! {
        res = transport.connect(url) => match res {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!("WebSocket connect failed: {}", e);
                return SessionEnd::Lost;
            }
        },
        _ = shutdown_signal(shutdown_rx) => return SessionEnd::Shutdown,
    };

    tracing::info!("Live connection open");
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    *outbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
    let _ = state_tx.send(ConnState::Open);

    let end = loop {
        tokio::select! {
            inbound = socket.recv() => match inbound {
                Ok(Some(text)) => {
                    if let Some(event) = dispatcher.dispatch(&text) {
                        if let Some(tap) = events {
                            let _ = tap.send(event);
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("Server closed the connection");
                    break SessionEnd::Lost;
                }
                Err(e) => {
                    tracing::warn!("WebSocket receive failed: {}", e);
                    break SessionEnd::Lost;
                }
            },
            frame = rx.recv() => match frame {
                Some(text) => {
                    if let Err(e) = socket.send(text).await {
                        tracing::warn!("WebSocket send failed: {}", e);
                        break SessionEnd::Lost;
                    }
                }
                // The slot above holds a sender until the session ends.
                None => break SessionEnd::Lost,
            },
            _ = shutdown_signal(shutdown_rx) => break SessionEnd::Shutdown,
        }
    };

    // Sends outside an open session are dropped, never queued.
    *outbound.lock().unwrap_or_else(|e| e.into_inner()) = None;
    end
}

/// Resolves when `close` is called or every handle is gone.
async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
