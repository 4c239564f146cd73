//! Interactive chat interface
//!
//! A ratatui frontend over the shared store: the sidebar lists groups,
//! the messages pane follows the active group, and the compose box sends
//! over the live connection. Tracing output is captured into a ring
//! buffer and shown in an overlay instead of going to stdout.

mod app;
mod backend;
mod compose;
mod debug_log;
mod help;
mod log_capture;
mod messages;
mod sidebar;
mod ui;

pub use app::run;
pub use log_capture::LogBuffer;
