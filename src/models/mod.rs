//! Data models for LAN chat entities

mod group;
mod message;
mod user;

pub use group::*;
pub use message::*;
pub use user::*;
