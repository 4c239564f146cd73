//! REST client module for the LAN chat server

mod auth;
pub mod client;
mod files;
mod groups;
mod messages;
mod users;

pub use auth::{change_password, login, logout, register, status};
pub use files::upload_file_data;
pub use groups::{
    add_members, create_group, delete_group, list_groups, list_groups_data, show_group,
};
pub use messages::{fetch_history, read_messages, PAGE_SIZE};
pub use users::{list_users, list_users_data, online_users_data, whoami, whoami_data};
