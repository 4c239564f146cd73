//! User-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account as returned by the auth and users endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar_color: String,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
