//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::User;

/// Stored access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub expires_at: Option<u64>,
}

impl StoredToken {
    /// Wrap a fresh token. The login response carries no expiry field, so
    /// the expiry is read from the JWT's own `exp` claim.
    pub fn new(token: String) -> Self {
        let expires_at = token_expiry(&token);
        Self { token, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => {
                let now = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap()
                    .as_secs();
                // Consider expired if less than 5 minutes remaining
                now + 300 >= exp
            }
            None => false,
        }
    }
}

/// Extract the `exp` claim (unix seconds) from a JWT payload.
fn token_expiry(token: &str) -> Option<u64> {
    use base64::Engine;

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() < 2 {
        return None;
    }
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .ok()?;
    let json: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    json.get("exp").and_then(|v| v.as_u64())
}

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat server address as host:port, e.g. "192.168.1.50:8000"
    pub server_addr: Option<String>,
    /// Access token from the last login
    pub access_token: Option<StoredToken>,
    /// Account the token belongs to
    pub user: Option<User>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "lanchat-cli", "lanchat-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the token)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn server_addr(&self) -> Option<&str> {
        self.server_addr.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.access_token.as_ref().map(|t| t.token.as_str())
    }

    /// Server address, or an error telling the user to log in.
    pub fn require_server(&self) -> Result<&str> {
        self.server_addr()
            .context("No server configured. Run `lanchat-cli login --server <host:port>` first.")
    }

    /// Access token, or an error telling the user to log in.
    pub fn require_token(&self) -> Result<&str> {
        let token = self
            .access_token
            .as_ref()
            .context("Not logged in. Run `lanchat-cli login` first.")?;
        anyhow::ensure!(
            !token.is_expired(),
            "Session expired. Run `lanchat-cli login` again."
        );
        Ok(&token.token)
    }

    /// Store a fresh login.
    pub fn set_session(&mut self, server_addr: String, token: String, user: User) {
        self.server_addr = Some(server_addr);
        self.access_token = Some(StoredToken::new(token));
        self.user = Some(user);
    }

    /// Forget the token and cached account; keeps the server address.
    pub fn clear_session(&mut self) {
        self.access_token = None;
        self.user = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use chrono::{TimeZone, Utc};

    fn fake_jwt(payload: &str) -> String {
        let body = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload);
        format!("eyJhbGciOiJIUzI1NiJ9.{}.sig", body)
    }

    #[test]
    fn test_token_expiry_reads_exp_claim() {
        let token = fake_jwt(r#"{"sub":"u1","exp":1700000000}"#);
        assert_eq!(token_expiry(&token), Some(1_700_000_000));
    }

    #[test]
    fn test_token_expiry_rejects_malformed_token() {
        assert_eq!(token_expiry("not-a-jwt"), None);
        assert_eq!(token_expiry(""), None);
        let token = fake_jwt("plain text, not json");
        assert_eq!(token_expiry(&token), None);
    }

    #[test]
    fn test_is_expired_applies_five_minute_margin() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();

        let soon = StoredToken {
            token: "t".into(),
            expires_at: Some(now + 60),
        };
        assert!(soon.is_expired());

        let later = StoredToken {
            token: "t".into(),
            expires_at: Some(now + 3600),
        };
        assert!(!later.is_expired());

        let never = StoredToken {
            token: "t".into(),
            expires_at: None,
        };
        assert!(!never.is_expired());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let token = fake_jwt(r#"{"sub":"u1","exp":1700000000}"#);
        let mut config = Config::default();
        config.set_session(
            "192.168.1.50:8000".to_string(),
            token.clone(),
            User {
                id: "u1".to_string(),
                username: "erik".to_string(),
                display_name: "Erik".to_string(),
                avatar_color: "#3B82F6".to_string(),
                is_online: true,
                last_seen: None,
                created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            },
        );

        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();

        assert_eq!(back.server_addr.as_deref(), Some("192.168.1.50:8000"));
        let stored = back.access_token.unwrap();
        assert_eq!(stored.token, token);
        assert_eq!(stored.expires_at, Some(1_700_000_000));
        let user = back.user.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.username, "erik");
        assert_eq!(user.display_name, "Erik");
        assert_eq!(user.avatar_color, "#3B82F6");
        assert!(user.is_online);
        assert_eq!(user.last_seen, None);
        assert_eq!(
            user.created_at,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap()
        );
    }

    #[test]
    fn test_empty_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();

        assert!(back.server_addr.is_none());
        assert!(back.access_token.is_none());
        assert!(back.user.is_none());
    }
}
