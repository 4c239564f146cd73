//! Authentication endpoints: register, login, change password
//!
//! Login and register run on a bare client because no session exists yet;
//! on success the returned token and user profile are saved to config.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::config::Config;
use crate::models::User;

use super::client::ApiClient;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    user: User,
}

/// Log in with username and password, then persist the session.
pub async fn login(server_addr: &str, username: &str, password: &str) -> Result<()> {
    let url = format!("http://{}/api/auth/login", server_addr);
    tracing::debug!("POST {}", url);

    // The login endpoint takes form-urlencoded credentials, not JSON.
    let resp = reqwest::Client::new()
        .post(&url)
        .form(&[("username", username), ("password", password)])
        .send()
        .await
        .with_context(|| format!("POST {} failed", url))?;

    let auth = parse_auth_response(resp, "Login").await?;
    save_session(server_addr, auth)
}

/// Create an account, then persist the session it returns.
pub async fn register(
    server_addr: &str,
    username: &str,
    display_name: &str,
    password: &str,
) -> Result<()> {
    let url = format!("http://{}/api/auth/register", server_addr);
    tracing::debug!("POST {}", url);

    let body = serde_json::json!({
        "username": username,
        "password": password,
        "display_name": display_name,
    });
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&body)
        .send()
        .await
        .with_context(|| format!("POST {} failed", url))?;

    let auth = parse_auth_response(resp, "Registration").await?;
    save_session(server_addr, auth)
}

/// Change the logged-in user's password.
pub async fn change_password(current: &str, new: &str) -> Result<()> {
    let client = ApiClient::new()?;
    let body = serde_json::json!({
        "current_password": current,
        "new_password": new,
    });
    client.post("/auth/change-password", &body).await?;
    println!("Password changed.");
    Ok(())
}

/// Clear the saved session, keeping the server address.
pub async fn logout() -> Result<()> {
    let mut config = Config::load()?;
    config.clear_session();
    config.save()?;
    println!("Logged out.");
    Ok(())
}

/// Display the saved session state.
pub async fn status() -> Result<()> {
    let config = Config::load()?;

    match config.server_addr() {
        Some(addr) => println!("Server:  {}", addr),
        None => println!("Server:  (not set)"),
    }

    match &config.access_token {
        Some(token) if !token.is_expired() => {
            println!("Session: valid");
            let exp = token.expires_at.and_then(|e| chrono::DateTime::from_timestamp(e as i64, 0));
            if let Some(exp) = exp {
                let local = exp.with_timezone(&chrono::Local);
                println!("  expires: {}", local.format("%Y-%m-%d %H:%M"));
            }
        }
        Some(_) => println!("Session: expired"),
        None => println!("Session: none"),
    }

    match &config.user {
        Some(user) => println!("User:    {} ({})", user.display_name, user.username),
        None => println!("User:    (none)"),
    }

    Ok(())
}

async fn parse_auth_response(resp: reqwest::Response, action: &str) -> Result<AuthResponse> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("{} failed: HTTP {}: {}", action, status.as_u16(), body);
    }
    resp.json()
        .await
        .with_context(|| format!("Failed to parse {} response", action.to_lowercase()))
}

fn save_session(server_addr: &str, auth: AuthResponse) -> Result<()> {
    let username = auth.user.username.clone();
    let display_name = auth.user.display_name.clone();

    let mut config = Config::load()?;
    config.set_session(server_addr.to_string(), auth.access_token, auth.user);
    config.save()?;

    println!("Logged in as {} ({}) on {}", display_name, username, server_addr);
    Ok(())
}
