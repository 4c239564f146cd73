//! User endpoints: own profile, directory, online set

use anyhow::{Context, Result};

use crate::models::User;

use super::client::ApiClient;

/// Fetch and display the logged-in user's profile.
pub async fn whoami() -> Result<()> {
    let client = ApiClient::new()?;
    let me = whoami_data(&client).await?;

    println!();
    println!("Display Name: {}", me.display_name);
    println!("Username:     {}", me.username);
    println!("ID:           {}", me.id);
    println!("Online:       {}", if me.is_online { "yes" } else { "no" });

    Ok(())
}

/// List registered users with their online state (prints to stdout).
pub async fn list_users() -> Result<()> {
    let client = ApiClient::new()?;
    let users = list_users_data(&client).await?;

    println!("\nUsers:");
    println!("{:-<60}", "");

    if users.is_empty() {
        println!("  (no users found)");
        return Ok(());
    }

    for user in &users {
        let marker = if user.is_online { "*" } else { " " };
        println!("{} {:<24} {}", marker, user.username, user.display_name);
        println!("    ID: {}", user.id);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Data-returning API functions for TUI integration
// ---------------------------------------------------------------------------

/// Fetch the logged-in user's profile.
pub async fn whoami_data(client: &ApiClient) -> Result<User> {
    let resp = client.get("/users/me").await?;
    let me: User = resp
        .json()
        .await
        .context("Failed to parse /users/me response")?;
    Ok(me)
}

/// List all registered users.
pub async fn list_users_data(client: &ApiClient) -> Result<Vec<User>> {
    let resp = client.get("/users/").await?;
    let users: Vec<User> = resp.json().await.context("Failed to parse user list")?;
    Ok(users)
}

/// List the users currently online.
pub async fn online_users_data(client: &ApiClient) -> Result<Vec<User>> {
    let resp = client.get("/users/online").await?;
    let users: Vec<User> = resp
        .json()
        .await
        .context("Failed to parse online user list")?;
    Ok(users)
}
