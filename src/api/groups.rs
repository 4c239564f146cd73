//! Group endpoints: list, detail, create, membership

use anyhow::{Context, Result};

use crate::models::Group;

use super::client::ApiClient;

/// List the groups the logged-in user belongs to (prints to stdout).
pub async fn list_groups() -> Result<()> {
    let client = ApiClient::new()?;
    let groups = list_groups_data(&client).await?;

    println!("\nGroups:");
    println!("{:-<60}", "");

    if groups.is_empty() {
        println!("  (no groups found)");
        return Ok(());
    }

    for group in &groups {
        let tag = if group.is_global { " [global]" } else { "" };
        println!("{}{}", group.name, tag);
        println!("  ID: {}", group.id);
        if let Some(ref desc) = group.description {
            println!("  {}", desc);
        }
        println!();
    }

    Ok(())
}

/// Show one group with its member list (prints to stdout).
pub async fn show_group(group_id: &str) -> Result<()> {
    let client = ApiClient::new()?;
    let group = group_detail_data(&client, group_id).await?;

    println!();
    println!("{}{}", group.name, if group.is_global { " [global]" } else { "" });
    if let Some(ref desc) = group.description {
        println!("{}", desc);
    }
    println!("ID: {}", group.id);
    println!("Members ({}):", group.members.len());
    for member in &group.members {
        let marker = if member.is_online { "*" } else { " " };
        println!("{} {} ({})", marker, member.display_name, member.username);
    }

    Ok(())
}

/// Create a group and print its id.
pub async fn create_group(
    name: &str,
    description: Option<String>,
    member_ids: &[String],
) -> Result<()> {
    let client = ApiClient::new()?;
    let group = create_group_data(&client, name, description, member_ids).await?;
    println!("Created group '{}' ({})", group.name, group.id);
    Ok(())
}

/// Add users to an existing group.
pub async fn add_members(group_id: &str, user_ids: &[String]) -> Result<()> {
    let client = ApiClient::new()?;
    let body = serde_json::json!({ "user_ids": user_ids });
    client
        .post(&format!("/groups/{}/members", group_id), &body)
        .await?;
    println!("Members added.");
    Ok(())
}

/// Delete a group. The server rejects this for the global group and for
/// anyone but the creator.
pub async fn delete_group(group_id: &str) -> Result<()> {
    let client = ApiClient::new()?;
    client.delete(&format!("/groups/{}", group_id)).await?;
    println!("Group deleted.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Data-returning API functions for TUI integration
// ---------------------------------------------------------------------------

/// List joined groups. The server orders them global-first, then by name.
pub async fn list_groups_data(client: &ApiClient) -> Result<Vec<Group>> {
    let resp = client.get("/groups/").await?;
    let groups: Vec<Group> = resp.json().await.context("Failed to parse group list")?;
    Ok(groups)
}

/// Fetch one group with its embedded member list.
pub async fn group_detail_data(client: &ApiClient, group_id: &str) -> Result<Group> {
    let resp = client.get(&format!("/groups/{}", group_id)).await?;
    let group: Group = resp.json().await.context("Failed to parse group detail")?;
    Ok(group)
}

/// Create a group with the given members; the server adds the creator.
pub async fn create_group_data(
    client: &ApiClient,
    name: &str,
    description: Option<String>,
    member_ids: &[String],
) -> Result<Group> {
    let body = serde_json::json!({
        "name": name,
        "description": description,
        "member_ids": member_ids,
    });
    let resp = client.post("/groups/", &body).await?;
    let group: Group = resp.json().await.context("Failed to parse created group")?;
    Ok(group)
}
