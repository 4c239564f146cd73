//! Message history endpoint (cursor-paged)

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::Message;

use super::client::ApiClient;
use super::files::file_download_url;

/// Default page size for history reads.
pub const PAGE_SIZE: usize = 50;

/// Read messages from a group (prints to stdout, oldest first).
pub async fn read_messages(
    group_id: &str,
    limit: usize,
    before: Option<DateTime<Utc>>,
) -> Result<()> {
    let client = ApiClient::new()?;
    let msgs = fetch_history(&client, group_id, before, limit).await?;

    if msgs.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    for msg in &msgs {
        let sender = msg
            .sender
            .as_ref()
            .map(|s| s.display_name.as_str())
            .unwrap_or("(system)");
        let time = msg.created_at.format("%Y-%m-%d %H:%M");
        match (&msg.content, &msg.file_attachment) {
            (Some(text), Some(att)) => {
                let url = file_download_url(client.server_addr(), client.token(), &att.id);
                println!(
                    "[{}] {}: {} [file: {}] {}",
                    time, sender, text, att.original_filename, url
                );
            }
            (None, Some(att)) => {
                let url = file_download_url(client.server_addr(), client.token(), &att.id);
                println!("[{}] {}: [file: {}] {}", time, sender, att.original_filename, url);
            }
            (Some(text), None) => println!("[{}] {}: {}", time, sender, text),
            (None, None) => {}
        }
    }

    Ok(())
}

/// Fetch one page of messages strictly older than `before` (the newest page
/// when `before` is None). The server returns each page oldest-first, so a
/// page can be prepended to a stored sequence as-is.
pub async fn fetch_history(
    client: &ApiClient,
    group_id: &str,
    before: Option<DateTime<Utc>>,
    limit: usize,
) -> Result<Vec<Message>> {
    let mut path = format!("/messages/{}?limit={}", group_id, limit);
    if let Some(cursor) = before {
        path.push_str(&format!("&before={}", cursor_param(cursor)));
    }

    let resp = client.get(&path).await?;
    let msgs: Vec<Message> = resp
        .json()
        .await
        .context("Failed to parse message history")?;
    Ok(msgs)
}

// Z-suffix form: a "+00:00" offset would decode as a space inside a query
// string and fail server-side datetime validation.
fn cursor_param(cursor: DateTime<Utc>) -> String {
    cursor.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cursor_param_is_query_safe() {
        let t = Utc.with_ymd_and_hms(2024, 5, 17, 9, 30, 45).unwrap();
        let s = cursor_param(t);
        assert_eq!(s, "2024-05-17T09:30:45.000000Z");
        assert!(!s.contains('+'));
    }

    #[test]
    fn test_cursor_param_keeps_subsecond_precision() {
        let t = Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap();
        let s = cursor_param(t);
        assert!(s.ends_with("123456Z"), "cursor was {}", s);
    }
}
