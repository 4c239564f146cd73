//! File attachment endpoints: upload and download URLs

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

use crate::models::FileAttachment;

use super::client::ApiClient;

/// Upload a file and return the stored attachment record.
pub async fn upload_file_data(client: &ApiClient, path: &Path) -> Result<FileAttachment> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let mime = guess_mime(path);
    tracing::debug!("Uploading {} ({} bytes, {})", filename, bytes.len(), mime);

    let part = reqwest::multipart::Part::bytes(bytes)
        .file_name(filename)
        .mime_str(mime)
        .context("Invalid mime type for upload")?;
    let form = reqwest::multipart::Form::new().part("file", part);

    let resp = client.post_multipart("/files/upload", form).await?;
    let attachment: FileAttachment = resp
        .json()
        .await
        .context("Failed to parse upload response")?;
    Ok(attachment)
}

/// Browser-openable download URL for an attachment. The download endpoint
/// takes the token as a query parameter rather than a header.
pub fn file_download_url(server_addr: &str, token: &str, file_id: &str) -> String {
    format!("http://{}/api/files/{}?token={}", server_addr, file_id, token)
}

/// Guess a mime type from the file extension. The server stores whatever the
/// upload declares and falls back to octet-stream itself.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("txt") | Some("log") | Some("md") => "text/plain",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
