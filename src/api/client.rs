//! Authenticated HTTP client for the chat server's REST API
//!
//! Wraps reqwest::Client with the configured base URL and bearer token.

use anyhow::{bail, Context, Result};

use crate::config::Config;

/// Authenticated client bound to one server address and session token.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    server_addr: String,
    token: String,
}

impl ApiClient {
    /// Load the saved session from config and build a client for it.
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        let server_addr = config.require_server()?.to_string();
        let token = config.require_token()?.to_string();
        Ok(Self::with_session(&server_addr, token))
    }

    /// Build a client from an explicit address and token, for flows that run
    /// before a session is saved (login, register).
    pub fn with_session(server_addr: &str, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: format!("http://{}/api", server_addr),
            server_addr: server_addr.to_string(),
            token,
        }
    }

    /// Server address this client is bound to (host:port).
    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    /// Session token used for bearer auth.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// GET request against an API path (bearer auth).
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!("GET {}", url);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        check_response(resp, &url).await
    }

    /// POST request with a JSON body (bearer auth).
    pub async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!("POST {}", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        check_response(resp, &url).await
    }

    /// POST request with a multipart body (bearer auth).
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!("POST {} (multipart)", url);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        check_response(resp, &url).await
    }

    /// DELETE request against an API path (bearer auth).
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base, path);
        tracing::debug!("DELETE {}", url);

        let resp = self
            .http
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("DELETE {} failed", url))?;

        check_response(resp, &url).await
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        bail!(
            "401 Unauthorized for {}. Session may have expired -- run 'lanchat-cli login'.",
            url
        );
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("HTTP {} for {}: {}", status.as_u16(), url, body);
    }
    Ok(resp)
}
