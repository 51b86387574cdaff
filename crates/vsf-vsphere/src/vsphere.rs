//! vSphere REST API HTTP client with session-based authentication.
//!
//! Communicates with vCenter / ESXi via `https://{host}/api/...`.
//! Manages session lifecycle (create / delete) and provides typed helpers.

use crate::config::VsphereConfig;
use crate::error::{VsphereError, VsphereResult};

use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const SESSION_HEADER: &str = "vmware-api-session-id";

/// vSphere REST API client.
pub struct VsphereClient {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    config: VsphereConfig,
}

impl VsphereClient {
    /// Build a new client from config (does NOT create a session yet).
    pub fn new(config: &VsphereConfig) -> VsphereResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VsphereError::connection(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.endpoint(),
            session_id: None,
            config: config.clone(),
        })
    }

    /// Base URL for API calls.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether we have an active session.
    pub fn is_connected(&self) -> bool {
        self.session_id.is_some()
    }

    /// Current session ID (if any).
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn config(&self) -> &VsphereConfig {
        &self.config
    }

    // ── Session management ──────────────────────────────────────────

    /// Create a new API session (POST /api/session).
    pub async fn login(&mut self) -> VsphereResult<String> {
        let url = format!("{}/api/session", self.base_url);
        debug!("POST {url} as {}", self.config.username);

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.config.username, Some(self.config.password.expose()))
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(VsphereError::auth(format!(
                "Invalid credentials for {}",
                self.config.username
            )));
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let mut err = VsphereError::from_response(status.as_u16(), &body);
            err.message = format!("Login failed: {}", err.message);
            return Err(err);
        }

        // Session ID comes back as a quoted JSON string
        let session_id: String = resp.json().await.map_err(|e| {
            VsphereError::parse(format!("Failed to parse session response: {e}"))
        })?;

        self.session_id = Some(session_id.clone());
        Ok(session_id)
    }

    /// Delete the current session (DELETE /api/session). The local session
    /// is cleared even if the server call fails.
    pub async fn logout(&mut self) -> VsphereResult<()> {
        if let Some(sid) = self.session_id.take() {
            let url = format!("{}/api/session", self.base_url);
            match self.client.delete(&url).header(SESSION_HEADER, sid).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    warn!("Logout from {} returned HTTP {}", self.base_url, resp.status());
                }
                Err(e) => warn!("Logout from {} failed: {e}", self.base_url),
                Ok(_) => {}
            }
        }
        Ok(())
    }

    /// Check if the session is still valid (GET /api/session).
    pub async fn check_session(&self) -> VsphereResult<bool> {
        let sid = self.require_session()?;
        let url = format!("{}/api/session", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header(SESSION_HEADER, sid)
            .send()
            .await?;

        Ok(resp.status().is_success())
    }

    // ── HTTP helpers ────────────────────────────────────────────────

    fn require_session(&self) -> VsphereResult<&str> {
        self.session_id
            .as_deref()
            .ok_or_else(VsphereError::not_connected)
    }

    fn authed(&self, builder: RequestBuilder) -> VsphereResult<RequestBuilder> {
        let sid = self.require_session()?;
        Ok(builder.header(SESSION_HEADER, sid))
    }

    /// GET a JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> VsphereResult<T> {
        self.get_with_params(path, &[]).await
    }

    /// GET a JSON response with query params. Repeated keys are sent as
    /// repeated parameters (`names=a&names=b`).
    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> VsphereResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url} {params:?}");
        let borrowed: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let resp = self
            .authed(self.client.get(&url))?
            .query(&borrowed)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// POST with JSON body, return parsed response.
    pub async fn post<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> VsphereResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {url}");
        let resp = self
            .authed(self.client.post(&url))?
            .json(body)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;
        Self::parse_response(resp).await
    }

    /// POST with no body, return nothing (discards response).
    pub async fn post_empty(&self, path: &str) -> VsphereResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {url}");
        let resp = self.authed(self.client.post(&url))?.send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// PATCH with JSON body, ignoring the response body.
    pub async fn patch<B: serde::Serialize>(&self, path: &str, body: &B) -> VsphereResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("PATCH {url}");
        let resp = self
            .authed(self.client.patch(&url))?
            .json(body)
            .send()
            .await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    /// DELETE, ignoring response body.
    pub async fn delete(&self, path: &str) -> VsphereResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("DELETE {url}");
        let resp = self.authed(self.client.delete(&url))?.send().await?;
        Self::check_status(resp).await?;
        Ok(())
    }

    // ── Internal helpers ────────────────────────────────────────────

    async fn check_status(resp: Response) -> VsphereResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(VsphereError::from_response(status.as_u16(), &body))
    }

    async fn parse_response<T: DeserializeOwned>(resp: Response) -> VsphereResult<T> {
        let text = resp.text().await.map_err(|e| {
            VsphereError::parse(format!("Failed to read response body: {e}"))
        })?;

        if text.is_empty() {
            // Some vSphere endpoints return empty body for success
            return serde_json::from_str("null").map_err(|e| {
                VsphereError::parse(format!("Cannot deserialise empty response: {e}"))
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            let preview: String = text.chars().take(500).collect();
            VsphereError::parse(format!("JSON parse error: {e}; body: {preview}"))
        })
    }
}
