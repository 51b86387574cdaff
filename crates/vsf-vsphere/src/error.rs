//! Error types for the vSphere facade crate.

use serde::Deserialize;
use thiserror::Error;

/// Categorised error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VsphereErrorKind {
    /// vSphere REST API unreachable
    ConnectionError,
    /// Credentials rejected or session expired (401)
    AuthenticationError,
    /// Operation attempted without an active session
    NotConnected,
    /// Resource not found (404)
    NotFound,
    /// The requested power transition is already in effect
    AlreadyInDesiredState,
    /// VM is in a state that does not allow the operation
    InvalidVmState,
    /// Snapshot lookup or operation failed
    SnapshotError,
    /// HTTP / API error with status code
    ApiError(u16),
    /// Timeout
    Timeout,
    /// Permission denied (403)
    AccessDenied,
    /// JSON parse / deserialization error
    ParseError,
    /// Invalid or incomplete configuration
    ConfigError,
    /// The request cannot be expressed against the REST API
    Unsupported,
    /// Generic
    Other,
}

/// Crate error type carrying a kind + human-readable message.
#[derive(Debug, Clone, Error)]
#[error("[{kind:?}] {message}")]
pub struct VsphereError {
    pub kind: VsphereErrorKind,
    pub message: String,
}

impl VsphereError {
    pub fn new(kind: VsphereErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, message: msg.into() }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::ConnectionError, msg)
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::AuthenticationError, msg)
    }

    pub fn not_connected() -> Self {
        Self::new(
            VsphereErrorKind::NotConnected,
            "Not connected to vCenter. Call connect() first.",
        )
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::NotFound, msg)
    }

    pub fn api(status: u16, msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::ApiError(status), msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::ParseError, msg)
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::SnapshotError, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::Timeout, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(VsphereErrorKind::ConfigError, msg)
    }

    /// Bad host, unreachable endpoint, or rejected credentials.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self.kind,
            VsphereErrorKind::ConnectionError
                | VsphereErrorKind::AuthenticationError
                | VsphereErrorKind::Timeout
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == VsphereErrorKind::NotFound
    }

    /// Failures that might go away if the same call is made again later.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            VsphereErrorKind::ConnectionError | VsphereErrorKind::Timeout => true,
            VsphereErrorKind::ApiError(code) => code >= 500,
            _ => false,
        }
    }

    /// Map a failed REST response onto an error, preferring the vSphere
    /// error envelope (`error_type` + `messages`) over the bare status.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();
        let detail = envelope
            .as_ref()
            .and_then(|e| e.messages.first())
            .map(|m| m.default_message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.chars().take(500).collect());

        let by_type = envelope
            .as_ref()
            .and_then(|e| e.error_type.as_deref())
            .and_then(|t| match t {
                "NOT_FOUND" => Some(VsphereErrorKind::NotFound),
                "ALREADY_IN_DESIRED_STATE" => Some(VsphereErrorKind::AlreadyInDesiredState),
                "NOT_ALLOWED_IN_CURRENT_STATE" | "RESOURCE_BUSY" => {
                    Some(VsphereErrorKind::InvalidVmState)
                }
                "UNAUTHENTICATED" => Some(VsphereErrorKind::AuthenticationError),
                "UNAUTHORIZED" => Some(VsphereErrorKind::AccessDenied),
                _ => None,
            });

        let kind = by_type.unwrap_or(match status {
            401 => VsphereErrorKind::AuthenticationError,
            403 => VsphereErrorKind::AccessDenied,
            404 => VsphereErrorKind::NotFound,
            code => VsphereErrorKind::ApiError(code),
        });

        Self::new(kind, format!("HTTP {status}: {detail}"))
    }
}

/// Standard vSphere REST error body.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    messages: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    #[serde(default)]
    default_message: String,
}

impl From<VsphereError> for String {
    fn from(e: VsphereError) -> String {
        e.to_string()
    }
}

impl From<reqwest::Error> for VsphereError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::timeout(format!("HTTP timeout: {e}"))
        } else if e.is_connect() {
            Self::connection(format!("Connection failed: {e}"))
        } else {
            Self::new(VsphereErrorKind::Other, format!("HTTP error: {e}"))
        }
    }
}

impl From<serde_json::Error> for VsphereError {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {e}"))
    }
}

/// Convenience alias.
pub type VsphereResult<T> = Result<T, VsphereError>;
