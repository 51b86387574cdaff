//! Connection configuration: defaults, JSON file loading, environment
//! overrides and validation.

use crate::error::{VsphereError, VsphereResult};
use crate::types::ReturnMode;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;

pub const ENV_HOST: &str = "VSPHERE_HOST";
pub const ENV_PORT: &str = "VSPHERE_PORT";
pub const ENV_USERNAME: &str = "VSPHERE_USERNAME";
pub const ENV_PASSWORD: &str = "VSPHERE_PASSWORD";
pub const ENV_INSECURE: &str = "VSPHERE_INSECURE";
pub const ENV_TIMEOUT_SECS: &str = "VSPHERE_TIMEOUT_SECS";
pub const ENV_RETURN_MODE: &str = "VSPHERE_RETURN_MODE";
pub const ENV_BASE_URL: &str = "VSPHERE_BASE_URL";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Credential
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Password wrapper. Zeroized on drop, redacted in `Debug`, never
/// serialised.
pub struct Credential(SecretString);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(SecretString::new(secret.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose().to_owned())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VsphereConfig
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for connecting to a vCenter / ESXi host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfig {
    /// vCenter or ESXi hostname / IP (e.g. "vcenter.lab.local")
    #[serde(default)]
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (e.g. "administrator@vsphere.local")
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Credential,
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub insecure: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Shape of mode-dependent lookups
    #[serde(default)]
    pub return_mode: ReturnMode,
    /// Full endpoint override (e.g. "http://127.0.0.1:8089"). When set,
    /// `host` and `port` are not used to build request URLs.
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_port() -> u16 {
    443
}

fn default_timeout() -> u64 {
    30
}

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: String::new(),
            password: Credential::default(),
            insecure: false,
            timeout_secs: default_timeout(),
            return_mode: ReturnMode::default(),
            base_url: None,
        }
    }
}

impl VsphereConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: Credential::new(password),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_return_mode(mut self, mode: ReturnMode) -> Self {
        self.return_mode = mode;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Load a JSON config file. The environment is not consulted.
    pub fn from_file(path: impl AsRef<Path>) -> VsphereResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            VsphereError::config(format!("Cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            VsphereError::config(format!("Invalid config {}: {e}", path.display()))
        })
    }

    /// Build a config purely from `VSPHERE_*` environment variables.
    pub fn from_env() -> VsphereResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay any `VSPHERE_*` variables that are set and non-empty.
    pub fn apply_env_overrides(&mut self) -> VsphereResult<()> {
        if let Some(v) = env_var(ENV_HOST) {
            self.host = v;
        }
        if let Some(v) = env_var(ENV_PORT) {
            self.port = parse_env(ENV_PORT, &v)?;
        }
        if let Some(v) = env_var(ENV_USERNAME) {
            self.username = v;
        }
        if let Some(v) = env_var(ENV_PASSWORD) {
            self.password = Credential::new(v);
        }
        if let Some(v) = env_var(ENV_INSECURE) {
            self.insecure = parse_bool(ENV_INSECURE, &v)?;
        }
        if let Some(v) = env_var(ENV_TIMEOUT_SECS) {
            self.timeout_secs = parse_env(ENV_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = env_var(ENV_RETURN_MODE) {
            self.return_mode = v
                .parse()
                .map_err(|e| VsphereError::config(format!("{ENV_RETURN_MODE}: {e}")))?;
        }
        if let Some(v) = env_var(ENV_BASE_URL) {
            self.base_url = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> VsphereResult<()> {
        if self.host.trim().is_empty() && self.base_url.is_none() {
            return Err(VsphereError::config("vCenter host is required"));
        }
        if self.username.trim().is_empty() {
            return Err(VsphereError::config("username is required"));
        }
        if self.timeout_secs == 0 {
            return Err(VsphereError::config("timeoutSecs must be greater than zero"));
        }
        if let Some(url) = &self.base_url {
            url::Url::parse(url)
                .map_err(|e| VsphereError::config(format!("Invalid baseUrl '{url}': {e}")))?;
        }
        Ok(())
    }

    /// Base URL for API calls, without a trailing slash.
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}:{}", self.host, self.port),
        }
    }

    /// Config without the password, safe to log or hand to a UI.
    pub fn safe(&self) -> VsphereConfigSafe {
        VsphereConfigSafe {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            insecure: self.insecure,
            return_mode: self.return_mode,
        }
    }
}

/// Config without the password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfigSafe {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub insecure: bool,
    pub return_mode: ReturnMode,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> VsphereResult<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| VsphereError::config(format!("{name}='{value}': {e}")))
}

fn parse_bool(name: &str, value: &str) -> VsphereResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(VsphereError::config(format!("{name}='{value}': expected a boolean"))),
    }
}
