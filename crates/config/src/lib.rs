use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Hosted Letta API.  Any endpoint on this domain must carry a credential.
pub const HOSTED_ENDPOINT: &str = "https://api.letta.com";
const HOSTED_DOMAIN: &str = "letta.com";

// ── Remote connection ────────────────────────────────────────────────────────

/// Where the remote knowledge store lives and which named resources to bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConnectionConfig {
    pub endpoint: String,
    /// Bearer credential.  Empty means "not configured".
    /// Can also be set via `LETTA_API_KEY` (env takes precedence).
    pub api_key: String,
    /// Name of the remote source (document collection) mirroring the vault.
    pub source_name: String,
    pub agent_name: String,
}

impl Default for RemoteConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: HOSTED_ENDPOINT.to_string(),
            api_key: String::new(),
            source_name: "obsidian-vault-files".to_string(),
            agent_name: "Obsidian Assistant".to_string(),
        }
    }
}

/// A configuration mistake the user has to fix before connecting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigProblem {
    #[error("an API key is required for the hosted service at {0}")]
    MissingCredential(String),
    #[error("endpoint `{0}` is not a valid http(s) URL")]
    InvalidEndpoint(String),
    #[error("{0} must not be empty")]
    EmptyName(&'static str),
}

impl RemoteConnectionConfig {
    pub fn credential(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (!key.is_empty()).then_some(key)
    }

    /// True when the endpoint points at the hosted service rather than a
    /// self-hosted server.
    pub fn is_hosted(&self) -> bool {
        Url::parse(self.endpoint.trim())
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| {
                host == HOSTED_DOMAIN || host.ends_with(&format!(".{HOSTED_DOMAIN}"))
            })
    }

    /// Credential problems are reported before shape problems so the
    /// hosted-without-key case always surfaces as an auth failure.
    pub fn validate(&self) -> std::result::Result<(), ConfigProblem> {
        if self.is_hosted() && self.credential().is_none() {
            return Err(ConfigProblem::MissingCredential(self.endpoint.clone()));
        }

        match Url::parse(self.endpoint.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(ConfigProblem::InvalidEndpoint(self.endpoint.clone())),
        }

        if self.source_name.trim().is_empty() {
            return Err(ConfigProblem::EmptyName("remote.source_name"));
        }
        if self.agent_name.trim().is_empty() {
            return Err(ConfigProblem::EmptyName("remote.agent_name"));
        }
        Ok(())
    }
}

// ── Agent creation defaults ──────────────────────────────────────────────────

/// Parameters offered when the agent does not exist yet and has to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    pub agent_type: String,
    pub model: String,
    pub embedding: String,
    pub include_base_tools: bool,
    pub persona: String,
    pub human: String,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            agent_type: "memgpt_v2_agent".to_string(),
            model: "letta/letta-free".to_string(),
            embedding: "letta/letta-free".to_string(),
            include_base_tools: true,
            persona: "I am a helpful assistant with access to the user's Obsidian vault."
                .to_string(),
            human: String::new(),
        }
    }
}

// ── Vault sync ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub vault_path: String,
    /// File extensions (without the dot) that are mirrored to the source.
    pub extensions: Vec<String>,
    /// Glob patterns, relative to the vault root, that are never mirrored.
    pub ignore: Vec<String>,
    pub sync_on_startup: bool,
    /// Minutes between automatic full passes while watching.  `0` disables.
    pub periodic_sync_minutes: u64,
    /// Upload budget per sliding minute.  `0` disables the limit.
    pub max_uploads_per_minute: usize,
    pub ask_before_source_creation: bool,
    pub ask_before_source_attachment: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            vault_path: ".".to_string(),
            extensions: vec!["md".to_string()],
            ignore: vec![
                ".obsidian/**".to_string(),
                ".trash/**".to_string(),
                ".git/**".to_string(),
            ],
            sync_on_startup: true,
            periodic_sync_minutes: 0,
            max_uploads_per_minute: 10,
            ask_before_source_creation: true,
            ask_before_source_attachment: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub remote: RemoteConnectionConfig,
    pub agent: AgentDefaults,
    pub sync: SyncConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)
                .with_context(|| format!("invalid config file {}", path.display()))?;
        }

        config.apply_env_overrides(|name| env::var(name).ok());
        Ok(config)
    }

    /// `LETTA_API_KEY` and `LETTA_BASE_URL` win over the file when non-empty.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("LETTA_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.remote.api_key = key;
        }
        if let Some(url) = lookup("LETTA_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.remote.endpoint = url;
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
