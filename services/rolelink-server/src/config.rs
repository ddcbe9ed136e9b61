//! Server configuration.
//!
//! Values are layered, later sources winning:
//! - Defaults
//! - Configuration file (`rolelink.toml`, or the path in `ROLELINK_CONFIG_FILE`)
//! - Environment variables with the `ROLELINK__` prefix, e.g. `ROLELINK__SERVER__PORT`
//! - The platform's conventional variables (`DISCORD_APPLICATION_ID`, ...)

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use rolelink_oauth2::{
    DEFAULT_API_BASE_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_PLATFORM_NAME, LINKED_ROLE_SCOPES,
    LinkConfig, MAX_STATE_TTL_SECONDS,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub discord: DiscordConfig,
    pub oauth: OAuthConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1)
    pub host: IpAddr,

    /// Port to bind to (default: 3000)
    pub port: u16,
}

/// Application credentials and provider endpoints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    pub application_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Hex-encoded Ed25519 key used to verify interaction requests.
    pub public_key: String,
    pub api_base_url: String,
    pub authorize_url: String,
    pub platform_name: String,
    pub scopes: Vec<String>,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("application_id", &self.application_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("public_key", &self.public_key)
            .field("api_base_url", &self.api_base_url)
            .field("authorize_url", &self.authorize_url)
            .field("platform_name", &self.platform_name)
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// How long an issued state stays valid (default: 600)
    pub state_ttl_seconds: u64,

    /// Timeout applied to every provider call (default: 30)
    pub http_timeout_seconds: u64,

    /// How often expired states are purged (default: 60)
    pub state_purge_interval_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// File used by the `json` backend
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            application_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            public_key: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            platform_name: DEFAULT_PLATFORM_NAME.to_string(),
            scopes: LINKED_ROLE_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            state_ttl_seconds: 600, // 10 minutes
            http_timeout_seconds: 30,
            state_purge_interval_seconds: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("./rolelink_data/attributes.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 3] = ["pretty", "json", "compact"];

impl Config {
    /// Load configuration from the environment and optional config file.
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("ROLELINK_CONFIG_FILE").unwrap_or_else(|_| "rolelink.toml".to_string());

        let mut settings = Self::load_from(Path::new(&config_path))?;
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        settings.validate()?;

        Ok(settings)
    }

    /// Layer `path` (when present) and `ROLELINK__*` variables over the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if path.exists() {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        } else {
            debug!("No config file found at {}, using defaults", path.display());
        }

        builder = builder.add_source(
            Environment::with_prefix("ROLELINK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Apply the platform's conventional variable names on top of everything else.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 4] = [
            ("DISCORD_APPLICATION_ID", &mut self.discord.application_id),
            ("DISCORD_CLIENT_SECRET", &mut self.discord.client_secret),
            ("DISCORD_REDIRECT_URI", &mut self.discord.redirect_uri),
            ("DISCORD_APP_PUBLIC_KEY", &mut self.discord.public_key),
        ];

        for (key, target) in overrides {
            if let Some(value) = lookup(key) {
                debug!("Using {} environment variable", key);
                *target = value;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        for (name, value) in [
            ("discord.application_id", &self.discord.application_id),
            ("discord.client_secret", &self.discord.client_secret),
            ("discord.redirect_uri", &self.discord.redirect_uri),
            ("discord.public_key", &self.discord.public_key),
            ("discord.platform_name", &self.discord.platform_name),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("Missing required setting {}", name);
            }
        }

        for (name, value) in [
            ("discord.redirect_uri", &self.discord.redirect_uri),
            ("discord.api_base_url", &self.discord.api_base_url),
            ("discord.authorize_url", &self.discord.authorize_url),
        ] {
            Url::parse(value).with_context(|| format!("Invalid URL for {}: '{}'", name, value))?;
        }

        let key_is_hex = self.discord.public_key.len() == 64
            && self.discord.public_key.chars().all(|c| c.is_ascii_hexdigit());
        if !key_is_hex {
            anyhow::bail!("discord.public_key must be 64 hexadecimal characters");
        }

        if self.discord.scopes.is_empty() {
            anyhow::bail!("At least one OAuth scope is required");
        }

        if self.oauth.state_ttl_seconds == 0 {
            anyhow::bail!("State TTL must be positive");
        }

        if self.oauth.state_ttl_seconds > MAX_STATE_TTL_SECONDS {
            anyhow::bail!("State TTL must be at most {} seconds", MAX_STATE_TTL_SECONDS);
        }

        if self.oauth.http_timeout_seconds == 0 {
            anyhow::bail!("HTTP timeout must be positive");
        }

        if self.oauth.state_purge_interval_seconds == 0 {
            anyhow::bail!("State purge interval must be positive");
        }

        if self.storage.backend == StorageBackend::Json && self.storage.path.as_os_str().is_empty()
        {
            anyhow::bail!("storage.path is required for the json backend");
        }

        let level_lower = self.logging.level.to_lowercase();
        if !self.logging.is_directive() && !VALID_LOG_LEVELS.contains(&level_lower.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {:?}",
                self.logging.level,
                VALID_LOG_LEVELS
            );
        }

        let format_lower = self.logging.format.to_lowercase();
        if !VALID_LOG_FORMATS.contains(&format_lower.as_str()) {
            anyhow::bail!(
                "Invalid log format '{}'. Must be one of: {:?}",
                self.logging.format,
                VALID_LOG_FORMATS
            );
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.server.host, self.server.port))
    }

    /// The flow's view of the configuration.
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::new(
            &self.discord.application_id,
            &self.discord.client_secret,
            &self.discord.redirect_uri,
        )
        .with_api_base_url(&self.discord.api_base_url)
        .with_authorize_url(&self.discord.authorize_url)
        .with_platform_name(&self.discord.platform_name)
        .with_state_ttl(self.oauth.state_ttl_seconds)
        .with_http_timeout(self.oauth.http_timeout_seconds)
    }
}

impl LoggingConfig {
    fn is_directive(&self) -> bool {
        self.level.contains('=') || self.level.contains(',')
    }

    /// Filter string for `tracing_subscriber::EnvFilter`.
    pub fn filter(&self) -> String {
        if self.is_directive() {
            self.level.clone()
        } else {
            format!(
                "rolelink_server={level},rolelink_oauth2={level},rolelink_store={level},tower_http={level},{level}",
                level = self.level
            )
        }
    }
}
