//! Linked-role OAuth2 configuration.

use crate::error::{LinkError, LinkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
pub const DEFAULT_PLATFORM_NAME: &str = "Assistant Registry";

/// Upper bound on how long an issued state stays redeemable.
pub const MAX_STATE_TTL_SECONDS: u64 = 86_400;

/// Scopes needed to read the user's identity and write their role connection.
pub const LINKED_ROLE_SCOPES: [&str; 2] = ["identify", "role_connections.write"];

/// Configuration shared by every stage of the linking flow.
///
/// Built once at startup and handed to components behind an `Arc`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    pub app_id: String,
    pub app_secret: String,
    pub redirect_uri: String,
    pub authorize_url: String,
    pub api_base_url: String,
    /// Shown by the platform next to the linked role.
    pub platform_name: String,
    pub state_ttl_seconds: u64,
    pub http_timeout_seconds: u64,
}

impl fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkConfig")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorize_url", &self.authorize_url)
            .field("api_base_url", &self.api_base_url)
            .field("platform_name", &self.platform_name)
            .field("state_ttl_seconds", &self.state_ttl_seconds)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .finish()
    }
}

impl LinkConfig {
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            platform_name: DEFAULT_PLATFORM_NAME.to_string(),
            state_ttl_seconds: 600, // 10 minutes
            http_timeout_seconds: 30,
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn with_platform_name(mut self, name: impl Into<String>) -> Self {
        self.platform_name = name.into();
        self
    }

    pub fn with_state_ttl(mut self, seconds: u64) -> Self {
        self.state_ttl_seconds = seconds;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    /// Reject configurations that would only fail later, mid-flow.
    pub fn validate(&self) -> LinkResult<()> {
        for (name, value) in [
            ("application id", &self.app_id),
            ("application secret", &self.app_secret),
            ("redirect URI", &self.redirect_uri),
            ("platform name", &self.platform_name),
        ] {
            if value.trim().is_empty() {
                return Err(LinkError::Configuration(format!("{name} is required")));
            }
        }

        for (name, value) in [
            ("redirect URI", &self.redirect_uri),
            ("authorize URL", &self.authorize_url),
            ("API base URL", &self.api_base_url),
        ] {
            Url::parse(value).map_err(|e| {
                LinkError::Configuration(format!("{name} '{value}' is invalid: {e}"))
            })?;
        }

        if self.state_ttl_seconds == 0 {
            return Err(LinkError::Configuration(
                "state TTL must be positive".to_string(),
            ));
        }

        if self.state_ttl_seconds > MAX_STATE_TTL_SECONDS {
            return Err(LinkError::Configuration(format!(
                "state TTL must be at most {MAX_STATE_TTL_SECONDS} seconds"
            )));
        }

        if self.http_timeout_seconds == 0 {
            return Err(LinkError::Configuration(
                "HTTP timeout must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.api_base())
    }

    pub fn current_user_endpoint(&self) -> String {
        format!("{}/users/@me", self.api_base())
    }

    pub fn role_connection_endpoint(&self) -> String {
        format!(
            "{}/users/@me/applications/{}/role-connection",
            self.api_base(),
            self.app_id
        )
    }

    fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}
