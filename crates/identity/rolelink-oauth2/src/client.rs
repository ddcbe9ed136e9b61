//! HTTP client for the provider's token, current-user and role-connection
//! endpoints.

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::types::{
    CurrentUserResponse, ProviderErrorBody, RoleConnectionPayload, TokenResponse, TokenSet,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rolelink_core::ExternalIdentity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// The three provider calls the linking flow depends on.
#[async_trait]
pub trait LinkedRoleProvider: Send + Sync {
    /// Exchange an authorization code for tokens. Never retried.
    async fn exchange_code(&self, code: &str) -> LinkResult<TokenSet>;

    /// Resolve the user that owns `access_token`.
    async fn fetch_identity(&self, access_token: &str) -> LinkResult<ExternalIdentity>;

    /// Replace the user's role connection for this application.
    async fn put_role_connection(
        &self,
        access_token: &str,
        payload: &RoleConnectionPayload,
    ) -> LinkResult<()>;
}

#[derive(Clone)]
pub struct DiscordApiClient {
    http_client: Client,
    config: Arc<LinkConfig>,
}

impl DiscordApiClient {
    pub fn new(config: Arc<LinkConfig>) -> LinkResult<Self> {
        config.validate()?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .user_agent(concat!("rolelink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LinkError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl LinkedRoleProvider for DiscordApiClient {
    async fn exchange_code(&self, code: &str) -> LinkResult<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.app_id.as_str()),
            ("client_secret", self.config.app_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| LinkError::transport(e, "token exchange"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LinkError::transport(e, "token exchange"))?;

        if !status.is_success() {
            let detail = describe_provider_error(status, &body);
            warn!(%status, "Token exchange rejected: {}", detail);
            return Err(if is_unavailable(status) {
                LinkError::ProviderUnavailable(format!("token endpoint: {detail}"))
            } else {
                LinkError::InvalidGrant(detail)
            });
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| LinkError::MalformedResponse(format!("token response: {e}")))?;

        if token_response.access_token.trim().is_empty() {
            return Err(LinkError::MalformedResponse(
                "token response: empty access_token".to_string(),
            ));
        }

        debug!("Exchanged authorization code for tokens");
        Ok(token_response.into())
    }

    async fn fetch_identity(&self, access_token: &str) -> LinkResult<ExternalIdentity> {
        let response = self
            .http_client
            .get(self.config.current_user_endpoint())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| LinkError::transport(e, "identity lookup"))?;

        let status = response.status();
        if is_token_rejected(status) {
            return Err(LinkError::Unauthorized);
        }
        if !status.is_success() {
            return Err(LinkError::ProviderUnavailable(format!(
                "current-user endpoint returned {status}"
            )));
        }

        let user: CurrentUserResponse = response
            .json()
            .await
            .map_err(|e| {
                LinkError::MalformedResponse(format!("current user: {}", e.without_url()))
            })?;

        debug!(user_id = %user.id, "Resolved external identity");
        Ok(user.into())
    }

    async fn put_role_connection(
        &self,
        access_token: &str,
        payload: &RoleConnectionPayload,
    ) -> LinkResult<()> {
        let response = self
            .http_client
            .put(self.config.role_connection_endpoint())
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| LinkError::transport(e, "metadata publish"))?;

        let status = response.status();
        if is_token_rejected(status) {
            return Err(LinkError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LinkError::ProviderUnavailable(format!(
                "role-connection endpoint: {}",
                describe_provider_error(status, &body)
            )));
        }

        Ok(())
    }
}

fn is_token_rejected(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn is_unavailable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS || !status.is_client_error()
}

/// Summarize a provider error body without echoing it wholesale.
fn describe_provider_error(status: StatusCode, body: &str) -> String {
    let parsed: ProviderErrorBody = serde_json::from_str(body).unwrap_or_default();

    let mut detail = match (parsed.error, parsed.error_description) {
        (Some(error), Some(description)) => format!("{error}: {description}"),
        (Some(error), None) => error,
        (None, Some(description)) => description,
        (None, None) => format!("status {}", status.as_u16()),
    };

    if detail.len() > 200 {
        let cut = (0..=200).rev().find(|i| detail.is_char_boundary(*i)).unwrap_or(0);
        detail.truncate(cut);
    }
    detail
}
