//! The linking flow: callback state machine plus direct attribute mutation.

use crate::authorize::AuthorizationUrlGenerator;
use crate::client::{DiscordApiClient, LinkedRoleProvider};
use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::publisher::MetadataPublisher;
use crate::state::OAuthStateStore;
use crate::types::{AuthorizationRequest, CallbackParams, RoleConnectionMetadata};
use chrono::Utc;
use rolelink_core::{AttributeFields, AttributeStore, ExternalIdentity, UserAttributes};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Stages of a callback. A failure in any stage ends the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Received,
    CodeValidated,
    TokensExchanged,
    IdentityResolved,
    MetadataPublished,
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowStage::Received => "received",
            FlowStage::CodeValidated => "code_validated",
            FlowStage::TokensExchanged => "tokens_exchanged",
            FlowStage::IdentityResolved => "identity_resolved",
            FlowStage::MetadataPublished => "metadata_published",
        };
        f.write_str(name)
    }
}

/// Result of a completed callback.
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub identity: ExternalIdentity,
    pub metadata: RoleConnectionMetadata,
}

#[derive(Clone)]
pub struct LinkFlow {
    urls: AuthorizationUrlGenerator,
    states: Arc<dyn OAuthStateStore>,
    provider: Arc<dyn LinkedRoleProvider>,
    publisher: MetadataPublisher,
    store: Arc<dyn AttributeStore>,
}

impl LinkFlow {
    pub fn new(
        config: Arc<LinkConfig>,
        states: Arc<dyn OAuthStateStore>,
        provider: Arc<dyn LinkedRoleProvider>,
        store: Arc<dyn AttributeStore>,
    ) -> Self {
        let publisher =
            MetadataPublisher::new(provider.clone(), store.clone(), config.platform_name.clone());

        Self {
            urls: AuthorizationUrlGenerator::new(config, states.clone()),
            states,
            provider,
            publisher,
            store,
        }
    }

    /// Wire the flow to the real provider API.
    pub fn discord(
        config: Arc<LinkConfig>,
        states: Arc<dyn OAuthStateStore>,
        store: Arc<dyn AttributeStore>,
    ) -> LinkResult<Self> {
        let provider = Arc::new(DiscordApiClient::new(config.clone())?);
        Ok(Self::new(config, states, provider, store))
    }

    pub async fn authorization_url<S: AsRef<str>>(
        &self,
        scopes: &[S],
    ) -> LinkResult<AuthorizationRequest> {
        self.urls.generate(scopes).await
    }

    /// Run the callback to completion. Every failure is logged here, once.
    pub async fn complete(&self, params: CallbackParams) -> LinkResult<LinkOutcome> {
        let mut stage = FlowStage::Received;

        match self.run(params, &mut stage).await {
            Ok(outcome) => {
                info!(
                    user_id = %outcome.identity.id,
                    is_assistant = outcome.metadata.is_assistant,
                    "Linked role connection updated"
                );
                Ok(outcome)
            }
            Err(e) => {
                let kind = e.kind();
                if kind.is_client_error() {
                    warn!(%kind, %stage, "Link callback rejected: {}", e);
                } else {
                    error!(%kind, %stage, "Link callback failed: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn run(&self, params: CallbackParams, stage: &mut FlowStage) -> LinkResult<LinkOutcome> {
        if let Some(error) = non_empty(params.error) {
            let detail = match non_empty(params.error_description) {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Err(LinkError::ProviderOAuth(detail));
        }

        let code = non_empty(params.code).ok_or(LinkError::MissingCode)?;
        let state = non_empty(params.state).ok_or(LinkError::InvalidState)?;
        self.states.consume(&state).await?;
        advance(stage, FlowStage::CodeValidated);

        let tokens = self.provider.exchange_code(&code).await?;
        advance(stage, FlowStage::TokensExchanged);

        let identity = self.provider.fetch_identity(&tokens.access_token).await?;
        advance(stage, FlowStage::IdentityResolved);

        let metadata = self
            .publisher
            .publish(&identity, &tokens.access_token)
            .await?;
        advance(stage, FlowStage::MetadataPublished);

        Ok(LinkOutcome { identity, metadata })
    }

    /// Upsert the user's assistant flag. `Ok(false)` means the store declined
    /// the write and it can be retried.
    pub async fn set_attribute(&self, user_id: &str, is_assistant: bool) -> LinkResult<bool> {
        let written = self
            .store
            .upsert(user_id, AttributeFields { is_assistant }, Utc::now())
            .await?;

        if written {
            info!(user_id, is_assistant, "Updated user attributes");
        } else {
            warn!(user_id, "Attribute store declined the write");
        }
        Ok(written)
    }

    pub async fn get_attribute(&self, user_id: &str) -> LinkResult<Option<UserAttributes>> {
        Ok(self.store.get(user_id).await?)
    }
}

fn advance(stage: &mut FlowStage, next: FlowStage) {
    debug!(from = %stage, to = %next, "Link flow transition");
    *stage = next;
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
