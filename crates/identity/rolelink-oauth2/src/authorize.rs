//! Authorization URL generation.

use crate::config::LinkConfig;
use crate::error::{LinkError, LinkResult};
use crate::state::{IssuedState, OAuthStateStore};
use crate::types::AuthorizationRequest;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Builds authorization links and records the state each one carries.
#[derive(Clone)]
pub struct AuthorizationUrlGenerator {
    config: Arc<LinkConfig>,
    states: Arc<dyn OAuthStateStore>,
}

impl AuthorizationUrlGenerator {
    pub fn new(config: Arc<LinkConfig>, states: Arc<dyn OAuthStateStore>) -> Self {
        Self { config, states }
    }

    /// Build an authorization URL requesting `scopes`, in the given order.
    ///
    /// The returned `state` is embedded in the URL and remembered until it is
    /// consumed by a callback or expires.
    pub async fn generate<S: AsRef<str>>(&self, scopes: &[S]) -> LinkResult<AuthorizationRequest> {
        self.config.validate()?;

        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|e| LinkError::Configuration(format!("authorize URL is invalid: {e}")))?;

        let scopes: Vec<String> = scopes.iter().map(|s| s.as_ref().to_string()).collect();
        let issued = IssuedState::new(scopes.clone(), self.config.state_ttl_seconds);
        let state = issued.state.clone();

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.app_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", &state);

        self.states.issue(issued).await?;

        debug!(scopes = ?scopes, "Generated authorization URL");

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LINKED_ROLE_SCOPES;
    use crate::state::InMemoryStateStore;
    use std::collections::HashMap;

    fn generator(config: LinkConfig) -> (AuthorizationUrlGenerator, InMemoryStateStore) {
        let states = InMemoryStateStore::new();
        let generator = AuthorizationUrlGenerator::new(Arc::new(config), Arc::new(states.clone()));
        (generator, states)
    }

    fn config() -> LinkConfig {
        LinkConfig::new(
            "1234",
            "secret-value",
            "http://localhost:3000/discord-oauth-callback",
        )
    }

    #[tokio::test]
    async fn test_authorization_url_generation() {
        let (generator, states) = generator(config());

        let request = generator.generate(&LINKED_ROLE_SCOPES).await.unwrap();

        let url = Url::parse(&request.url).unwrap();
        assert_eq!(url.host_str(), Some("discord.com"));
        assert_eq!(url.path(), "/oauth2/authorize");

        let params: HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(params.get("client_id"), Some(&"1234".into()));
        assert_eq!(
            params.get("redirect_uri"),
            Some(&"http://localhost:3000/discord-oauth-callback".into())
        );
        assert_eq!(params.get("response_type"), Some(&"code".into()));
        assert_eq!(
            params.get("scope"),
            Some(&"identify role_connections.write".into())
        );
        assert_eq!(params.get("state"), Some(&request.state.clone().into()));

        assert!(!request.state.is_empty());
        assert!(request.url.contains(&request.state));
        assert!(!request.url.contains("secret-value"));
        assert_eq!(states.len().await, 1);
    }

    #[tokio::test]
    async fn test_scope_order_is_preserved() {
        let (generator, _) = generator(config());

        let request = generator
            .generate(&["role_connections.write", "identify"])
            .await
            .unwrap();

        let url = Url::parse(&request.url).unwrap();
        let params: HashMap<_, _> = url.query_pairs().collect();
        assert_eq!(
            params.get("scope"),
            Some(&"role_connections.write identify".into())
        );
    }

    #[tokio::test]
    async fn test_states_never_repeat() {
        let (generator, states) = generator(config());

        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let request = generator.generate(&LINKED_ROLE_SCOPES).await.unwrap();
            assert!(seen.insert(request.state));
        }
        assert_eq!(states.len().await, 50);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_issuing_state() {
        let mut bad = config();
        bad.redirect_uri = String::new();
        let (generator, states) = generator(bad);

        let result = generator.generate(&LINKED_ROLE_SCOPES).await;

        assert!(matches!(result, Err(LinkError::Configuration(_))));
        assert_eq!(states.len().await, 0);
    }
}
