//! Anti-forgery state tokens for the authorization redirect.

use crate::config::MAX_STATE_TTL_SECONDS;
use crate::error::{LinkError, LinkResult};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, thread_rng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A state token we handed out, waiting for its callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedState {
    pub state: String,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedState {
    pub fn new(scopes: Vec<String>, ttl_seconds: u64) -> Self {
        let created_at = Utc::now();
        let ttl = ttl_seconds.min(MAX_STATE_TTL_SECONDS) as i64;
        let expires_at = created_at + Duration::seconds(ttl);

        Self {
            state: generate_state_token(),
            scopes,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// 256 bits from the thread-local CSPRNG, URL-safe base64 without padding.
fn generate_state_token() -> String {
    let mut bytes = [0u8; 32];
    thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[async_trait]
pub trait OAuthStateStore: Send + Sync {
    /// Remember a freshly issued state.
    async fn issue(&self, state: IssuedState) -> LinkResult<()>;

    /// Remove and return a state. Unknown, reused and expired states are all
    /// `InvalidState`.
    async fn consume(&self, state: &str) -> LinkResult<IssuedState>;

    /// Drop expired states, returning how many were removed.
    async fn purge_expired(&self) -> LinkResult<usize>;
}

#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    states: Arc<RwLock<HashMap<String, IssuedState>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}

#[async_trait]
impl OAuthStateStore for InMemoryStateStore {
    async fn issue(&self, state: IssuedState) -> LinkResult<()> {
        let mut states = self.states.write().await;
        states.insert(state.state.clone(), state);
        Ok(())
    }

    async fn consume(&self, state: &str) -> LinkResult<IssuedState> {
        let issued = self
            .states
            .write()
            .await
            .remove(state)
            .ok_or(LinkError::InvalidState)?;

        if issued.is_expired() {
            return Err(LinkError::InvalidState);
        }

        Ok(issued)
    }

    async fn purge_expired(&self) -> LinkResult<usize> {
        let mut states = self.states.write().await;
        let now = Utc::now();
        let before = states.len();

        states.retain(|_, state| state.expires_at >= now);

        Ok(before - states.len())
    }
}
