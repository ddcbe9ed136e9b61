//! Linked-role OAuth2 flow.
//!
//! Generates authorization links guarded by single-use state tokens, exchanges
//! the returned code, resolves the user, and publishes their stored attributes
//! as role-connection metadata.

mod authorize;
mod client;
mod config;
mod error;
mod flow;
mod publisher;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use authorize::AuthorizationUrlGenerator;
pub use client::{DiscordApiClient, LinkedRoleProvider};
pub use config::{
    DEFAULT_API_BASE_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_PLATFORM_NAME, LINKED_ROLE_SCOPES,
    LinkConfig, MAX_STATE_TTL_SECONDS,
};
pub use error::{ErrorKind, LinkError, LinkResult};
pub use flow::{FlowStage, LinkFlow, LinkOutcome};
pub use publisher::MetadataPublisher;
pub use state::{InMemoryStateStore, IssuedState, OAuthStateStore};
pub use types::{
    AuthorizationRequest, CallbackParams, RoleConnectionMetadata, RoleConnectionPayload, TokenSet,
};

// Re-export common types for convenience
pub use rolelink_core::{AttributeFields, AttributeStore, ExternalIdentity, UserAttributes};
