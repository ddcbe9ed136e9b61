//! OAuth2 and role-connection wire types.

use rolelink_core::{AttributeFields, ExternalIdentity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Authorization link handed to the user, plus the state it carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Query parameters the provider appends when redirecting back to us.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Token endpoint success body.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: String,
}

/// Error body returned by the token endpoint (RFC 6749 §5.2).
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProviderErrorBody {
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Tokens from a single code exchange. Never persisted.
#[derive(Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: BTreeSet<String>,
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            token_type: response.token_type,
            expires_in: response.expires_in,
            scope: response
                .scope
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Current-user endpoint body. Accounts migrated off discriminators report `"0"`.
#[derive(Debug, Deserialize)]
pub(crate) struct CurrentUserResponse {
    pub id: String,
    pub username: String,
    #[serde(default = "default_discriminator")]
    pub discriminator: String,
}

fn default_discriminator() -> String {
    "0".to_string()
}

impl From<CurrentUserResponse> for ExternalIdentity {
    fn from(user: CurrentUserResponse) -> Self {
        Self {
            id: user.id,
            username: user.username,
            discriminator: user.discriminator,
        }
    }
}

/// Declared metadata schema. Boolean fields are sent as `1`/`0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConnectionMetadata {
    pub is_assistant: u8,
}

impl From<AttributeFields> for RoleConnectionMetadata {
    fn from(fields: AttributeFields) -> Self {
        Self {
            is_assistant: u8::from(fields.is_assistant),
        }
    }
}

/// Body of the role-connection `PUT`. The provider replaces the whole
/// connection on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConnectionPayload {
    pub platform_name: String,
    pub platform_username: String,
    pub metadata: RoleConnectionMetadata,
}
