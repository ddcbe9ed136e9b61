//! Platform interaction requests: signature verification, parsing and replies.

use axum::http::{HeaderMap, StatusCode};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

const PING: u8 = 1;
const APPLICATION_COMMAND: u8 = 2;

const PONG: u8 = 1;
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
const EPHEMERAL: u64 = 1 << 6;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("Missing signature headers")]
    MissingSignature,

    #[error("Invalid request signature")]
    InvalidSignature,

    #[error("Malformed interaction: {0}")]
    Malformed(String),

    #[error("Unsupported interaction type {0}")]
    Unsupported(u8),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}

impl InteractionError {
    pub fn status(&self) -> StatusCode {
        match self {
            InteractionError::MissingSignature | InteractionError::InvalidSignature => {
                StatusCode::UNAUTHORIZED
            }
            InteractionError::Malformed(_) | InteractionError::Unsupported(_) => {
                StatusCode::BAD_REQUEST
            }
            InteractionError::InvalidPublicKey(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Authenticates an inbound interaction and turns it into something routable.
///
/// # Returns
/// * `Ok(Interaction)` when the request is authentic and well-formed
/// * `Err(InteractionError)` otherwise; see [`InteractionError::status`]
pub trait InteractionRouter: Send + Sync + 'static {
    fn verify_and_route(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Interaction, InteractionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InteractionUser {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    ChatInput,
    User,
    Message,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub name: String,
    pub kind: CommandKind,
    pub options: Vec<CommandOption>,
    /// Whoever ran the command; absent only for malformed payloads.
    pub invoker: Option<InteractionUser>,
    pub resolved_users: HashMap<String, InteractionUser>,
}

impl CommandInvocation {
    pub fn string_option(&self, name: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.value.as_ref())
            .and_then(|v| v.as_str())
    }

    /// A user option, resolved to the full user when the payload carries it.
    pub fn user_option(&self, name: &str) -> Option<InteractionUser> {
        let id = self.string_option(name)?;
        Some(
            self.resolved_users
                .get(id)
                .cloned()
                .unwrap_or_else(|| InteractionUser {
                    id: id.to_string(),
                    username: id.to_string(),
                }),
        )
    }
}

#[derive(Debug, Clone)]
pub enum Interaction {
    Ping,
    Command(CommandInvocation),
}

#[derive(Deserialize)]
struct RawInteraction {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Option<RawCommandData>,
    #[serde(default)]
    member: Option<RawMember>,
    #[serde(default)]
    user: Option<InteractionUser>,
}

#[derive(Deserialize)]
struct RawCommandData {
    name: String,
    #[serde(rename = "type", default = "chat_input")]
    kind: u8,
    #[serde(default)]
    options: Vec<CommandOption>,
    #[serde(default)]
    resolved: Option<RawResolved>,
}

fn chat_input() -> u8 {
    1
}

#[derive(Deserialize)]
struct RawResolved {
    #[serde(default)]
    users: HashMap<String, InteractionUser>,
}

#[derive(Deserialize)]
struct RawMember {
    user: Option<InteractionUser>,
}

/// Parse a request body without looking at its signature.
pub fn parse_interaction(body: &[u8]) -> Result<Interaction, InteractionError> {
    let raw: RawInteraction =
        serde_json::from_slice(body).map_err(|e| InteractionError::Malformed(e.to_string()))?;

    match raw.kind {
        PING => Ok(Interaction::Ping),
        APPLICATION_COMMAND => {
            let data = raw
                .data
                .ok_or_else(|| InteractionError::Malformed("command without data".to_string()))?;

            let kind = match data.kind {
                1 => CommandKind::ChatInput,
                2 => CommandKind::User,
                3 => CommandKind::Message,
                other => {
                    return Err(InteractionError::Malformed(format!(
                        "unknown command type {other}"
                    )));
                }
            };

            // Guild invocations carry the user under `member`, DMs at the top level.
            let invoker = raw.member.and_then(|m| m.user).or(raw.user);

            Ok(Interaction::Command(CommandInvocation {
                name: data.name,
                kind,
                options: data.options,
                invoker,
                resolved_users: data.resolved.map(|r| r.users).unwrap_or_default(),
            }))
        }
        other => Err(InteractionError::Unsupported(other)),
    }
}

/// Verifies the platform's Ed25519 signature over timestamp + body.
#[derive(Debug, Clone)]
pub struct SignatureVerifyingRouter {
    key: VerifyingKey,
}

impl SignatureVerifyingRouter {
    pub fn from_hex(public_key: &str) -> Result<Self, InteractionError> {
        let bytes = hex::decode(public_key.trim())
            .map_err(|e| InteractionError::InvalidPublicKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| InteractionError::InvalidPublicKey("expected 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| InteractionError::InvalidPublicKey(e.to_string()))?;

        Ok(Self { key })
    }

    fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), InteractionError> {
        let signature = header_str(headers, SIGNATURE_HEADER)?;
        let timestamp = header_str(headers, TIMESTAMP_HEADER)?;

        let signature_bytes =
            hex::decode(signature).map_err(|_| InteractionError::InvalidSignature)?;
        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|_| InteractionError::InvalidSignature)?;

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify(&message, &signature)
            .map_err(|_| InteractionError::InvalidSignature)
    }
}

impl InteractionRouter for SignatureVerifyingRouter {
    fn verify_and_route(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Interaction, InteractionError> {
        self.verify(headers, body)?;
        parse_interaction(body)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, InteractionError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(InteractionError::MissingSignature)
}

/// Accepts every request; tests use it to skip cryptography.
#[cfg(test)]
pub(crate) struct AcceptAllRouter;

#[cfg(test)]
impl InteractionRouter for AcceptAllRouter {
    fn verify_and_route(
        &self,
        _headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Interaction, InteractionError> {
        parse_interaction(body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponseData {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionResponseData>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: PONG,
            data: None,
        }
    }

    pub fn message(content: impl Into<String>, ephemeral: bool) -> Self {
        Self {
            kind: CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(InteractionResponseData {
                content: content.into(),
                flags: ephemeral.then_some(EPHEMERAL),
            }),
        }
    }
}
