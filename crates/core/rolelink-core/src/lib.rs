//! Core types and storage traits for linked-role attribute sync.
//!
//! The attribute store is the leaf of the system: it maps an external user id
//! to the attributes that get published as role-connection metadata. It knows
//! nothing about OAuth.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Snapshot of the authenticated user on the external platform.
///
/// Fetched once per callback and only used to key the attribute lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub id: String,
    pub username: String,
    pub discriminator: String,
}

impl ExternalIdentity {
    /// `username#1234`, or just the username for accounts without a legacy
    /// discriminator.
    pub fn display_tag(&self) -> String {
        match self.discriminator.as_str() {
            "" | "0" => self.username.clone(),
            discriminator => format!("{}#{}", self.username, discriminator),
        }
    }
}

/// The mutable attribute set. A missing record is equivalent to `default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFields {
    pub is_assistant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttributes {
    pub user_id: String,
    pub is_assistant: bool,
    pub last_updated: DateTime<Utc>,
}

impl UserAttributes {
    pub fn new(
        user_id: impl Into<String>,
        fields: AttributeFields,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            is_assistant: fields.is_assistant,
            last_updated: timestamp,
        }
    }

    pub fn fields(&self) -> AttributeFields {
        AttributeFields {
            is_assistant: self.is_assistant,
        }
    }

    /// Overwrite the fields of an existing record.
    ///
    /// `last_updated` never moves backwards, even if the caller's clock does.
    pub fn apply(&mut self, fields: AttributeFields, timestamp: DateTime<Utc>) {
        self.is_assistant = fields.is_assistant;
        self.last_updated = self.last_updated.max(timestamp);
    }
}

/// Key-value store holding [`UserAttributes`] keyed by external user id.
///
/// Implementations must make `upsert` a single atomic operation per key; callers
/// never read-modify-write through `get`.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Returns `Ok(None)` when the user has no record.
    async fn get(&self, user_id: &str) -> StoreResult<Option<UserAttributes>>;

    /// Insert or update the record for `user_id`.
    ///
    /// `Ok(false)` reports a write the store could not apply but that is safe to
    /// retry. Fatal conditions are returned as `Err`.
    async fn upsert(
        &self,
        user_id: &str,
        fields: AttributeFields,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_apply_keeps_last_updated_monotonic() {
        let now = Utc::now();
        let mut record = UserAttributes::new("42", AttributeFields { is_assistant: true }, now);

        record.apply(AttributeFields { is_assistant: false }, now - Duration::seconds(30));

        assert!(!record.is_assistant);
        assert_eq!(record.last_updated, now);

        let later = now + Duration::seconds(5);
        record.apply(AttributeFields { is_assistant: true }, later);
        assert!(record.is_assistant);
        assert_eq!(record.last_updated, later);
    }

    #[test]
    fn test_missing_record_defaults_to_not_assistant() {
        assert!(!AttributeFields::default().is_assistant);
    }

    #[test]
    fn test_display_tag() {
        let legacy = ExternalIdentity {
            id: "1".to_string(),
            username: "wumpus".to_string(),
            discriminator: "0001".to_string(),
        };
        assert_eq!(legacy.display_tag(), "wumpus#0001");

        let migrated = ExternalIdentity {
            discriminator: "0".to_string(),
            ..legacy
        };
        assert_eq!(migrated.display_tag(), "wumpus");
    }

    #[test]
    fn test_user_attributes_serde_shape() {
        let record = UserAttributes::new("7", AttributeFields { is_assistant: true }, Utc::now());
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["user_id"], "7");
        assert_eq!(value["is_assistant"], true);
        assert!(value["last_updated"].is_string());
    }
}
