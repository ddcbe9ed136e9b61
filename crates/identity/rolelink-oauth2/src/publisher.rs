//! Pushes stored attributes to the provider as role-connection metadata.

use crate::client::LinkedRoleProvider;
use crate::error::LinkResult;
use crate::types::{RoleConnectionMetadata, RoleConnectionPayload};
use rolelink_core::{AttributeStore, ExternalIdentity};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct MetadataPublisher {
    provider: Arc<dyn LinkedRoleProvider>,
    store: Arc<dyn AttributeStore>,
    platform_name: String,
}

impl MetadataPublisher {
    pub fn new(
        provider: Arc<dyn LinkedRoleProvider>,
        store: Arc<dyn AttributeStore>,
        platform_name: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            store,
            platform_name: platform_name.into(),
        }
    }

    /// Read the user's current attributes and replace their role connection.
    ///
    /// A user without a record publishes the defaults. The store is only read,
    /// and it is read before any network call.
    pub async fn publish(
        &self,
        identity: &ExternalIdentity,
        access_token: &str,
    ) -> LinkResult<RoleConnectionMetadata> {
        let fields = self
            .store
            .get(&identity.id)
            .await?
            .map(|record| record.fields())
            .unwrap_or_default();

        let payload = RoleConnectionPayload {
            platform_name: self.platform_name.clone(),
            platform_username: identity.username.clone(),
            metadata: fields.into(),
        };

        self.provider
            .put_role_connection(access_token, &payload)
            .await?;

        debug!(user_id = %identity.id, metadata = ?payload.metadata, "Published role connection");
        Ok(payload.metadata)
    }
}
