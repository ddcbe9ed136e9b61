use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rolelink_core::{AttributeFields, AttributeStore, StoreResult, UserAttributes};
use std::sync::Arc;

/// In-memory attribute store backed by a [`DashMap`].
///
/// Upserts go through the per-key `entry` API, which holds the shard lock for
/// the whole update.
#[derive(Clone, Default)]
pub struct InMemoryAttributeStore {
    records: Arc<DashMap<String, UserAttributes>>,
}

impl InMemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AttributeStore for InMemoryAttributeStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<UserAttributes>> {
        Ok(self.records.get(user_id).map(|record| record.value().clone()))
    }

    async fn upsert(
        &self,
        user_id: &str,
        fields: AttributeFields,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.records
            .entry(user_id.to_string())
            .and_modify(|record| record.apply(fields, timestamp))
            .or_insert_with(|| UserAttributes::new(user_id, fields, timestamp));

        Ok(true)
    }
}
