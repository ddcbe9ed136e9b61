//! Attribute store backends.
//!
//! Both backends implement [`rolelink_core::AttributeStore`] and perform each
//! upsert as a single critical section, so concurrent writers for the same user
//! never lose updates.

mod json_file;
mod memory;

pub use json_file::JsonFileAttributeStore;
pub use memory::InMemoryAttributeStore;

pub use rolelink_core::{AttributeFields, AttributeStore, StoreError, StoreResult, UserAttributes};
