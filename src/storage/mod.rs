// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Document Storage Module
//!
//! Persistence is consumed through the [`DocumentStore`] trait: a small
//! collection/id keyed JSON document store with filtered queries and an
//! atomic multi-write [`WriteBatch`]. Components receive an
//! `Arc<dyn DocumentStore>` at construction; there is no process-wide handle.
//!
//! ## Implementations
//!
//! - [`RedbStore`] - embedded ACID database (pure Rust), used in production
//! - [`MemoryStore`] - in-process maps, used by tests and `STORAGE_BACKEND=memory`
//!
//! ## Collections
//!
//! ```text
//! accounts            {account_id}      Account documents
//! account_logins      {username}        -> account_id (uniqueness index)
//! account_emails      {email}           -> account_id (uniqueness index)
//! point_transactions  {transaction_id}  append-only ledger entries
//! audit_events        {event_id}        audit trail
//! notifications       {notification_id} notification feed (written only)
//! quote_requests      {quote_id}        read-only (dashboard counts)
//! support_tickets     {ticket_id}       read-only (dashboard counts)
//! ```
//!
//! ## Versions
//!
//! Every stored document carries a version that starts at 1 and increases on
//! each write. A [`WriteOp::Update`] may require an expected version; a
//! mismatch fails the whole batch with [`StoreError::Conflict`] and nothing
//! is written. The ledger builds its optimistic retry loop on this.

pub mod audit;
pub mod memory;
pub mod query;
pub mod redb_store;
pub mod repository;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use audit::{AuditEvent, AuditEventType, AuditQuery, AuditRepository};
pub use memory::MemoryStore;
pub use query::{Condition, Filter, FindQuery, SortOrder};
pub use redb_store::RedbStore;
pub use repository::{
    Account, AccountRepository, AccountResponse, Page, PointTransaction, ProfileChange,
    TransactionKind, TransactionRepository,
};

/// Collection names.
pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    pub const ACCOUNT_LOGINS: &str = "account_logins";
    pub const ACCOUNT_EMAILS: &str = "account_emails";
    pub const POINT_TRANSACTIONS: &str = "point_transactions";
    pub const AUDIT_EVENTS: &str = "audit_events";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const QUOTE_REQUESTS: &str = "quote_requests";
    pub const SUPPORT_TICKETS: &str = "support_tickets";
}

/// Error type for document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("version conflict on {collection}/{id}")]
    Conflict { collection: String, id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn already_exists(collection: &str, id: &str) -> Self {
        StoreError::AlreadyExists {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(collection: &str, id: &str) -> Self {
        StoreError::Conflict {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Whether the error is a lost optimistic race (safe to retry).
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A document as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: String,
    pub version: u64,
    pub body: Value,
}

impl StoredDocument {
    /// Deserialize the body into a typed value.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create a new document; fails with `AlreadyExists` if the id is taken.
    Insert {
        collection: String,
        id: String,
        body: Value,
    },
    /// Shallow-merge `patch` into an existing document.
    Update {
        collection: String,
        id: String,
        patch: Value,
        expected_version: Option<u64>,
    },
    /// Remove a document (used for index entries only; ledger entries are never removed).
    Remove { collection: String, id: String },
}

/// An ordered set of writes committed all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, collection: &str, id: impl Into<String>, body: Value) -> Self {
        self.ops.push(WriteOp::Insert {
            collection: collection.to_string(),
            id: id.into(),
            body,
        });
        self
    }

    pub fn update(mut self, collection: &str, id: impl Into<String>, patch: Value) -> Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.into(),
            patch,
            expected_version: None,
        });
        self
    }

    /// Update that only applies if the stored version still equals `expected_version`.
    pub fn update_if_version(
        mut self,
        collection: &str,
        id: impl Into<String>,
        patch: Value,
        expected_version: u64,
    ) -> Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.into(),
            patch,
            expected_version: Some(expected_version),
        });
        self
    }

    pub fn remove(mut self, collection: &str, id: impl Into<String>) -> Self {
        self.ops.push(WriteOp::Remove {
            collection: collection.to_string(),
            id: id.into(),
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Abstract document/record store consumed by every component.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id. `Ok(None)` when absent.
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>>;

    /// Filtered, sorted, paginated query. Returns the page and the total match count.
    fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<(Vec<StoredDocument>, usize)>;

    /// Commit a batch atomically.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Insert a single document.
    fn insert(&self, collection: &str, id: &str, body: Value) -> StoreResult<()> {
        self.commit(WriteBatch::new().insert(collection, id, body))
    }

    /// Shallow-merge a partial document into an existing one.
    fn update(&self, collection: &str, id: &str, patch: Value) -> StoreResult<()> {
        self.commit(WriteBatch::new().update(collection, id, patch))
    }

    /// Count matching documents.
    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<usize> {
        let query = FindQuery::new().with_filter(filter.clone()).limit(0);
        self.find(collection, &query).map(|(_, total)| total)
    }

    /// Cheap liveness probe of the backend.
    fn health_check(&self) -> StoreResult<()>;
}

/// Final state of one document after staging a batch (`None` = removed).
pub(crate) type StagedWrite = ((String, String), Option<StoredDocument>);

/// Validate and apply a batch against a read-through view of the store.
///
/// Nothing is written here; the caller persists the returned states inside
/// its own transaction or lock. Any failing op aborts the whole batch.
pub(crate) fn stage_batch(
    batch: &WriteBatch,
    mut load: impl FnMut(&str, &str) -> StoreResult<Option<StoredDocument>>,
) -> StoreResult<Vec<StagedWrite>> {
    let mut staged: std::collections::BTreeMap<(String, String), Option<StoredDocument>> =
        std::collections::BTreeMap::new();

    for op in batch.ops() {
        match op {
            WriteOp::Insert {
                collection,
                id,
                body,
            } => {
                let key = (collection.clone(), id.clone());
                let current = match staged.get(&key) {
                    Some(doc) => doc.clone(),
                    None => load(collection, id)?,
                };
                if current.is_some() {
                    return Err(StoreError::already_exists(collection, id));
                }
                if !body.is_object() {
                    return Err(StoreError::InvalidDocument(format!(
                        "{collection}/{id} must be a JSON object"
                    )));
                }
                staged.insert(
                    key,
                    Some(StoredDocument {
                        id: id.clone(),
                        version: 1,
                        body: body.clone(),
                    }),
                );
            }
            WriteOp::Update {
                collection,
                id,
                patch,
                expected_version,
            } => {
                let key = (collection.clone(), id.clone());
                let current = match staged.get(&key) {
                    Some(doc) => doc.clone(),
                    None => load(collection, id)?,
                };
                let mut doc = current.ok_or_else(|| StoreError::not_found(collection, id))?;
                if let Some(expected) = expected_version {
                    if doc.version != *expected {
                        return Err(StoreError::conflict(collection, id));
                    }
                }
                merge_patch(&mut doc.body, patch)?;
                doc.version += 1;
                staged.insert(key, Some(doc));
            }
            WriteOp::Remove { collection, id } => {
                staged.insert((collection.clone(), id.clone()), None);
            }
        }
    }

    Ok(staged.into_iter().collect())
}

/// Shallow merge of `patch` object keys into `target`.
pub(crate) fn merge_patch(target: &mut Value, patch: &Value) -> StoreResult<()> {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
            Ok(())
        }
        _ => Err(StoreError::InvalidDocument(
            "documents and patches must be JSON objects".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_patch_overwrites_top_level_keys() {
        let mut doc = json!({"a": 1, "b": {"x": 1}});
        merge_patch(&mut doc, &json!({"b": {"y": 2}, "c": true})).unwrap();
        assert_eq!(doc, json!({"a": 1, "b": {"y": 2}, "c": true}));
    }

    #[test]
    fn merge_patch_rejects_non_objects() {
        let mut doc = json!([1, 2]);
        let result = merge_patch(&mut doc, &json!({"a": 1}));
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    }

    #[test]
    fn batch_builder_preserves_order() {
        let batch = WriteBatch::new()
            .update_if_version("accounts", "a1", json!({"x": 1}), 3)
            .insert("point_transactions", "t1", json!({}));
        assert_eq!(batch.ops().len(), 2);
        assert!(matches!(
            batch.ops()[0],
            WriteOp::Update {
                expected_version: Some(3),
                ..
            }
        ));
        assert!(matches!(batch.ops()[1], WriteOp::Insert { .. }));
    }
}
