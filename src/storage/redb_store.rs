// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded document store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `documents`: composite key `collection/id` → serialized [`StoredDocument`]
//!
//! Collection scans are range scans over the `collection/` prefix. redb
//! serializes write transactions, so a [`WriteBatch`] staged and written
//! inside one write transaction is atomic and isolated.

use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{
    stage_batch, DocumentStore, FindQuery, StoreError, StoreResult, StoredDocument, WriteBatch,
};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: `collection/id` → serialized StoredDocument (JSON bytes).
const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// Health probe table, rewritten by `health_check`.
const HEALTH: TableDefinition<&str, u64> = TableDefinition::new("health");

// =============================================================================
// Error Mapping
// =============================================================================

macro_rules! backend_error {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(e: $ty) -> Self {
                    StoreError::Unavailable(format!("redb: {e}"))
                }
            }
        )+
    };
}

backend_error!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// =============================================================================
// Key Helpers
// =============================================================================

fn make_key(collection: &str, id: &str) -> String {
    format!("{collection}/{id}")
}

/// `[start, end)` bounds covering every key of a collection.
/// `'0'` is the byte after `'/'`, so the end bound excludes other collections.
fn collection_bounds(collection: &str) -> (String, String) {
    (format!("{collection}/"), format!("{collection}0"))
}

// =============================================================================
// RedbStore
// =============================================================================

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("create data dir: {e}")))?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS)?;
            let _ = write_txn.open_table(HEALTH)?;
        }
        write_txn.commit()?;

        tracing::info!(path = %path.display(), "Opened document database");
        Ok(Self { db })
    }

    fn decode(bytes: &[u8]) -> StoreResult<StoredDocument> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl DocumentStore for RedbStore {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        match table.get(make_key(collection, id).as_str())? {
            Some(value) => Ok(Some(Self::decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<(Vec<StoredDocument>, usize)> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        let (start, end) = collection_bounds(collection);

        let mut docs = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let entry = entry?;
            docs.push(Self::decode(entry.1.value())?);
        }

        Ok(query.apply(docs))
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;

            let staged = stage_batch(&batch, |collection, id| {
                // Read existing value and deserialize before mutating
                let existing = table
                    .get(make_key(collection, id).as_str())?
                    .map(|value| value.value().to_vec());
                existing.map(|bytes| Self::decode(&bytes)).transpose()
            })?;

            for ((collection, id), doc) in staged {
                let key = make_key(&collection, &id);
                match doc {
                    Some(doc) => {
                        let json = serde_json::to_vec(&doc)?;
                        table.insert(key.as_str(), json.as_slice())?;
                    }
                    None => {
                        table.remove(key.as_str())?;
                    }
                }
            }
        }
        // Dropping an uncommitted write transaction aborts it, so an error
        // above leaves the database untouched.
        write_txn.commit()?;
        Ok(())
    }

    fn health_check(&self) -> StoreResult<()> {
        let stamp = chrono::Utc::now().timestamp().max(0) as u64;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(HEALTH)?;
            table.insert("last_check", stamp)?;
        }
        write_txn.commit()?;

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HEALTH)?;
        match table.get("last_check")? {
            Some(v) if v.value() == stamp => Ok(()),
            _ => Err(StoreError::Unavailable(
                "health check read-back mismatch".to_string(),
            )),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Filter, SortOrder};
    use serde_json::json;

    fn temp_store() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("portal.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn insert_get_update() {
        let (store, _dir) = temp_store();
        store
            .insert("accounts", "a1", json!({"username": "alice", "total_points": 0}))
            .unwrap();
        store.update("accounts", "a1", json!({"total_points": 10})).unwrap();

        let doc = store.get("accounts", "a1").unwrap().unwrap();
        assert_eq!(doc.version, 2);
        assert_eq!(doc.body["total_points"], 10);
        assert_eq!(doc.body["username"], "alice");
    }

    #[test]
    fn collections_do_not_leak_into_each_other() {
        let (store, _dir) = temp_store();
        store.insert("accounts", "x", json!({})).unwrap();
        store.insert("accounts0", "y", json!({})).unwrap();
        store.insert("account_logins", "alice", json!({"account_id": "x"})).unwrap();

        let (docs, total) = store.find("accounts", &FindQuery::new()).unwrap();
        assert_eq!(total, 1);
        assert_eq!(docs[0].id, "x");
    }

    #[test]
    fn failed_batch_writes_nothing() {
        let (store, _dir) = temp_store();
        store.insert("account_logins", "alice", json!({"account_id": "a1"})).unwrap();

        let batch = WriteBatch::new()
            .insert("accounts", "a2", json!({"username": "alice"}))
            .insert("account_logins", "alice", json!({"account_id": "a2"}));
        let result = store.commit(batch);

        assert!(matches!(result, Err(StoreError::AlreadyExists { .. })));
        assert!(store.get("accounts", "a2").unwrap().is_none());
    }

    #[test]
    fn conditional_update_detects_conflict() {
        let (store, _dir) = temp_store();
        store.insert("accounts", "a1", json!({"n": 0})).unwrap();

        let first = WriteBatch::new().update_if_version("accounts", "a1", json!({"n": 1}), 1);
        store.commit(first).unwrap();

        let stale = WriteBatch::new().update_if_version("accounts", "a1", json!({"n": 9}), 1);
        assert!(store.commit(stale).unwrap_err().is_conflict());
        assert_eq!(store.get("accounts", "a1").unwrap().unwrap().body["n"], 1);
    }

    #[test]
    fn find_sorts_and_paginates() {
        let (store, _dir) = temp_store();
        for seq in 1..=5 {
            store
                .insert(
                    "point_transactions",
                    &format!("t{seq}"),
                    json!({"account_id": "a1", "sequence": seq}),
                )
                .unwrap();
        }
        store
            .insert("point_transactions", "other", json!({"account_id": "a2", "sequence": 1}))
            .unwrap();

        let query = FindQuery::new()
            .with_filter(Filter::new().eq("account_id", "a1"))
            .sort_by("sequence", SortOrder::Descending)
            .skip(1)
            .limit(2);
        let (docs, total) = store.find("point_transactions", &query).unwrap();
        assert_eq!(total, 5);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["t4", "t3"]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.insert("accounts", "a1", json!({"username": "alice"})).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert!(store.get("accounts", "a1").unwrap().is_some());
    }

    #[test]
    fn health_check_passes() {
        let (store, _dir) = temp_store();
        store.health_check().unwrap();
    }
}
