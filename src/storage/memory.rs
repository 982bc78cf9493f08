// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory document store.
//!
//! Used by tests and by `STORAGE_BACKEND=memory` for ephemeral deployments.
//! A single `RwLock` guards all collections, so a batch commit is atomic with
//! respect to every concurrent reader and writer.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::{
    stage_batch, DocumentStore, FindQuery, StoreError, StoreResult, StoredDocument, WriteBatch,
};

type Collections = HashMap<String, BTreeMap<String, StoredDocument>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<(Vec<StoredDocument>, usize)> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        let docs = collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        Ok(query.apply(docs))
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;

        let staged = stage_batch(&batch, |collection, id| {
            Ok(collections
                .get(collection)
                .and_then(|docs| docs.get(id))
                .cloned())
        })?;

        for ((collection, id), doc) in staged {
            let docs = collections.entry(collection).or_default();
            match doc {
                Some(doc) => {
                    docs.insert(id, doc);
                }
                None => {
                    docs.remove(&id);
                }
            }
        }
        Ok(())
    }

    fn health_check(&self) -> StoreResult<()> {
        self.collections
            .read()
            .map(|_| ())
            .map_err(|_| Self::poisoned())
    }
}
