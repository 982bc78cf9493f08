// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Point transaction repository (read side of the ledger).
//!
//! ## Storage Layout
//!
//! ```text
//! point_transactions/{transaction_id}   PointTransaction
//! ```
//!
//! Entries are appended by the ledger inside its account update batch and
//! are never mutated or removed. `sequence` orders the entries of one
//! account (1-based, gap-free).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::collections::POINT_TRANSACTIONS;
use crate::storage::{DocumentStore, Filter, FindQuery, SortOrder, StoreResult, StoredDocument};

use super::Page;

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earned,
    Spent,
    Adjustment,
    Bonus,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Earned => "earned",
            TransactionKind::Spent => "spent",
            TransactionKind::Adjustment => "adjustment",
            TransactionKind::Bonus => "bonus",
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PointTransaction {
    pub id: String,
    pub account_id: String,
    /// Signed point delta
    pub points: i64,
    pub kind: TransactionKind,
    pub description: String,
    /// External reference (quote, ticket, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Account that issued the entry; `None` for system-issued entries
    #[serde(default)]
    pub actor_id: Option<String>,
    /// Position in the account's log
    pub sequence: u64,
    pub created_at: DateTime<Utc>,
}

/// Repository for reading point transactions.
pub struct TransactionRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> TransactionRepository<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// One page of an account's transactions, newest first, with the total count.
    pub fn list_by_account(
        &self,
        account_id: &str,
        page: Page,
    ) -> StoreResult<(Vec<PointTransaction>, usize)> {
        let query = FindQuery::new()
            .with_filter(Filter::new().eq("account_id", account_id))
            .sort_by("sequence", SortOrder::Descending)
            .skip(page.offset)
            .limit(page.limit);
        let (docs, total) = self.store.find(POINT_TRANSACTIONS, &query)?;
        Ok((decode_all(&docs)?, total))
    }

    /// The full log of an account in append order.
    pub fn all_for_account(&self, account_id: &str) -> StoreResult<Vec<PointTransaction>> {
        let query = FindQuery::new()
            .with_filter(Filter::new().eq("account_id", account_id))
            .sort_by("sequence", SortOrder::Ascending);
        let (docs, _) = self.store.find(POINT_TRANSACTIONS, &query)?;
        decode_all(&docs)
    }

    /// Sum of all positive deltas across every account.
    pub fn total_points_distributed(&self) -> StoreResult<i64> {
        let (docs, _) = self.store.find(POINT_TRANSACTIONS, &FindQuery::new())?;
        Ok(decode_all(&docs)?
            .iter()
            .filter(|tx| tx.points > 0)
            .fold(0i64, |sum, tx| sum.saturating_add(tx.points)))
    }
}

fn decode_all(docs: &[StoredDocument]) -> StoreResult<Vec<PointTransaction>> {
    docs.iter().map(|doc| doc.decode()).collect()
}
