// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The loyalty points ledger.
//!
//! Every balance change appends exactly one [`PointTransaction`] and rewrites
//! the cached balance on the account in the same [`WriteBatch`]. The batch
//! carries the account version it was computed from; when another writer got
//! there first the store reports a conflict and the grant is recomputed from
//! fresh state, up to `max_retries` attempts.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use super::tier::{tier_of, LoyaltyTier};
use crate::storage::collections::{ACCOUNTS, POINT_TRANSACTIONS};
use crate::storage::repository::Page;
use crate::storage::{
    Account, AccountRepository, DocumentStore, PointTransaction, StoreError, TransactionKind,
    TransactionRepository, WriteBatch,
};

/// Default optimistic retry budget.
pub const DEFAULT_MAX_RETRIES: u32 = 32;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("ledger update for {account_id} lost {attempts} concurrent races")]
    Conflict { account_id: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A requested balance change.
#[derive(Debug, Clone)]
pub struct PointGrant {
    pub account_id: String,
    pub delta: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub actor_id: Option<String>,
    pub reference_id: Option<String>,
}

impl PointGrant {
    pub fn new(
        account_id: impl Into<String>,
        delta: i64,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            delta,
            kind,
            description: description.into(),
            actor_id: None,
            reference_id: None,
        }
    }

    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }
}

/// Balance after a committed grant.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GrantOutcome {
    pub total_points: i64,
    pub available_points: i64,
    pub loyalty_tier: LoyaltyTier,
    pub transaction: PointTransaction,
}

/// Balance recomputed from the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LedgerBalance {
    pub total_points: i64,
    pub available_points: i64,
    pub entries: u64,
}

impl LedgerBalance {
    fn cached(account: &Account) -> Self {
        Self {
            total_points: account.total_points,
            available_points: account.available_points,
            entries: account.ledger_entries,
        }
    }

    /// Apply one delta with the ledger's clamping rule.
    fn apply(self, delta: i64) -> Self {
        Self {
            total_points: self.total_points.saturating_add(delta),
            available_points: self.available_points.saturating_add(delta).max(0),
            entries: self.entries + 1,
        }
    }
}

/// Result of comparing the cached balance with the replayed log.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileOutcome {
    pub cached: LedgerBalance,
    pub replayed: LedgerBalance,
    /// Whether the cached fields were rewritten.
    pub repaired: bool,
}

/// Append-only points ledger over the document store.
pub struct LoyaltyLedger {
    store: Arc<dyn DocumentStore>,
    max_retries: u32,
}

impl LoyaltyLedger {
    pub fn new(store: Arc<dyn DocumentStore>, max_retries: u32) -> Self {
        Self {
            store,
            max_retries: max_retries.max(1),
        }
    }

    fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(self.store.as_ref())
    }

    /// Apply a signed delta to an account and append its transaction.
    ///
    /// `available_points` is clamped at zero; `total_points` is not.
    pub fn grant_points(&self, grant: PointGrant) -> Result<GrantOutcome, LedgerError> {
        let delta = grant.delta;
        self.append(&grant, |_| delta)
    }

    /// Move `total_points` to the floor of `tier` with an `adjustment` entry.
    ///
    /// A zero-delta adjustment is still recorded when the account already
    /// sits on the floor.
    pub fn override_tier(
        &self,
        account_id: &str,
        tier: LoyaltyTier,
        actor_id: Option<&str>,
        reason: &str,
    ) -> Result<GrantOutcome, LedgerError> {
        let grant = PointGrant {
            account_id: account_id.to_string(),
            delta: 0,
            kind: TransactionKind::Adjustment,
            description: format!("Tier set to {tier}: {reason}"),
            actor_id: actor_id.map(str::to_string),
            reference_id: None,
        };
        let floor = tier.floor();
        self.append(&grant, |account| floor.saturating_sub(account.total_points))
    }

    fn append(
        &self,
        grant: &PointGrant,
        delta_for: impl Fn(&Account) -> i64,
    ) -> Result<GrantOutcome, LedgerError> {
        let account_id = grant.account_id.as_str();

        for attempt in 1..=self.max_retries {
            let (account, version) = self
                .accounts()
                .get_versioned(account_id)?
                .ok_or_else(|| LedgerError::NotFound(account_id.to_string()))?;

            let delta = delta_for(&account);
            let next = LedgerBalance::cached(&account).apply(delta);

            let transaction = PointTransaction {
                id: uuid::Uuid::new_v4().to_string(),
                account_id: account_id.to_string(),
                points: delta,
                kind: grant.kind,
                description: grant.description.clone(),
                reference_id: grant.reference_id.clone(),
                actor_id: grant.actor_id.clone(),
                sequence: next.entries,
                created_at: Utc::now(),
            };

            let batch = WriteBatch::new()
                .update_if_version(
                    ACCOUNTS,
                    account_id,
                    json!({
                        "total_points": next.total_points,
                        "available_points": next.available_points,
                        "ledger_entries": next.entries,
                    }),
                    version,
                )
                .insert(
                    POINT_TRANSACTIONS,
                    &transaction.id,
                    serde_json::to_value(&transaction).map_err(StoreError::from)?,
                );

            match self.store.commit(batch) {
                Ok(()) => {
                    tracing::info!(
                        account_id,
                        delta,
                        kind = grant.kind.as_str(),
                        total_points = next.total_points,
                        attempt,
                        "Points ledger updated"
                    );
                    return Ok(GrantOutcome {
                        total_points: next.total_points,
                        available_points: next.available_points,
                        loyalty_tier: tier_of(next.total_points),
                        transaction,
                    });
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(account_id, attempt, "Ledger write raced, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(
            account_id,
            attempts = self.max_retries,
            "Ledger retry budget exhausted"
        );
        Err(LedgerError::Conflict {
            account_id: account_id.to_string(),
            attempts: self.max_retries,
        })
    }

    /// One page of an account's transactions, newest first.
    pub fn list_transactions(
        &self,
        account_id: &str,
        page: Page,
    ) -> Result<(Vec<PointTransaction>, usize), LedgerError> {
        if self.accounts().get(account_id)?.is_none() {
            return Err(LedgerError::NotFound(account_id.to_string()));
        }
        Ok(TransactionRepository::new(self.store.as_ref()).list_by_account(account_id, page)?)
    }

    /// Recompute the balance by folding the log in sequence order.
    pub fn replay(&self, account_id: &str) -> Result<LedgerBalance, LedgerError> {
        if self.accounts().get(account_id)?.is_none() {
            return Err(LedgerError::NotFound(account_id.to_string()));
        }
        self.fold_log(account_id)
    }

    fn fold_log(&self, account_id: &str) -> Result<LedgerBalance, LedgerError> {
        let log = TransactionRepository::new(self.store.as_ref()).all_for_account(account_id)?;
        let empty = LedgerBalance {
            total_points: 0,
            available_points: 0,
            entries: 0,
        };
        Ok(log.iter().fold(empty, |balance, tx| balance.apply(tx.points)))
    }

    /// Compare the cached balance with the replayed log and repair the cache
    /// when they disagree.
    pub fn reconcile(&self, account_id: &str) -> Result<ReconcileOutcome, LedgerError> {
        for attempt in 1..=self.max_retries {
            // Account first: a grant landing after this read bumps the version
            // and the repair below conflicts instead of losing it.
            let (account, version) = self
                .accounts()
                .get_versioned(account_id)?
                .ok_or_else(|| LedgerError::NotFound(account_id.to_string()))?;
            let cached = LedgerBalance::cached(&account);
            let replayed = self.fold_log(account_id)?;

            if cached == replayed {
                return Ok(ReconcileOutcome {
                    cached,
                    replayed,
                    repaired: false,
                });
            }

            let batch = WriteBatch::new().update_if_version(
                ACCOUNTS,
                account_id,
                json!({
                    "total_points": replayed.total_points,
                    "available_points": replayed.available_points,
                    "ledger_entries": replayed.entries,
                }),
                version,
            );
            match self.store.commit(batch) {
                Ok(()) => {
                    tracing::warn!(
                        account_id,
                        cached_total = cached.total_points,
                        replayed_total = replayed.total_points,
                        "Repaired cached ledger balance"
                    );
                    return Ok(ReconcileOutcome {
                        cached,
                        replayed,
                        repaired: true,
                    });
                }
                Err(e) if e.is_conflict() => {
                    tracing::debug!(account_id, attempt, "Reconcile raced, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::Conflict {
            account_id: account_id.to_string(),
            attempts: self.max_retries,
        })
    }
}
