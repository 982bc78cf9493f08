// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-principal dashboard summary.
//!
//! Ledger fields come from the account and its transaction log. Quote and
//! ticket counts come from [`StatusCounter`] collaborators; when one of them
//! fails the count is reported as zero and named in `degraded`.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::{points_to_next_tier, LoyaltyTier};
use crate::storage::collections::{QUOTE_REQUESTS, SUPPORT_TICKETS};
use crate::storage::repository::Page;
use crate::storage::{
    Account, DocumentStore, Filter, PointTransaction, StoreResult, TransactionRepository,
};

/// Default number of recent transactions on the dashboard.
pub const DEFAULT_RECENT_TRANSACTIONS: usize = 10;

pub const QUOTE_CLOSED_STATUSES: [&str; 2] = ["completed", "rejected"];
pub const QUOTE_COMPLETED_STATUS: &str = "completed";
pub const TICKET_CLOSED_STATUSES: [&str; 2] = ["resolved", "closed"];

/// Counts an account's records by status in some external collection.
pub trait StatusCounter: Send + Sync {
    fn count_excluding(&self, account_id: &str, excluded: &[&str]) -> StoreResult<usize>;
    fn count_matching(&self, account_id: &str, status: &str) -> StoreResult<usize>;
}

/// [`StatusCounter`] over a document collection keyed by `user_id` and `status`.
pub struct DocumentStatusCounter {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
}

impl DocumentStatusCounter {
    pub fn new(store: Arc<dyn DocumentStore>, collection: &'static str) -> Self {
        Self { store, collection }
    }

    pub fn quotes(store: Arc<dyn DocumentStore>) -> Self {
        Self::new(store, QUOTE_REQUESTS)
    }

    pub fn tickets(store: Arc<dyn DocumentStore>) -> Self {
        Self::new(store, SUPPORT_TICKETS)
    }
}

impl StatusCounter for DocumentStatusCounter {
    fn count_excluding(&self, account_id: &str, excluded: &[&str]) -> StoreResult<usize> {
        let filter = Filter::new()
            .eq("user_id", account_id)
            .not_in("status", excluded.iter().copied());
        self.store.count(self.collection, &filter)
    }

    fn count_matching(&self, account_id: &str, status: &str) -> StoreResult<usize> {
        let filter = Filter::new().eq("user_id", account_id).eq("status", status);
        self.store.count(self.collection, &filter)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_points: i64,
    pub available_points: i64,
    pub loyalty_tier: LoyaltyTier,
    /// Points missing to the next tier; 0 at platinum
    pub next_tier_points: i64,
    pub active_quotes: usize,
    pub completed_projects: usize,
    pub open_tickets: usize,
    pub recent_transactions: Vec<PointTransaction>,
    /// Counts that could not be computed and are reported as 0
    pub degraded: Vec<String>,
}

impl DashboardSummary {
    /// Summary shown to staff, who do not take part in the loyalty programme.
    fn staff_default() -> Self {
        Self {
            total_points: 0,
            available_points: 0,
            loyalty_tier: LoyaltyTier::Bronze,
            next_tier_points: points_to_next_tier(LoyaltyTier::Bronze, 0),
            active_quotes: 0,
            completed_projects: 0,
            open_tickets: 0,
            recent_transactions: Vec::new(),
            degraded: Vec::new(),
        }
    }
}

pub struct DashboardAggregator {
    store: Arc<dyn DocumentStore>,
    quotes: Arc<dyn StatusCounter>,
    tickets: Arc<dyn StatusCounter>,
    recent_transactions: usize,
}

impl DashboardAggregator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        quotes: Arc<dyn StatusCounter>,
        tickets: Arc<dyn StatusCounter>,
        recent_transactions: usize,
    ) -> Self {
        Self {
            store,
            quotes,
            tickets,
            recent_transactions,
        }
    }

    /// Build the summary for an authenticated principal.
    ///
    /// Store failures on the ledger side propagate; collaborator count
    /// failures degrade.
    pub fn summary_for(&self, account: &Account) -> StoreResult<DashboardSummary> {
        if account.role.is_staff() {
            return Ok(DashboardSummary::staff_default());
        }

        let (recent_transactions, _) = TransactionRepository::new(self.store.as_ref())
            .list_by_account(&account.id, Page::new(0, self.recent_transactions))?;

        let mut degraded = Vec::new();
        let active_quotes = settle(
            "active_quotes",
            &account.id,
            self.quotes
                .count_excluding(&account.id, &QUOTE_CLOSED_STATUSES),
            &mut degraded,
        );
        let completed_projects = settle(
            "completed_projects",
            &account.id,
            self.quotes
                .count_matching(&account.id, QUOTE_COMPLETED_STATUS),
            &mut degraded,
        );
        let open_tickets = settle(
            "open_tickets",
            &account.id,
            self.tickets
                .count_excluding(&account.id, &TICKET_CLOSED_STATUSES),
            &mut degraded,
        );

        Ok(DashboardSummary {
            total_points: account.total_points,
            available_points: account.available_points,
            loyalty_tier: account.loyalty_tier(),
            next_tier_points: account.next_tier_points(),
            active_quotes,
            completed_projects,
            open_tickets,
            recent_transactions,
            degraded,
        })
    }
}

fn settle(
    name: &str,
    account_id: &str,
    result: StoreResult<usize>,
    degraded: &mut Vec<String>,
) -> usize {
    match result {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(error = %e, account_id, count = name, "Dashboard count unavailable");
            degraded.push(name.to_string());
            0
        }
    }
}
