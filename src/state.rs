// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use chrono::Duration;

use crate::accounts::AccountService;
use crate::auth::{CredentialStore, TokenService};
use crate::config::AppConfig;
use crate::dashboard::{DashboardAggregator, DocumentStatusCounter};
use crate::ledger::LoyaltyLedger;
use crate::notifications::StoreNotificationSink;
use crate::storage::DocumentStore;

/// Shared application state.
///
/// Every component receives the same store handle at construction.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub tokens: TokenService,
    pub credentials: CredentialStore,
    pub ledger: Arc<LoyaltyLedger>,
    pub dashboard: Arc<DashboardAggregator>,
    pub accounts: Arc<AccountService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig) -> Self {
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            Duration::minutes(config.access_ttl_minutes),
            Duration::days(config.refresh_ttl_days),
        );
        let dashboard = DashboardAggregator::new(
            store.clone(),
            Arc::new(DocumentStatusCounter::quotes(store.clone())),
            Arc::new(DocumentStatusCounter::tickets(store.clone())),
            config.dashboard_recent_transactions,
        );
        let accounts = AccountService::new(
            store.clone(),
            Arc::new(StoreNotificationSink::new(store.clone())),
        );

        Self {
            credentials: CredentialStore::new(store.clone()),
            ledger: Arc::new(LoyaltyLedger::new(store.clone(), config.ledger_max_retries)),
            dashboard: Arc::new(dashboard),
            accounts: Arc::new(accounts),
            tokens,
            config: Arc::new(config),
            store,
        }
    }

    /// Borrow the store for repositories and the `audit_log!` macro.
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
impl AppState {
    /// State over a fresh in-memory store.
    pub(crate) fn in_memory() -> Self {
        Self::new(
            Arc::new(crate::storage::MemoryStore::new()),
            AppConfig::for_tests(),
        )
    }
}
