// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client portal endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{ClientOnly, PremiumClientOnly},
    dashboard::DashboardSummary,
    error::ApiError,
    ledger::LoyaltyTier,
    state::AppState,
    storage::{repository::DEFAULT_PAGE_SIZE, Page, PointTransaction},
};

/// Limit/offset query parameters.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageParams {
    /// Maximum number of results (default 20, max 100).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

impl PageParams {
    pub fn page(&self) -> Page {
        Page::new(
            self.offset.unwrap_or(0),
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }
}

/// A page of point transactions, newest first.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionHistoryResponse {
    pub transactions: Vec<PointTransaction>,
    /// Total count (before limit/offset).
    pub total: usize,
    pub has_more: bool,
}

impl TransactionHistoryResponse {
    pub fn new(transactions: Vec<PointTransaction>, total: usize, page: Page) -> Self {
        Self {
            has_more: page.offset + transactions.len() < total,
            transactions,
            total,
        }
    }
}

/// Ledger summary for premium clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct PremiumSummary {
    pub loyalty_tier: LoyaltyTier,
    pub total_points: i64,
    pub available_points: i64,
    pub next_tier_points: i64,
    pub perks: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/v1/client/dashboard",
    tag = "Client",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Client role required"),
    )
)]
pub async fn dashboard(
    ClientOnly(account): ClientOnly,
    State(state): State<AppState>,
) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(state.dashboard.summary_for(&account)?))
}

#[utoipa::path(
    get,
    path = "/v1/client/points/history",
    tag = "Client",
    params(PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own point transactions", body = TransactionHistoryResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Client role required"),
    )
)]
pub async fn points_history(
    ClientOnly(account): ClientOnly,
    Query(params): Query<PageParams>,
    State(state): State<AppState>,
) -> Result<Json<TransactionHistoryResponse>, ApiError> {
    let page = params.page();
    let (transactions, total) = state.ledger.list_transactions(&account.id, page)?;
    Ok(Json(TransactionHistoryResponse::new(transactions, total, page)))
}

#[utoipa::path(
    get,
    path = "/v1/client/premium",
    tag = "Client",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Premium ledger summary", body = PremiumSummary),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Premium client role required"),
    )
)]
pub async fn premium(PremiumClientOnly(account): PremiumClientOnly) -> Json<PremiumSummary> {
    let tier = account.loyalty_tier();
    Json(PremiumSummary {
        loyalty_tier: tier,
        total_points: account.total_points,
        available_points: account.available_points,
        next_tier_points: account.next_tier_points(),
        perks: tier.perks().iter().map(|p| p.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::ledger::PointGrant;
    use crate::storage::{Account, AccountRepository, TransactionKind};

    fn client(state: &AppState, role: Role) -> Account {
        let account = Account::new("carol", "carol@example.com", "Carol", role, "hash".into());
        AccountRepository::new(state.store()).create(&account).unwrap();
        account
    }

    fn grant(state: &AppState, account: &Account, delta: i64) -> Account {
        state
            .ledger
            .grant_points(PointGrant::new(&account.id, delta, TransactionKind::Earned, "test"))
            .unwrap();
        state.accounts.get(&account.id).unwrap()
    }

    #[tokio::test]
    async fn dashboard_reports_platinum_after_large_grant() {
        let state = AppState::in_memory();
        let account = client(&state, Role::ClientStandard);
        let account = grant(&state, &account, 8000);

        let Json(summary) = dashboard(ClientOnly(account), State(state)).await.unwrap();
        assert_eq!(summary.total_points, 8000);
        assert_eq!(summary.loyalty_tier, LoyaltyTier::Platinum);

        let body = serde_json::to_value(&summary).unwrap();
        assert_eq!(body["next_tier_points"], 0);
        assert_eq!(body["recent_transactions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_paginated_newest_first() {
        let state = AppState::in_memory();
        let account = client(&state, Role::ClientStandard);
        for delta in [10, 20, 30] {
            grant(&state, &account, delta);
        }

        let params = PageParams {
            limit: Some(2),
            offset: None,
        };
        let Json(history) = points_history(ClientOnly(account), Query(params), State(state))
            .await
            .unwrap();

        assert_eq!(history.total, 3);
        assert!(history.has_more);
        let points: Vec<i64> = history.transactions.iter().map(|t| t.points).collect();
        assert_eq!(points, vec![30, 20]);
    }

    #[test]
    fn page_params_cap_limit() {
        let params = PageParams {
            limit: Some(10_000),
            offset: Some(5),
        };
        assert_eq!(params.page(), Page::new(5, 100));
        assert_eq!(PageParams::default().page(), Page::default());
    }

    #[tokio::test]
    async fn premium_lists_tier_perks() {
        let state = AppState::in_memory();
        let account = client(&state, Role::ClientPremium);
        let account = grant(&state, &account, 2500);

        let Json(summary) = premium(PremiumClientOnly(account)).await;
        assert_eq!(summary.loyalty_tier, LoyaltyTier::Gold);
        assert_eq!(summary.next_tier_points, 2500);
        assert!(!summary.perks.is_empty());
    }
}
