// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints for portal management.
//!
//! These endpoints require the `admin` capability (admin or moderator) and
//! provide:
//! - Account listing, creation, profile and status changes
//! - Point grants, tier overrides and ledger reconciliation
//! - Client statistics
//! - Audit log queries

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use super::client::{PageParams, TransactionHistoryResponse};
use crate::{
    accounts::{AccountFilter, ClientStats, NewAccount, RoleFilter},
    audit_log,
    auth::{AdminOnly, Role},
    error::ApiError,
    ledger::{GrantOutcome, LoyaltyTier, PointGrant, ReconcileOutcome},
    state::AppState,
    storage::{
        AccountResponse, AuditEvent, AuditEventType, AuditQuery, AuditRepository, Page,
        ProfileChange, TransactionKind,
    },
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the account list.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AccountListParams {
    /// Role name, or `client` for every client role and prospects.
    pub role: Option<String>,
    /// Filter by active flag.
    pub active: Option<bool>,
    /// Case-insensitive match on username, email or full name.
    pub search: Option<String>,
    /// Maximum number of results (default 20, max 100).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountListResponse {
    pub accounts: Vec<AccountResponse>,
    /// Total count (before limit/offset).
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Fields left out are unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub is_active: bool,
}

/// A signed point delta for one account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantPointsRequest {
    /// Signed delta. Zero is recorded like any other entry.
    pub points: i64,
    /// Defaults to `earned` for a positive delta and `spent` otherwise.
    pub kind: Option<TransactionKind>,
    pub description: String,
    pub reference_id: Option<String>,
}

impl GrantPointsRequest {
    fn kind(&self) -> TransactionKind {
        match self.kind {
            Some(kind) => kind,
            None if self.points > 0 => TransactionKind::Earned,
            None => TransactionKind::Spent,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TierOverrideRequest {
    pub tier: LoyaltyTier,
    pub reason: String,
}

/// Query parameters for audit log queries.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Filter by user ID.
    pub user_id: Option<String>,
    /// Filter by event type (e.g. `auth_failure`).
    pub event_type: Option<String>,
    /// Filter by resource ID.
    pub resource_id: Option<String>,
    /// Maximum number of results (default 20, max 100).
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Audit events matching the query, newest first.
    pub events: Vec<AuditEvent>,
    /// Total count (before limit/offset).
    pub total: usize,
    /// Whether there are more results.
    pub has_more: bool,
}

fn page_from(offset: Option<usize>, limit: Option<usize>) -> Page {
    PageParams { limit, offset }.page()
}

fn parse_event_type(raw: &str) -> Result<AuditEventType, ApiError> {
    serde_json::from_value(json!(raw))
        .map_err(|_| ApiError::bad_request(format!("Unknown event type: {raw}")))
}

// ============================================================================
// Accounts
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/accounts",
    tag = "Admin",
    params(AccountListParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Accounts, newest first", body = AccountListResponse),
        (status = 400, description = "Unknown role filter"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_accounts(
    AdminOnly(admin): AdminOnly,
    Query(params): Query<AccountListParams>,
    State(state): State<AppState>,
) -> Result<Json<AccountListResponse>, ApiError> {
    let role = params
        .role
        .as_deref()
        .map(|raw| {
            RoleFilter::parse(raw).ok_or_else(|| ApiError::bad_request(format!("Unknown role: {raw}")))
        })
        .transpose()?;
    let page = page_from(params.offset, params.limit);
    let filter = AccountFilter {
        role,
        active: params.active,
        search: params.search,
        page,
    };

    let (accounts, total) = state.accounts.list_accounts(&filter)?;
    audit_log!(state.store(), AuditEventType::AdminAccess, admin);

    Ok(Json(AccountListResponse {
        has_more: page.offset + accounts.len() < total,
        accounts: accounts.into_iter().map(AccountResponse::from).collect(),
        total,
    }))
}

/// Create an account with any role.
#[utoipa::path(
    post,
    path = "/v1/admin/accounts",
    tag = "Admin",
    request_body = CreateAccountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already registered"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn create_account(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = state.accounts.create_account(NewAccount {
        username: request.username,
        email: request.email,
        full_name: request.full_name,
        password: request.password,
        role: request.role,
    })?;

    audit_log!(
        state.store(),
        AuditEventType::AccountCreated,
        admin,
        "account",
        &account.id
    );
    Ok((StatusCode::CREATED, Json(account.into())))
}

#[utoipa::path(
    put,
    path = "/v1/admin/accounts/{id}",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated account", body = AccountResponse),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Email already registered"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn update_account(
    AdminOnly(admin): AdminOnly,
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let change = ProfileChange {
        full_name: request.full_name,
        email: request.email,
        role: request.role,
    };
    let account = state.accounts.update_account(&account_id, change)?;

    audit_log!(
        state.store(),
        AuditEventType::AccountUpdated,
        admin,
        "account",
        &account.id
    );
    Ok(Json(account.into()))
}

/// Activate or deactivate an account. Admins cannot deactivate themselves.
#[utoipa::path(
    put,
    path = "/v1/admin/accounts/{id}/status",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    request_body = UpdateStatusRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated account", body = AccountResponse),
        (status = 400, description = "Self-deactivation"),
        (status = 404, description = "Account not found"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn update_status(
    AdminOnly(admin): AdminOnly,
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .accounts
        .set_active(&account_id, request.is_active, &admin.id)?;

    let event = AuditEvent::new(AuditEventType::AccountStatusChanged)
        .with_user(&admin.id)
        .with_resource("account", &account.id)
        .with_details(json!({ "is_active": request.is_active }));
    AuditRepository::new(state.store()).log_best_effort(&event);

    Ok(Json(account.into()))
}

// ============================================================================
// Ledger
// ============================================================================

#[utoipa::path(
    post,
    path = "/v1/admin/accounts/{id}/points",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    request_body = GrantPointsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Balance after the grant", body = GrantOutcome),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Ledger busy, retry"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn grant_points(
    AdminOnly(admin): AdminOnly,
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<GrantPointsRequest>,
) -> Result<Json<GrantOutcome>, ApiError> {
    let kind = request.kind();
    let mut grant = PointGrant::new(&account_id, request.points, kind, request.description)
        .by(&admin.id);
    if let Some(reference_id) = request.reference_id {
        grant = grant.with_reference(reference_id);
    }
    let outcome = state.ledger.grant_points(grant)?;

    let event = AuditEvent::new(AuditEventType::PointsGranted)
        .with_user(&admin.id)
        .with_resource("account", &account_id)
        .with_details(json!({
            "points": request.points,
            "kind": kind,
            "transaction_id": outcome.transaction.id,
        }));
    AuditRepository::new(state.store()).log_best_effort(&event);

    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/v1/admin/accounts/{id}/points",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID"), PageParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Account transactions, newest first", body = TransactionHistoryResponse),
        (status = 404, description = "Account not found"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn account_points_history(
    AdminOnly(admin): AdminOnly,
    Path(account_id): Path<String>,
    Query(params): Query<PageParams>,
    State(state): State<AppState>,
) -> Result<Json<TransactionHistoryResponse>, ApiError> {
    let page = params.page();
    let (transactions, total) = state.ledger.list_transactions(&account_id, page)?;
    audit_log!(
        state.store(),
        AuditEventType::AdminAccess,
        admin,
        "account",
        &account_id
    );
    Ok(Json(TransactionHistoryResponse::new(transactions, total, page)))
}

/// Move an account to the floor of a tier with an adjustment entry.
#[utoipa::path(
    put,
    path = "/v1/admin/accounts/{id}/tier",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    request_body = TierOverrideRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Balance after the override", body = GrantOutcome),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Ledger busy, retry"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn override_tier(
    AdminOnly(admin): AdminOnly,
    Path(account_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<TierOverrideRequest>,
) -> Result<Json<GrantOutcome>, ApiError> {
    let outcome = state
        .ledger
        .override_tier(&account_id, request.tier, Some(admin.id.as_str()), &request.reason)?;

    let event = AuditEvent::new(AuditEventType::TierOverridden)
        .with_user(&admin.id)
        .with_resource("account", &account_id)
        .with_details(json!({
            "tier": request.tier,
            "points": outcome.transaction.points,
        }));
    AuditRepository::new(state.store()).log_best_effort(&event);

    Ok(Json(outcome))
}

/// Replay the account's log and repair the cached balance if it drifted.
#[utoipa::path(
    post,
    path = "/v1/admin/accounts/{id}/reconcile",
    tag = "Admin",
    params(("id" = String, Path, description = "Account ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cached and replayed balances", body = ReconcileOutcome),
        (status = 404, description = "Account not found"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn reconcile(
    AdminOnly(admin): AdminOnly,
    Path(account_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let outcome = state.ledger.reconcile(&account_id)?;

    let event = AuditEvent::new(AuditEventType::LedgerReconciled)
        .with_user(&admin.id)
        .with_resource("account", &account_id)
        .with_details(json!({ "repaired": outcome.repaired }));
    AuditRepository::new(state.store()).log_best_effort(&event);

    Ok(Json(outcome))
}

// ============================================================================
// Statistics and audit
// ============================================================================

#[utoipa::path(
    get,
    path = "/v1/admin/stats",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Client statistics", body = ClientStats),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn client_stats(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
) -> Result<Json<ClientStats>, ApiError> {
    let stats = state.accounts.client_stats()?;
    audit_log!(state.store(), AuditEventType::AdminAccess, admin);
    Ok(Json(stats))
}

#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn query_audit_log(
    AdminOnly(admin): AdminOnly,
    Query(params): Query<AuditQueryParams>,
    State(state): State<AppState>,
) -> Result<Json<AuditLogResponse>, ApiError> {
    let event_type = params.event_type.as_deref().map(parse_event_type).transpose()?;
    let page = page_from(params.offset, params.limit);
    let query = AuditQuery {
        user_id: params.user_id,
        event_type,
        resource_id: params.resource_id,
        page,
    };

    let repo = AuditRepository::new(state.store());
    let (events, total) = repo.query(&query)?;

    // Logged after the query so the page does not include this access.
    audit_log!(state.store(), AuditEventType::AdminAccess, admin);

    Ok(Json(AuditLogResponse {
        has_more: page.offset + events.len() < total,
        events,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Account, AccountRepository};

    fn seed(state: &AppState, username: &str, role: Role) -> Account {
        let account = Account::new(
            username,
            format!("{username}@example.com"),
            username,
            role,
            "hash".into(),
        );
        AccountRepository::new(state.store()).create(&account).unwrap();
        account
    }

    fn grant_request(points: i64) -> GrantPointsRequest {
        GrantPointsRequest {
            points,
            kind: Some(TransactionKind::Earned),
            description: "Project completed".to_string(),
            reference_id: Some("quote-7".to_string()),
        }
    }

    #[tokio::test]
    async fn grant_points_records_actor_and_audits() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);
        let client = seed(&state, "client", Role::ClientStandard);

        let Json(outcome) = grant_points(
            AdminOnly(admin.clone()),
            Path(client.id.clone()),
            State(state.clone()),
            Json(grant_request(600)),
        )
        .await
        .unwrap();

        assert_eq!(outcome.total_points, 600);
        assert_eq!(outcome.loyalty_tier, LoyaltyTier::Silver);
        assert_eq!(outcome.transaction.actor_id.as_deref(), Some(admin.id.as_str()));
        assert_eq!(outcome.transaction.reference_id.as_deref(), Some("quote-7"));

        let (events, _) = AuditRepository::new(state.store())
            .query(&AuditQuery {
                event_type: Some(AuditEventType::PointsGranted),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resource_id.as_deref(), Some(client.id.as_str()));
    }

    #[tokio::test]
    async fn grant_points_rejects_unknown_account() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);

        let missing = grant_points(
            AdminOnly(admin),
            Path("missing".to_string()),
            State(state),
            Json(grant_request(10)),
        )
        .await
        .unwrap_err();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn zero_grant_is_recorded() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);
        let client = seed(&state, "client", Role::ClientStandard);

        let Json(outcome) = grant_points(
            AdminOnly(admin),
            Path(client.id.clone()),
            State(state.clone()),
            Json(grant_request(0)),
        )
        .await
        .unwrap();
        assert_eq!(outcome.total_points, 0);
        assert_eq!(outcome.transaction.points, 0);

        let (transactions, total) = state
            .ledger
            .list_transactions(&client.id, Page::default())
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(transactions[0].points, 0);
    }

    #[tokio::test]
    async fn omitted_kind_follows_the_sign() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);
        let client = seed(&state, "client", Role::ClientStandard);

        for (points, expected) in [(50, TransactionKind::Earned), (-50, TransactionKind::Spent)] {
            let request: GrantPointsRequest =
                serde_json::from_value(json!({ "points": points, "description": "Manual" }))
                    .unwrap();
            let Json(outcome) = grant_points(
                AdminOnly(admin.clone()),
                Path(client.id.clone()),
                State(state.clone()),
                Json(request),
            )
            .await
            .unwrap();
            assert_eq!(outcome.transaction.kind, expected);
        }

        let explicit: GrantPointsRequest = serde_json::from_value(
            json!({ "points": 5, "kind": "adjustment", "description": "Fix" }),
        )
        .unwrap();
        assert_eq!(explicit.kind(), TransactionKind::Adjustment);
    }

    #[tokio::test]
    async fn override_tier_lands_on_floor() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);
        let client = seed(&state, "client", Role::ClientStandard);

        let request = TierOverrideRequest {
            tier: LoyaltyTier::Gold,
            reason: "Key account".to_string(),
        };
        let Json(outcome) = override_tier(
            AdminOnly(admin),
            Path(client.id),
            State(state),
            Json(request),
        )
        .await
        .unwrap();

        assert_eq!(outcome.total_points, LoyaltyTier::Gold.floor());
        assert_eq!(outcome.transaction.kind, TransactionKind::Adjustment);
    }

    #[tokio::test]
    async fn admin_cannot_deactivate_self() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);

        let err = update_status(
            AdminOnly(admin.clone()),
            Path(admin.id.clone()),
            State(state.clone()),
            Json(UpdateStatusRequest { is_active: false }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(state.accounts.get(&admin.id).unwrap().is_active);
    }

    #[tokio::test]
    async fn list_accounts_filters_client_group() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);
        seed(&state, "prospect", Role::Prospect);
        seed(&state, "premium", Role::ClientPremium);
        seed(&state, "moderator", Role::Moderator);

        let params = AccountListParams {
            role: Some("client".to_string()),
            ..Default::default()
        };
        let Json(list) = list_accounts(AdminOnly(admin.clone()), Query(params), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(list.total, 2);
        assert!(list.accounts.iter().all(|a| a.role.is_client()));

        let params = AccountListParams {
            role: Some("superuser".to_string()),
            ..Default::default()
        };
        let err = list_accounts(AdminOnly(admin), Query(params), State(state))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_and_update_account() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);

        let request = CreateAccountRequest {
            username: "mod_1".to_string(),
            email: "Mod@Example.com".to_string(),
            full_name: "Mod One".to_string(),
            password: "long-enough".to_string(),
            role: Role::Moderator,
        };
        let (status, Json(created)) =
            create_account(AdminOnly(admin.clone()), State(state.clone()), Json(request))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.role, Role::Moderator);
        assert_eq!(created.email, "mod@example.com");

        let change = UpdateAccountRequest {
            role: Some(Role::ClientPremium),
            ..Default::default()
        };
        let Json(updated) = update_account(
            AdminOnly(admin),
            Path(created.id.clone()),
            State(state),
            Json(change),
        )
        .await
        .unwrap();
        assert_eq!(updated.role, Role::ClientPremium);
        assert_eq!(updated.full_name, "Mod One");
    }

    #[tokio::test]
    async fn audit_query_filters_by_event_type() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);
        let client = seed(&state, "client", Role::ClientStandard);
        reconcile(AdminOnly(admin.clone()), Path(client.id), State(state.clone()))
            .await
            .unwrap();

        let params = AuditQueryParams {
            event_type: Some("ledger_reconciled".to_string()),
            ..Default::default()
        };
        let Json(log) = query_audit_log(AdminOnly(admin.clone()), Query(params), State(state.clone()))
            .await
            .unwrap();
        assert_eq!(log.total, 1);
        assert!(!log.has_more);

        let params = AuditQueryParams {
            event_type: Some("not_a_type".to_string()),
            ..Default::default()
        };
        let err = query_audit_log(AdminOnly(admin), Query(params), State(state))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stats_count_clients() {
        let state = AppState::in_memory();
        let admin = seed(&state, "admin", Role::Admin);
        seed(&state, "c1", Role::ClientStandard);
        seed(&state, "c2", Role::Prospect);

        let Json(stats) = client_stats(AdminOnly(admin), State(state)).await.unwrap();
        assert_eq!(stats.total_clients, 2);
        assert_eq!(stats.new_clients_this_month, 2);
        assert_eq!(stats.active_clients, 2);
    }
}
