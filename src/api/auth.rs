// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session endpoints: login, self-registration, refresh and the current
//! principal.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    accounts::NewAccount,
    audit_log,
    auth::{ActiveAccount, AuthError, RefreshAuth, Role, TokenPair},
    error::ApiError,
    state::AppState,
    storage::{Account, AccountResponse, AuditEvent, AuditEventType, AuditRepository},
};

/// Request body for `POST /v1/auth/login`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for `POST /v1/auth/register`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

fn issue_pair(state: &AppState, account: &Account) -> Result<TokenPair, AuthError> {
    state
        .tokens
        .issue_pair(&account.id, &account.username, Utc::now())
        .map_err(AuthError::from)
}

/// Exchange username and password for a token pair.
///
/// Unknown usernames, wrong passwords and deactivated accounts all answer
/// with the same 401.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 401, description = "Invalid credentials"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    let account = state
        .credentials
        .authenticate(&request.username, &request.password)?
        .filter(|account| account.is_active);

    let Some(account) = account else {
        tracing::info!(username = %request.username, "Login rejected");
        AuditRepository::new(state.store()).log_best_effort(
            &AuditEvent::new(AuditEventType::AuthFailure)
                .with_details(serde_json::json!({ "username": request.username }))
                .failed("invalid credentials"),
        );
        return Err(AuthError::InvalidCredentials);
    };

    let pair = issue_pair(&state, &account)?;
    tracing::info!(account_id = %account.id, "Login succeeded");
    audit_log!(state.store(), AuditEventType::AuthSuccess, account);
    Ok(Json(pair))
}

/// Self-registration. The role is always `client_standard`.
#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already registered"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let account = state.accounts.create_account(NewAccount {
        username: request.username,
        email: request.email,
        full_name: request.full_name,
        password: request.password,
        role: Role::ClientStandard,
    })?;

    audit_log!(
        state.store(),
        AuditEventType::AccountCreated,
        account,
        "account",
        &account.id
    );
    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Issue a fresh token pair for the bearer of a valid access or refresh token.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Account deactivated"),
    )
)]
pub async fn refresh(
    RefreshAuth(account): RefreshAuth,
    State(state): State<AppState>,
) -> Result<Json<TokenPair>, AuthError> {
    let pair = issue_pair(&state, &account)?;
    audit_log!(state.store(), AuditEventType::TokenRefreshed, account);
    Ok(Json(pair))
}

/// The authenticated account.
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current account", body = AccountResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Account deactivated"),
    )
)]
pub async fn me(ActiveAccount(account): ActiveAccount) -> Json<AccountResponse> {
    Json(account.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::AuditQuery;

    fn register_request(username: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            full_name: "Test Client".to_string(),
            password: "correct-horse".to_string(),
        }
    }

    fn login_request(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_forces_standard_client_role() {
        let state = AppState::in_memory();

        let (status, Json(account)) = register(State(state.clone()), Json(register_request("alice")))
            .await
            .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(account.role, Role::ClientStandard);
        assert_eq!(account.total_points, 0);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_username() {
        let state = AppState::in_memory();
        register(State(state.clone()), Json(register_request("alice")))
            .await
            .unwrap();

        let mut again = register_request("alice");
        again.email = "other@example.com".to_string();
        let err = register(State(state), Json(again)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_issues_verifiable_pair() {
        let state = AppState::in_memory();
        register(State(state.clone()), Json(register_request("alice")))
            .await
            .unwrap();

        let Json(pair) = login(State(state.clone()), Json(login_request("alice", "correct-horse")))
            .await
            .unwrap();

        assert_eq!(pair.token_type, "bearer");
        let claims = state.tokens.verify(&pair.access_token, Utc::now()).unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = AppState::in_memory();
        register(State(state.clone()), Json(register_request("alice")))
            .await
            .unwrap();

        let wrong_password = login(State(state.clone()), Json(login_request("alice", "nope-nope")))
            .await
            .unwrap_err();
        let unknown_user = login(State(state.clone()), Json(login_request("bob", "correct-horse")))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));

        let (events, total) = AuditRepository::new(state.store())
            .query(&AuditQuery {
                event_type: Some(AuditEventType::AuthFailure),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(total, 2);
        assert!(events.iter().all(|e| !e.success));
    }

    #[tokio::test]
    async fn deactivated_account_cannot_log_in() {
        let state = AppState::in_memory();
        let (_, Json(account)) = register(State(state.clone()), Json(register_request("alice")))
            .await
            .unwrap();
        state
            .accounts
            .set_active(&account.id, false, "some-admin")
            .unwrap();

        let err = login(State(state), Json(login_request("alice", "correct-horse")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn refresh_reissues_for_current_login() {
        let state = AppState::in_memory();
        let (_, Json(created)) = register(State(state.clone()), Json(register_request("alice")))
            .await
            .unwrap();
        let account = state.accounts.get(&created.id).unwrap();

        let Json(pair) = refresh(RefreshAuth(account), State(state.clone())).await.unwrap();
        let claims = state.tokens.verify(&pair.refresh_token, Utc::now()).unwrap();
        assert_eq!(claims.account_id, created.id);
    }

    #[tokio::test]
    async fn me_hides_password_hash() {
        let state = AppState::in_memory();
        let (_, Json(created)) = register(State(state.clone()), Json(register_request("alice")))
            .await
            .unwrap();
        let account = state.accounts.get(&created.id).unwrap();

        let Json(response) = me(ActiveAccount(account)).await;
        let body = serde_json::to_value(&response).unwrap();
        assert!(body.get("password_hash").is_none());
        assert_eq!(body["loyalty_tier"], "bronze");
    }
}
