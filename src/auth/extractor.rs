// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated principals.
//!
//! Use the `Auth` extractor in handlers to require a valid access token,
//! or one of the capability extractors to also run the guard:
//!
//! ```rust,ignore
//! async fn my_handler(ClientOnly(account): ClientOnly) -> impl IntoResponse {
//!     // account is the resolved, active Account
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

use super::{AuthError, Capability, TokenKind};
use crate::audit_log;
use crate::state::AppState;
use crate::storage::{Account, AuditEventType};

/// Pull the bearer token out of the Authorization header.
fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let auth_header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Resolve the account named by verified claims. An account deleted or
/// unknown since issue is indistinguishable from a bad token.
fn resolve(state: &AppState, account_id: &str) -> Result<Account, AuthError> {
    state
        .credentials
        .find_by_id(account_id)?
        .ok_or(AuthError::InvalidToken)
}

/// Extractor for authenticated accounts.
///
/// Validates an *access* token from the Authorization header and loads the
/// account it names. No capability check is made, so inactive accounts pass;
/// use a capability extractor for endpoints.
pub struct Auth(pub Account);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state
            .tokens
            .verify_kind(token, TokenKind::Access, Utc::now())?;
        Ok(Auth(resolve(state, &claims.account_id)?))
    }
}

/// Extractor for the refresh endpoint: accepts a valid access *or* refresh
/// token, and requires the account to still exist and be active.
pub struct RefreshAuth(pub Account);

impl FromRequestParts<AppState> for RefreshAuth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.tokens.verify(token, Utc::now())?;
        let account = resolve(state, &claims.account_id)?;
        guard(state, &account, Capability::ActiveAccount)?;
        Ok(RefreshAuth(account))
    }
}

/// Run the guard, auditing denials.
fn guard(state: &AppState, account: &Account, capability: Capability) -> Result<(), AuthError> {
    if let Err(denied) = capability.check(account.role, account.is_active) {
        tracing::warn!(
            account_id = %account.id,
            role = %account.role,
            is_active = account.is_active,
            capability = ?capability,
            "Access denied"
        );
        audit_log!(state.store(), AuditEventType::PermissionDenied, account);
        return Err(denied.into());
    }
    Ok(())
}

macro_rules! capability_extractor {
    ($(#[$meta:meta])* $name:ident => $capability:expr) => {
        $(#[$meta])*
        pub struct $name(pub Account);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AuthError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let Auth(account) = Auth::from_request_parts(parts, state).await?;
                guard(state, &account, $capability)?;
                Ok($name(account))
            }
        }
    };
}

capability_extractor!(
    /// Requires the `Admin` capability (admin or moderator).
    AdminOnly => Capability::Admin
);

capability_extractor!(
    /// Requires the `Client` capability.
    ClientOnly => Capability::Client
);

capability_extractor!(
    /// Requires the `PremiumClient` capability.
    PremiumClientOnly => Capability::PremiumClient
);

capability_extractor!(
    /// Requires only an active account.
    ActiveAccount => Capability::ActiveAccount
);
