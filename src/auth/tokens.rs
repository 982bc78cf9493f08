// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HS256 session token issuance and verification.
//!
//! A token is a pure function of the secret, the claims and the clock: there
//! is no server-side session store. Verification never distinguishes between
//! a bad signature, an expired token, a malformed token or the wrong token
//! kind; all of them are [`TokenError::Invalid`].

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::claims::{Claims, TokenKind, TokenPair};

/// Default access token lifetime.
pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 30;

/// Default refresh token lifetime.
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Issues and verifies signed, expiring session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn issue_access_token(
        &self,
        account_id: &str,
        login: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.issue(account_id, login, TokenKind::Access, now + self.access_ttl, now)
    }

    pub fn issue_refresh_token(
        &self,
        account_id: &str,
        login: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        self.issue(account_id, login, TokenKind::Refresh, now + self.refresh_ttl, now)
    }

    /// Issue a fresh access + refresh pair for the same subject.
    pub fn issue_pair(
        &self,
        account_id: &str,
        login: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access_token(account_id, login, now)?,
            refresh_token: self.issue_refresh_token(account_id, login, now)?,
            token_type: "bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    fn issue(
        &self,
        account_id: &str,
        login: &str,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: login.to_string(),
            account_id: account_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            kind,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature and expiry (`exp > now`) of a token of either kind.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        // Expiry is checked against the caller's clock, not the library's.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if claims.exp <= now.timestamp() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }

    /// Verify a token and require it to be of `kind`.
    pub fn verify_kind(
        &self,
        token: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<Claims, TokenError> {
        let claims = self.verify(token, now)?;
        if claims.kind != kind {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}
