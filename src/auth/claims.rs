// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token claims.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Which of the two session tokens a claim set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed claim set carried by access and refresh tokens.
///
/// Tokens are not persisted; everything needed to resolve the principal is
/// in the claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Login name of the account at issue time
    pub sub: String,
    /// Canonical account id
    pub account_id: String,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds)
    pub exp: i64,
    pub kind: TokenKind,
}

/// Access + refresh token pair returned by login, register and refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_serialize_kind_lowercase() {
        let claims = Claims {
            sub: "alice".to_string(),
            account_id: "acc_1".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_001_800,
            kind: TokenKind::Refresh,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["kind"], "refresh");
        assert_eq!(json["sub"], "alice");
    }
}
