// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Session tokens, credentials and role-based access control for the client
//! portal.
//!
//! ## Auth Flow
//!
//! 1. Client logs in with username + password (`POST /v1/auth/login`)
//! 2. Server verifies the argon2id hash and issues an HS256 access token
//!    (30 minutes) and refresh token (7 days)
//! 3. Client sends `Authorization: Bearer <access token>`
//! 4. Server:
//!    - Verifies signature, expiry and token kind
//!    - Resolves the account named by `account_id`
//!    - Checks the endpoint's [`Capability`] against role and active flag
//!
//! ## Security
//!
//! - No server-side sessions; tokens are pure functions of secret, claims and clock
//! - Token failures of every kind are reported identically
//! - Passwords and tokens are never logged

pub mod capability;
pub mod claims;
pub mod credentials;
pub mod error;
pub mod extractor;
pub mod password;
pub mod roles;
pub mod tokens;

pub use capability::{Capability, Forbidden};
pub use claims::{Claims, TokenKind, TokenPair};
pub use credentials::CredentialStore;
pub use error::AuthError;
pub use extractor::{ActiveAccount, AdminOnly, Auth, ClientOnly, PremiumClientOnly, RefreshAuth};
pub use roles::Role;
pub use tokens::{TokenError, TokenService};
