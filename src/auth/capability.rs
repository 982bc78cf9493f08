// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Capability checks (the access control guard).
//!
//! | Capability       | Roles admitted                                            |
//! |------------------|-----------------------------------------------------------|
//! | `Admin`          | admin, moderator                                          |
//! | `Client`         | client_standard, client_premium, prospect, admin, moderator |
//! | `PremiumClient`  | client_premium                                            |
//! | `ActiveAccount`  | any role                                                  |
//!
//! An inactive account is denied every capability.

use super::Role;

/// What an endpoint requires of its principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Admin,
    Client,
    PremiumClient,
    ActiveAccount,
}

/// Guard outcome when the principal is authenticated but not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("forbidden")]
pub struct Forbidden;

impl Capability {
    /// Whether `role` is admitted, ignoring the active flag.
    pub fn admits(&self, role: Role) -> bool {
        match self {
            Capability::Admin => matches!(role, Role::Admin | Role::Moderator),
            Capability::Client => match role {
                Role::ClientStandard
                | Role::ClientPremium
                | Role::Prospect
                | Role::Admin
                | Role::Moderator => true,
            },
            Capability::PremiumClient => matches!(role, Role::ClientPremium),
            Capability::ActiveAccount => true,
        }
    }

    /// Check a principal. Inactive accounts are denied first.
    pub fn check(&self, role: Role, is_active: bool) -> Result<(), Forbidden> {
        if !is_active || !self.admits(role) {
            return Err(Forbidden);
        }
        Ok(())
    }
}
