// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Account roles for authorization.
///
/// ## Role Set
///
/// - `Admin` - Full administrative access
/// - `Moderator` - Administrative access; supervises the client portal
/// - `ClientPremium` - Paying client with premium perks
/// - `ClientStandard` - Regular client
/// - `Prospect` - Registered but not yet a client
///
/// The set is closed: capabilities are granted by exhaustive matching in
/// [`Capability::admits`](super::Capability::admits), never by name prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Staff with administrative access
    Moderator,
    /// Premium client
    ClientPremium,
    /// Standard client
    ClientStandard,
    /// Prospect (lead)
    Prospect,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Moderator,
        Role::ClientPremium,
        Role::ClientStandard,
        Role::Prospect,
    ];

    /// Staff roles do not take part in the loyalty programme.
    pub fn is_staff(&self) -> bool {
        match self {
            Role::Admin | Role::Moderator => true,
            Role::ClientPremium | Role::ClientStandard | Role::Prospect => false,
        }
    }

    /// Roles counted as clients in listings and statistics.
    pub fn is_client(&self) -> bool {
        !self.is_staff()
    }

    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::ClientPremium => "client_premium",
            Role::ClientStandard => "client_standard",
            Role::Prospect => "prospect",
        }
    }

    /// Parse role from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Role> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "client_premium" => Some(Role::ClientPremium),
            "client_standard" => Some(Role::ClientStandard),
            "prospect" => Some(Role::Prospect),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Default role for self-registered accounts.
    fn default() -> Self {
        Role::ClientStandard
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_roles() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Moderator.is_staff());
        assert!(!Role::ClientPremium.is_staff());
        assert!(!Role::ClientStandard.is_staff());
        assert!(!Role::Prospect.is_staff());
    }

    #[test]
    fn parse_round_trips_display() {
        for role in Role::ALL {
            assert_eq!(Role::parse(&role.to_string()), Some(role));
        }
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("client"), None);
        assert_eq!(Role::parse("client_x"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Role::ClientPremium).unwrap();
        assert_eq!(json, r#""client_premium""#);
        let role: Role = serde_json::from_str(r#""prospect""#).unwrap();
        assert_eq!(role, Role::Prospect);
    }

    #[test]
    fn default_role_is_client_standard() {
        assert_eq!(Role::default(), Role::ClientStandard);
    }
}
