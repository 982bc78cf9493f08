// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Loyalty tiers and their point bands.
//!
//! ```text
//! bronze     [min, 500)
//! silver     [500, 2000)
//! gold       [2000, 5000)
//! platinum   [5000, ∞)
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const SILVER_FLOOR: i64 = 500;
pub const GOLD_FLOOR: i64 = 2000;
pub const PLATINUM_FLOOR: i64 = 5000;

/// Loyalty tier, ordered from lowest to highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub const ALL: [LoyaltyTier; 4] = [
        LoyaltyTier::Bronze,
        LoyaltyTier::Silver,
        LoyaltyTier::Gold,
        LoyaltyTier::Platinum,
    ];

    /// Lowest `total_points` value inside the band. Bronze has no lower bound
    /// (negative totals are bronze); its floor for overrides is 0.
    pub fn floor(&self) -> i64 {
        match self {
            LoyaltyTier::Bronze => 0,
            LoyaltyTier::Silver => SILVER_FLOOR,
            LoyaltyTier::Gold => GOLD_FLOOR,
            LoyaltyTier::Platinum => PLATINUM_FLOOR,
        }
    }

    /// The next tier up, or `None` at the top.
    pub fn next(&self) -> Option<LoyaltyTier> {
        match self {
            LoyaltyTier::Bronze => Some(LoyaltyTier::Silver),
            LoyaltyTier::Silver => Some(LoyaltyTier::Gold),
            LoyaltyTier::Gold => Some(LoyaltyTier::Platinum),
            LoyaltyTier::Platinum => None,
        }
    }

    /// Perks attached to the tier, shown on the premium view.
    pub fn perks(&self) -> &'static [&'static str] {
        match self {
            LoyaltyTier::Bronze => &["Member newsletter", "Standard support"],
            LoyaltyTier::Silver => &[
                "Member newsletter",
                "Priority email support",
                "5% discount on new quotes",
            ],
            LoyaltyTier::Gold => &[
                "Priority email support",
                "10% discount on new quotes",
                "Quarterly account review",
            ],
            LoyaltyTier::Platinum => &[
                "Dedicated account manager",
                "15% discount on new quotes",
                "Quarterly account review",
                "Early access to new services",
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoyaltyTier::Bronze => "bronze",
            LoyaltyTier::Silver => "silver",
            LoyaltyTier::Gold => "gold",
            LoyaltyTier::Platinum => "platinum",
        }
    }
}

impl std::fmt::Display for LoyaltyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier of a lifetime point total. Total over all of `i64`.
pub fn tier_of(points: i64) -> LoyaltyTier {
    if points >= PLATINUM_FLOOR {
        LoyaltyTier::Platinum
    } else if points >= GOLD_FLOOR {
        LoyaltyTier::Gold
    } else if points >= SILVER_FLOOR {
        LoyaltyTier::Silver
    } else {
        LoyaltyTier::Bronze
    }
}

/// Points missing to reach the floor of the next tier; 0 at platinum.
pub fn points_to_next_tier(tier: LoyaltyTier, points: i64) -> i64 {
    match tier.next() {
        Some(next) => next.floor().saturating_sub(points).max(0),
        None => 0,
    }
}
