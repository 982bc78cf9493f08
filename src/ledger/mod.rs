// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Loyalty Points Ledger
//!
//! The transaction log in `point_transactions` is the source of truth. The
//! balance fields on each account are a cache maintained in the same atomic
//! batch as every append, and can be rebuilt with
//! [`LoyaltyLedger::reconcile`].

pub mod service;
pub mod tier;

pub use service::{
    GrantOutcome, LedgerBalance, LedgerError, LoyaltyLedger, PointGrant, ReconcileOutcome,
    DEFAULT_MAX_RETRIES,
};
pub use tier::{points_to_next_tier, tier_of, LoyaltyTier};
