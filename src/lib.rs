// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Portal - Client Portal Authentication & Loyalty Ledger Service
//!
//! Issues and verifies session tokens, gates the client portal by role and
//! keeps per-account loyalty balances over an append-only point ledger.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Tokens, credentials and capability guards
//! - `ledger` - Loyalty tiers and the points ledger
//! - `dashboard` - Per-client dashboard aggregation
//! - `accounts` - Account management
//! - `storage` - Document store (redb or in-memory), repositories and audit

pub mod accounts;
pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ledger;
pub mod notifications;
pub mod state;
pub mod storage;
