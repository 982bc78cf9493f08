// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the document store.
//!
//! Each repository borrows a `&dyn DocumentStore` and maps one entity type
//! to and from its collection.

pub mod accounts;
pub mod transactions;

pub use accounts::{Account, AccountRepository, AccountResponse, ProfileChange};
pub use transactions::{PointTransaction, TransactionKind, TransactionRepository};

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Offset/limit pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// Build a page, capping `limit` at [`MAX_PAGE_SIZE`].
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: limit.min(MAX_PAGE_SIZE),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_SIZE)
    }
}
