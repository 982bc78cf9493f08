// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account repository.
//!
//! ## Storage Layout
//!
//! ```text
//! accounts/{account_id}        Account document
//! account_logins/{username}    {"account_id": ...}
//! account_emails/{email}       {"account_id": ...} (email lowercased)
//! ```
//!
//! The index documents are inserted in the same batch as the account, so a
//! duplicate username or email fails the whole creation with
//! `StoreError::AlreadyExists` naming the index collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::auth::Role;
use crate::ledger::tier::{points_to_next_tier, tier_of, LoyaltyTier};
use crate::storage::collections::{ACCOUNTS, ACCOUNT_EMAILS, ACCOUNT_LOGINS};
use crate::storage::{
    DocumentStore, Filter, FindQuery, SortOrder, StoreError, StoreResult, WriteBatch,
};

use super::Page;

/// Stored account.
///
/// Points fields are written only by the ledger; profile, role and active
/// flag only by account management.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    /// Argon2id PHC string. Never serialized to API clients.
    pub password_hash: String,
    /// Lifetime total; may go negative after an over-spend.
    pub total_points: i64,
    /// Spendable balance, never below zero.
    pub available_points: i64,
    /// Number of ledger entries appended for this account.
    #[serde(default)]
    pub ledger_entries: u64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Build a fresh account with zeroed ledger fields.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        role: Role,
        password_hash: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: normalize_email(&email.into()),
            full_name: full_name.into(),
            role,
            is_active: true,
            password_hash,
            total_points: 0,
            available_points: 0,
            ledger_entries: 0,
            created_at: Utc::now(),
        }
    }

    /// Tier derived from `total_points`; never stored.
    pub fn loyalty_tier(&self) -> LoyaltyTier {
        tier_of(self.total_points)
    }

    pub fn next_tier_points(&self) -> i64 {
        points_to_next_tier(self.loyalty_tier(), self.total_points)
    }
}

/// Account as returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub is_active: bool,
    pub total_points: i64,
    pub available_points: i64,
    pub loyalty_tier: LoyaltyTier,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        let loyalty_tier = account.loyalty_tier();
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            full_name: account.full_name,
            role: account.role,
            is_active: account.is_active,
            total_points: account.total_points,
            available_points: account.available_points,
            loyalty_tier,
            created_at: account.created_at,
        }
    }
}

/// Profile fields that account management may change.
#[derive(Debug, Clone, Default)]
pub struct ProfileChange {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Emails are indexed case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Repository for account documents and their uniqueness indexes.
pub struct AccountRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> AccountRepository<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Get an account by id.
    pub fn get(&self, account_id: &str) -> StoreResult<Option<Account>> {
        Ok(self.get_versioned(account_id)?.map(|(account, _)| account))
    }

    /// Get an account together with its document version.
    pub fn get_versioned(&self, account_id: &str) -> StoreResult<Option<(Account, u64)>> {
        match self.store.get(ACCOUNTS, account_id)? {
            Some(doc) => Ok(Some((doc.decode()?, doc.version))),
            None => Ok(None),
        }
    }

    pub fn find_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        self.resolve_index(ACCOUNT_LOGINS, username)
    }

    pub fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        self.resolve_index(ACCOUNT_EMAILS, &normalize_email(email))
    }

    fn resolve_index(&self, collection: &str, key: &str) -> StoreResult<Option<Account>> {
        let Some(entry) = self.store.get(collection, key)? else {
            return Ok(None);
        };
        let account_id = entry
            .body
            .get("account_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                StoreError::InvalidDocument(format!("{collection}/{key} has no account_id"))
            })?;
        self.get(account_id)
    }

    /// Create an account with its login and email index entries.
    ///
    /// # Returns
    /// - `Err(StoreError::AlreadyExists)` with `collection` set to the index
    ///   that collided (`account_logins` or `account_emails`)
    pub fn create(&self, account: &Account) -> StoreResult<()> {
        let batch = WriteBatch::new()
            .insert(ACCOUNT_LOGINS, &account.username, json!({"account_id": account.id}))
            .insert(
                ACCOUNT_EMAILS,
                normalize_email(&account.email),
                json!({"account_id": account.id}),
            )
            .insert(ACCOUNTS, &account.id, serde_json::to_value(account)?);
        self.store.commit(batch)
    }

    /// Apply a profile change, moving the email index entry when the email changes.
    pub fn update_profile(&self, current: &Account, change: &ProfileChange) -> StoreResult<Account> {
        let mut updated = current.clone();
        let mut patch = serde_json::Map::new();
        let mut batch = WriteBatch::new();

        if let Some(full_name) = &change.full_name {
            updated.full_name = full_name.clone();
            patch.insert("full_name".into(), json!(full_name));
        }
        if let Some(role) = change.role {
            updated.role = role;
            patch.insert("role".into(), json!(role));
        }
        if let Some(email) = &change.email {
            let email = normalize_email(email);
            if email != current.email {
                batch = batch
                    .insert(ACCOUNT_EMAILS, &email, json!({"account_id": current.id}))
                    .remove(ACCOUNT_EMAILS, normalize_email(&current.email));
                updated.email = email.clone();
                patch.insert("email".into(), json!(email));
            }
        }

        if patch.is_empty() {
            return Ok(updated);
        }
        self.store
            .commit(batch.update(ACCOUNTS, &current.id, patch.into()))?;
        Ok(updated)
    }

    pub fn set_active(&self, account_id: &str, active: bool) -> StoreResult<()> {
        self.store
            .update(ACCOUNTS, account_id, json!({"is_active": active}))
    }

    /// List accounts matching `filter`, newest first.
    pub fn list(&self, filter: Filter, page: Page) -> StoreResult<(Vec<Account>, usize)> {
        let query = FindQuery::new()
            .with_filter(filter)
            .sort_by("created_at", SortOrder::Descending)
            .skip(page.offset)
            .limit(page.limit);
        let (docs, total) = self.store.find(ACCOUNTS, &query)?;
        let accounts = docs
            .iter()
            .map(|doc| doc.decode())
            .collect::<StoreResult<Vec<Account>>>()?;
        Ok((accounts, total))
    }

    pub fn count(&self, filter: &Filter) -> StoreResult<usize> {
        self.store.count(ACCOUNTS, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn account(username: &str, email: &str, role: Role) -> Account {
        Account::new(username, email, "Test User", role, "hash".to_string())
    }

    #[test]
    fn create_and_lookup() {
        let store = MemoryStore::new();
        let repo = AccountRepository::new(&store);
        let alice = account("alice", "Alice@Example.com", Role::ClientStandard);
        repo.create(&alice).unwrap();

        let by_id = repo.get(&alice.id).unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert_eq!(by_id.email, "alice@example.com");

        let by_login = repo.find_by_username("alice").unwrap().unwrap();
        assert_eq!(by_login.id, alice.id);
        let by_email = repo.find_by_email("ALICE@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, alice.id);

        assert!(repo.find_by_username("bob").unwrap().is_none());
        assert!(repo.get("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_names_login_index() {
        let store = MemoryStore::new();
        let repo = AccountRepository::new(&store);
        repo.create(&account("alice", "a@x.com", Role::ClientStandard))
            .unwrap();

        let err = repo
            .create(&account("alice", "other@x.com", Role::ClientStandard))
            .unwrap_err();
        match err {
            StoreError::AlreadyExists { collection, .. } => assert_eq!(collection, ACCOUNT_LOGINS),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = repo
            .create(&account("bob", "A@X.com", Role::ClientStandard))
            .unwrap_err();
        match err {
            StoreError::AlreadyExists { collection, .. } => assert_eq!(collection, ACCOUNT_EMAILS),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(repo.find_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn email_change_moves_index() {
        let store = MemoryStore::new();
        let repo = AccountRepository::new(&store);
        let alice = account("alice", "old@x.com", Role::ClientStandard);
        repo.create(&alice).unwrap();

        let change = ProfileChange {
            email: Some("New@x.com".to_string()),
            role: Some(Role::ClientPremium),
            ..Default::default()
        };
        let updated = repo.update_profile(&alice, &change).unwrap();
        assert_eq!(updated.email, "new@x.com");
        assert_eq!(updated.role, Role::ClientPremium);

        assert!(repo.find_by_email("old@x.com").unwrap().is_none());
        assert_eq!(repo.find_by_email("new@x.com").unwrap().unwrap().id, alice.id);
        assert_eq!(repo.get(&alice.id).unwrap().unwrap().role, Role::ClientPremium);
    }

    #[test]
    fn list_newest_first_with_filter() {
        let store = MemoryStore::new();
        let repo = AccountRepository::new(&store);
        let mut first = account("first", "1@x.com", Role::ClientStandard);
        first.created_at = Utc::now() - chrono::Duration::days(2);
        let second = account("second", "2@x.com", Role::Prospect);
        let admin = account("admin", "3@x.com", Role::Admin);
        for a in [&first, &second, &admin] {
            repo.create(a).unwrap();
        }

        let clients = Filter::new().is_in("role", ["client_standard", "prospect"]);
        let (accounts, total) = repo.list(clients, Page::new(0, 10)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(accounts[0].username, "second");
        assert_eq!(accounts[1].username, "first");
    }

    #[test]
    fn response_hides_password_hash() {
        let alice = account("alice", "a@x.com", Role::ClientStandard);
        let body = serde_json::to_value(AccountResponse::from(alice)).unwrap();
        assert!(body.get("password_hash").is_none());
        assert_eq!(body["loyalty_tier"], "bronze");
    }
}
