// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential store adapter.
//!
//! Resolves accounts by login or id and checks passwords. Not-found and a
//! wrong password are ordinary `Ok(None)` outcomes; only store failures are
//! errors.

use std::sync::Arc;

use crate::storage::{Account, AccountRepository, DocumentStore, StoreResult};

#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn DocumentStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(self.store.as_ref())
    }

    pub fn find_by_login(&self, username: &str) -> StoreResult<Option<Account>> {
        self.accounts().find_by_username(username)
    }

    pub fn find_by_id(&self, account_id: &str) -> StoreResult<Option<Account>> {
        self.accounts().get(account_id)
    }

    pub fn verify_password(&self, plain: &str, hash: &str) -> bool {
        super::password::verify_password(plain, hash)
    }

    /// Look up `username` and check `password`. `None` for an unknown login
    /// or a wrong password, without saying which. An unknown login still runs
    /// one argon2 verification.
    pub fn authenticate(&self, username: &str, password: &str) -> StoreResult<Option<Account>> {
        let Some(account) = self.find_by_login(username)? else {
            super::password::verify_dummy(password);
            return Ok(None);
        };
        if !self.verify_password(password, &account.password_hash) {
            return Ok(None);
        }
        Ok(Some(account))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::auth::{password::hash_password, Role};
    use crate::storage::MemoryStore;

    fn store_with_alice() -> (CredentialStore, Account) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let alice = Account::new(
            "alice",
            "alice@example.com",
            "Alice",
            Role::ClientStandard,
            hash_password("s3cret-pass").unwrap(),
        );
        AccountRepository::new(store.as_ref()).create(&alice).unwrap();
        (CredentialStore::new(store), alice)
    }

    #[test]
    fn authenticate_with_correct_password() {
        let (credentials, alice) = store_with_alice();
        let account = credentials.authenticate("alice", "s3cret-pass").unwrap().unwrap();
        assert_eq!(account.id, alice.id);
    }

    #[test]
    fn wrong_password_and_unknown_login_look_the_same() {
        let (credentials, _) = store_with_alice();
        assert!(credentials.authenticate("alice", "nope").unwrap().is_none());
        assert!(credentials.authenticate("mallory", "s3cret-pass").unwrap().is_none());
    }

    #[test]
    fn unknown_login_costs_a_hash_check() {
        let (credentials, _) = store_with_alice();
        // Warm up the dummy hash so its one-time hashing is not measured.
        credentials.authenticate("mallory", "warm-up").unwrap();

        let started = Instant::now();
        assert!(credentials.authenticate("alice", "wrong-pass").unwrap().is_none());
        let wrong_password = started.elapsed();

        let started = Instant::now();
        assert!(credentials.authenticate("mallory", "wrong-pass").unwrap().is_none());
        let unknown_login = started.elapsed();

        assert!(
            unknown_login * 10 >= wrong_password,
            "unknown login took {unknown_login:?}, wrong password took {wrong_password:?}"
        );
    }

    #[test]
    fn find_by_id_and_login() {
        let (credentials, alice) = store_with_alice();
        assert_eq!(credentials.find_by_id(&alice.id).unwrap().unwrap().username, "alice");
        assert!(credentials.find_by_login("alice").unwrap().is_some());
        assert!(credentials.find_by_id("missing").unwrap().is_none());
    }
}
