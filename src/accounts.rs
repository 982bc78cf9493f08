// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Account management: creation, profile/role updates, activation, listing
//! and client statistics. Points fields are never touched here.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::auth::password::{hash_password, PasswordHashError};
use crate::auth::Role;
use crate::dashboard::TICKET_CLOSED_STATUSES;
use crate::notifications::{kinds, notify_best_effort, NotificationSink};
use crate::storage::collections::{ACCOUNT_EMAILS, ACCOUNT_LOGINS, QUOTE_REQUESTS, SUPPORT_TICKETS};
use crate::storage::repository::Page;
use crate::storage::{
    Account, AccountRepository, DocumentStore, Filter, ProfileChange, StoreError,
    TransactionRepository,
};

pub const MIN_PASSWORD_LEN: usize = 8;
const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("username already registered")]
    UsernameTaken,

    #[error("email already registered")]
    EmailTaken,

    #[error("account not found: {0}")]
    NotFound(String),

    #[error("cannot deactivate your own account")]
    SelfDeactivation,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Hash(#[from] PasswordHashError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists { collection, .. } if collection == ACCOUNT_LOGINS => {
                AccountError::UsernameTaken
            }
            StoreError::AlreadyExists { collection, .. } if collection == ACCOUNT_EMAILS => {
                AccountError::EmailTaken
            }
            other => AccountError::Store(other),
        }
    }
}

/// Input for account creation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Role,
}

/// Which roles a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    /// Client roles and prospects
    Clients,
    Only(Role),
}

impl RoleFilter {
    /// `client` selects the client group; anything else must name a role.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "client" | "clients" => Some(RoleFilter::Clients),
            other => Role::parse(other).map(RoleFilter::Only),
        }
    }

    fn roles(&self) -> Vec<Role> {
        match self {
            RoleFilter::Clients => Role::ALL.into_iter().filter(Role::is_client).collect(),
            RoleFilter::Only(role) => vec![*role],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub role: Option<RoleFilter>,
    pub active: Option<bool>,
    /// Case-insensitive match on username, email or full name
    pub search: Option<String>,
    pub page: Page,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClientStats {
    pub total_clients: usize,
    pub new_clients_this_month: usize,
    pub active_clients: usize,
    pub total_points_distributed: i64,
    pub pending_quotes: usize,
    pub open_tickets: usize,
}

pub struct AccountService {
    store: Arc<dyn DocumentStore>,
    notifications: Arc<dyn NotificationSink>,
}

impl AccountService {
    pub fn new(store: Arc<dyn DocumentStore>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    fn repo(&self) -> AccountRepository<'_> {
        AccountRepository::new(self.store.as_ref())
    }

    pub fn get(&self, account_id: &str) -> Result<Account, AccountError> {
        self.repo()
            .get(account_id)?
            .ok_or_else(|| AccountError::NotFound(account_id.to_string()))
    }

    /// Create an account with zeroed ledger fields.
    ///
    /// Username and email uniqueness is enforced by the store in the same
    /// batch that writes the account.
    pub fn create_account(&self, input: NewAccount) -> Result<Account, AccountError> {
        validate_username(&input.username)?;
        validate_email(&input.email)?;
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::InvalidInput(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let account = Account::new(
            input.username.trim(),
            input.email,
            input.full_name.trim(),
            input.role,
            hash_password(&input.password)?,
        );
        self.repo().create(&account)?;

        tracing::info!(
            account_id = %account.id,
            username = %account.username,
            role = %account.role,
            "Account created"
        );
        notify_best_effort(
            self.notifications.as_ref(),
            kinds::ACCOUNT_CREATED,
            json!({
                "account_id": account.id,
                "username": account.username,
                "role": account.role,
            }),
        );
        Ok(account)
    }

    /// Update full name, email (re-indexed) and/or role.
    pub fn update_account(
        &self,
        account_id: &str,
        change: ProfileChange,
    ) -> Result<Account, AccountError> {
        if let Some(email) = &change.email {
            validate_email(email)?;
        }
        let current = self.get(account_id)?;
        let updated = self.repo().update_profile(&current, &change)?;
        tracing::info!(account_id, role = %updated.role, "Account updated");
        Ok(updated)
    }

    /// Activate or deactivate an account. An account cannot deactivate itself.
    pub fn set_active(
        &self,
        account_id: &str,
        active: bool,
        actor_id: &str,
    ) -> Result<Account, AccountError> {
        if !active && account_id == actor_id {
            return Err(AccountError::SelfDeactivation);
        }
        let mut account = self.get(account_id)?;
        self.repo().set_active(account_id, active)?;
        account.is_active = active;
        tracing::info!(account_id, active, actor_id, "Account status changed");
        Ok(account)
    }

    /// List accounts, newest first.
    pub fn list_accounts(&self, filter: &AccountFilter) -> Result<(Vec<Account>, usize), AccountError> {
        Ok(self.repo().list(to_store_filter(filter), filter.page)?)
    }

    /// Create the seed admin unless an admin already exists.
    pub fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<Account>, AccountError> {
        let admins = Filter::new().eq("role", Role::Admin.as_str());
        if self.repo().count(&admins)? > 0 {
            tracing::debug!("Admin account present, skipping bootstrap");
            return Ok(None);
        }

        let account = self.create_account(NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Administrator".to_string(),
            password: password.to_string(),
            role: Role::Admin,
        })?;
        tracing::info!(account_id = %account.id, "Seed admin account created");
        Ok(Some(account))
    }

    pub fn client_stats(&self) -> Result<ClientStats, AccountError> {
        let clients = Filter::new().is_in("role", client_role_names());
        let (all_clients, total_clients) = self.repo().list(clients.clone(), Page {
            offset: 0,
            limit: usize::MAX,
        })?;

        let month_ago = Utc::now() - Duration::days(30);
        let new_clients_this_month = all_clients
            .iter()
            .filter(|a| a.created_at >= month_ago)
            .count();
        let active_clients = self.repo().count(&clients.eq("is_active", true))?;

        let total_points_distributed =
            TransactionRepository::new(self.store.as_ref()).total_points_distributed()?;
        let pending_quotes = self
            .store
            .count(QUOTE_REQUESTS, &Filter::new().eq("status", "pending"))?;
        let open_tickets = self.store.count(
            SUPPORT_TICKETS,
            &Filter::new().not_in("status", TICKET_CLOSED_STATUSES),
        )?;

        Ok(ClientStats {
            total_clients,
            new_clients_this_month,
            active_clients,
            total_points_distributed,
            pending_quotes,
            open_tickets,
        })
    }
}

fn client_role_names() -> Vec<&'static str> {
    RoleFilter::Clients.roles().iter().map(Role::as_str).collect()
}

fn to_store_filter(filter: &AccountFilter) -> Filter {
    let mut store_filter = Filter::new();
    if let Some(role) = filter.role {
        let names: Vec<&str> = role.roles().iter().map(Role::as_str).collect();
        store_filter = store_filter.is_in("role", names);
    }
    if let Some(active) = filter.active {
        store_filter = store_filter.eq("is_active", active);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        store_filter = store_filter
            .or_contains("username", search)
            .or_contains("email", search)
            .or_contains("full_name", search);
    }
    store_filter
}

fn validate_username(username: &str) -> Result<(), AccountError> {
    let username = username.trim();
    let valid = USERNAME_LEN.contains(&username.chars().count())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(AccountError::InvalidInput(
            "username must be 3-50 characters of letters, digits, '_', '-' or '.'".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AccountError> {
    match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AccountError::InvalidInput("invalid email address".to_string())),
    }
}
