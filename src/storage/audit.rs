// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Authentication events, account management and every ledger mutation are
//! appended to the `audit_events` collection. Audit writes are best-effort:
//! a failure is logged and never fails the audited operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::collections::AUDIT_EVENTS;
use super::repository::Page;
use super::{DocumentStore, Filter, FindQuery, SortOrder, StoreResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Auth events
    AuthSuccess,
    AuthFailure,
    TokenRefreshed,
    PermissionDenied,

    // Account events
    AccountCreated,
    AccountUpdated,
    AccountStatusChanged,

    // Ledger events
    PointsGranted,
    TierOverridden,
    LedgerReconciled,

    // Admin events
    AdminAccess,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::AuthSuccess => "auth_success",
            AuditEventType::AuthFailure => "auth_failure",
            AuditEventType::TokenRefreshed => "token_refreshed",
            AuditEventType::PermissionDenied => "permission_denied",
            AuditEventType::AccountCreated => "account_created",
            AuditEventType::AccountUpdated => "account_updated",
            AuditEventType::AccountStatusChanged => "account_status_changed",
            AuditEventType::PointsGranted => "points_granted",
            AuditEventType::TierOverridden => "tier_overridden",
            AuditEventType::LedgerReconciled => "ledger_reconciled",
            AuditEventType::AdminAccess => "admin_access",
        }
    }
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Account that triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (account id, transaction id).
    pub resource_id: Option<String>,
    /// Resource type (account, point_transaction).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the user ID.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Audit log filter.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub user_id: Option<String>,
    pub event_type: Option<AuditEventType>,
    pub resource_id: Option<String>,
    pub page: Page,
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Append an audit event.
    pub fn log(&self, event: &AuditEvent) -> StoreResult<()> {
        self.store
            .insert(AUDIT_EVENTS, &event.event_id, serde_json::to_value(event)?)
    }

    /// Append an event, logging instead of failing when the store rejects it.
    pub fn log_best_effort(&self, event: &AuditEvent) {
        if let Err(e) = self.log(event) {
            tracing::warn!(
                error = %e,
                event_type = event.event_type.as_str(),
                "Failed to write audit event"
            );
        }
    }

    /// Query events, newest first. Returns the page and the total match count.
    pub fn query(&self, query: &AuditQuery) -> StoreResult<(Vec<AuditEvent>, usize)> {
        let mut filter = Filter::new();
        if let Some(user_id) = &query.user_id {
            filter = filter.eq("user_id", user_id.as_str());
        }
        if let Some(event_type) = query.event_type {
            filter = filter.eq("event_type", event_type.as_str());
        }
        if let Some(resource_id) = &query.resource_id {
            filter = filter.eq("resource_id", resource_id.as_str());
        }

        let find = FindQuery::new()
            .with_filter(filter)
            .sort_by("timestamp", SortOrder::Descending)
            .skip(query.page.offset)
            .limit(query.page.limit);
        let (docs, total) = self.store.find(AUDIT_EVENTS, &find)?;
        let events = docs
            .iter()
            .map(|doc| doc.decode())
            .collect::<StoreResult<Vec<AuditEvent>>>()?;
        Ok((events, total))
    }
}

/// Helper macro for logging audit events.
///
/// `$account` is anything with an `id: String` field.
#[macro_export]
macro_rules! audit_log {
    ($store:expr, $event_type:expr, $account:expr) => {{
        let repo = $crate::storage::AuditRepository::new($store);
        let event = $crate::storage::AuditEvent::new($event_type).with_user(&$account.id);
        repo.log_best_effort(&event);
    }};
    ($store:expr, $event_type:expr, $account:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($store);
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user(&$account.id)
            .with_resource($resource_type, $resource_id);
        repo.log_best_effort(&event);
    }};
}
