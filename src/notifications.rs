// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fire-and-forget notification hook.
//!
//! The notification feed itself is owned elsewhere; this service only
//! writes entries into it.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::storage::collections::NOTIFICATIONS;
use crate::storage::{DocumentStore, StoreResult};

pub mod kinds {
    pub const ACCOUNT_CREATED: &str = "account_created";
}

/// Receives notifications. Callers never depend on delivery.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, kind: &str, payload: Value) -> StoreResult<()>;
}

/// Deliver a notification, logging and swallowing any failure.
pub fn notify_best_effort(sink: &dyn NotificationSink, kind: &str, payload: Value) {
    if let Err(e) = sink.notify(kind, payload) {
        tracing::warn!(error = %e, kind, "Notification dropped");
    }
}

/// Writes notifications as documents into the `notifications` collection.
pub struct StoreNotificationSink {
    store: Arc<dyn DocumentStore>,
}

impl StoreNotificationSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl NotificationSink for StoreNotificationSink {
    fn notify(&self, kind: &str, payload: Value) -> StoreResult<()> {
        let id = uuid::Uuid::new_v4().to_string();
        self.store.insert(
            NOTIFICATIONS,
            &id,
            json!({
                "id": id,
                "kind": kind,
                "payload": payload,
                "is_read": false,
                "created_at": Utc::now(),
            }),
        )
    }
}
