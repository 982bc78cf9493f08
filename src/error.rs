// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::accounts::AccountError;
use crate::ledger::LedgerError;
use crate::storage::StoreError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::not_found("Resource not found"),
            StoreError::AlreadyExists { .. } | StoreError::Conflict { .. } => {
                ApiError::conflict(e.to_string())
            }
            StoreError::Unavailable(_) => {
                tracing::error!(error = %e, "Storage unavailable");
                ApiError::service_unavailable("Storage temporarily unavailable")
            }
            StoreError::Serialization(_) | StoreError::InvalidDocument(_) => {
                tracing::error!(error = %e, "Corrupt stored document");
                ApiError::internal("Internal storage error")
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(_) => ApiError::not_found("Account not found"),
            LedgerError::Conflict { .. } => {
                ApiError::conflict("Ledger is busy for this account, retry later")
            }
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::UsernameTaken | AccountError::EmailTaken => {
                ApiError::conflict(e.to_string())
            }
            AccountError::NotFound(_) => ApiError::not_found("Account not found"),
            AccountError::SelfDeactivation | AccountError::InvalidInput(_) => {
                ApiError::bad_request(e.to_string())
            }
            AccountError::Hash(_) => {
                tracing::error!(error = %e, "Password hashing failed");
                ApiError::internal("Internal error")
            }
            AccountError::Store(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
