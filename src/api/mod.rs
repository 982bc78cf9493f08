// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    accounts::ClientStats,
    auth::{Role, TokenPair},
    dashboard::DashboardSummary,
    ledger::{GrantOutcome, LedgerBalance, LoyaltyTier, ReconcileOutcome},
    state::AppState,
    storage::{AccountResponse, AuditEvent, AuditEventType, PointTransaction, TransactionKind},
};

pub mod admin;
pub mod auth;
pub mod client;
pub mod health;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me))
        .route("/client/dashboard", get(client::dashboard))
        .route("/client/points/history", get(client::points_history))
        .route("/client/premium", get(client::premium))
        .route(
            "/admin/accounts",
            get(admin::list_accounts).post(admin::create_account),
        )
        .route("/admin/accounts/{id}", put(admin::update_account))
        .route("/admin/accounts/{id}/status", put(admin::update_status))
        .route(
            "/admin/accounts/{id}/points",
            get(admin::account_points_history).post(admin::grant_points),
        )
        .route("/admin/accounts/{id}/tier", put(admin::override_tier))
        .route("/admin/accounts/{id}/reconcile", post(admin::reconcile))
        .route("/admin/stats", get(admin::client_stats))
        .route("/admin/audit", get(admin::query_audit_log));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

/// Registers the bearer scheme referenced by `security(("bearer_auth" = []))`.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::login,
        auth::register,
        auth::refresh,
        auth::me,
        client::dashboard,
        client::points_history,
        client::premium,
        admin::list_accounts,
        admin::create_account,
        admin::update_account,
        admin::update_status,
        admin::grant_points,
        admin::account_points_history,
        admin::override_tier,
        admin::reconcile,
        admin::client_stats,
        admin::query_audit_log
    ),
    components(
        schemas(
            Role,
            LoyaltyTier,
            TransactionKind,
            TokenPair,
            AccountResponse,
            PointTransaction,
            DashboardSummary,
            GrantOutcome,
            LedgerBalance,
            ReconcileOutcome,
            ClientStats,
            AuditEvent,
            AuditEventType,
            auth::LoginRequest,
            auth::RegisterRequest,
            client::TransactionHistoryResponse,
            client::PremiumSummary,
            admin::AccountListResponse,
            admin::CreateAccountRequest,
            admin::UpdateAccountRequest,
            admin::UpdateStatusRequest,
            admin::GrantPointsRequest,
            admin::TierOverrideRequest,
            admin::AuditLogResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Login, registration and token refresh"),
        (name = "Client", description = "Client portal: dashboard and points history"),
        (name = "Admin", description = "Account management, ledger operations and audit")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::storage::{Account, AccountRepository};

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_with(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn login(app: &Router, username: &str, password: &str) -> Value {
        let response = send(
            app,
            post_json(
                "/v1/auth/login",
                json!({ "username": username, "password": password }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    fn seed_admin(state: &AppState) -> Account {
        state
            .accounts
            .bootstrap_admin("root", "root@example.com", "admin-password")
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::in_memory());
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn register_login_and_read_dashboard() {
        let app = router(AppState::in_memory());

        let response = send(
            &app,
            post_json(
                "/v1/auth/register",
                json!({
                    "username": "dana",
                    "email": "dana@example.com",
                    "full_name": "Dana",
                    "password": "hunter2-hunter2",
                }),
                None,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let pair = login(&app, "dana", "hunter2-hunter2").await;
        let token = pair["access_token"].as_str().unwrap();

        let response = send(&app, get_with("/v1/client/dashboard", Some(token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_points"], 0);
        assert_eq!(body["loyalty_tier"], "bronze");
        assert_eq!(body["next_tier_points"], 500);

        // Standard clients are not premium.
        let response = send(&app, get_with("/v1/client/premium", Some(token))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized_with_challenge() {
        let app = router(AppState::in_memory());

        let response = send(&app, get_with("/v1/client/dashboard", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );
        let body = body_json(response).await;
        assert_eq!(body["error_code"], "not_authenticated");
    }

    #[tokio::test]
    async fn refresh_token_works_only_on_refresh() {
        let state = AppState::in_memory();
        seed_admin(&state);
        let app = router(state);

        let pair = login(&app, "root", "admin-password").await;
        let refresh_token = pair["refresh_token"].as_str().unwrap();

        let response = send(&app, get_with("/v1/auth/me", Some(refresh_token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&app, post_json("/v1/auth/refresh", json!({}), Some(refresh_token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["access_token"].is_string());
    }

    #[tokio::test]
    async fn admin_grants_points_end_to_end() {
        let state = AppState::in_memory();
        seed_admin(&state);
        let client = Account::new(
            "erin",
            "erin@example.com",
            "Erin",
            Role::ClientStandard,
            "unused".into(),
        );
        AccountRepository::new(state.store()).create(&client).unwrap();
        let app = router(state);

        let pair = login(&app, "root", "admin-password").await;
        let token = pair["access_token"].as_str().unwrap();

        let uri = format!("/v1/admin/accounts/{}/points", client.id);
        let response = send(
            &app,
            post_json(
                &uri,
                json!({ "points": 8000, "kind": "bonus", "description": "Launch bonus" }),
                Some(token),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_points"], 8000);
        assert_eq!(body["loyalty_tier"], "platinum");

        let response = send(&app, get_with(&uri, Some(token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["transactions"][0]["kind"], "bonus");
    }

    #[tokio::test]
    async fn client_cannot_reach_admin_routes() {
        let state = AppState::in_memory();
        state
            .accounts
            .create_account(crate::accounts::NewAccount {
                username: "frank".into(),
                email: "frank@example.com".into(),
                full_name: "Frank".into(),
                password: "frank-password".into(),
                role: Role::ClientPremium,
            })
            .unwrap();
        let app = router(state);

        let pair = login(&app, "frank", "frank-password").await;
        let token = pair["access_token"].as_str().unwrap();

        let response = send(&app, get_with("/v1/admin/stats", Some(token))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["error_code"], "insufficient_permissions");

        let response = send(&app, get_with("/v1/client/premium", Some(token))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let app = router(AppState::in_memory());

        let response = send(&app, get_with("/health/live", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = router(AppState::in_memory());

        let response = send(&app, get_with("/api-doc/openapi.json", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["paths"]["/v1/admin/accounts/{id}/points"].is_object());
        assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
    }
}
