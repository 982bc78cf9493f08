// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::signal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use relational_portal_server::{
    api::router,
    config::{AppConfig, LogFormat, StorageBackend, DEFAULT_LOG_FILTER},
    state::AppState,
    storage::{DocumentStore, MemoryStore, RedbStore},
};

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    init_logging(config.log_format);
    tracing::debug!(?config, "Configuration loaded");

    let store: Arc<dyn DocumentStore> = match config.storage_backend {
        StorageBackend::Redb => match RedbStore::open(&config.database_path()) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!(error = %e, path = %config.database_path().display(), "Failed to open database");
                process::exit(1);
            }
        },
        StorageBackend::Memory => {
            tracing::warn!("Running with the in-memory store. All data will be lost on shutdown.");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(store, config.clone());

    if let Some(seed) = &config.seed_admin {
        if let Err(e) = state
            .accounts
            .bootstrap_admin(&seed.username, &seed.email, &seed.password)
        {
            tracing::error!(error = %e, "Failed to bootstrap admin account");
            process::exit(1);
        }
    }

    let addr: SocketAddr = match config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, address = %config.bind_address(), "Failed to parse bind address");
            process::exit(1);
        }
    };

    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    let app = router(state);
    let served = match &config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");

            let tls_config = match RustlsConfig::from_pem_file(&tls.cert, &tls.key).await {
                Ok(tls_config) => tls_config,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to load TLS certificate or key");
                    process::exit(1);
                }
            };

            tracing::info!(%addr, "Portal server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            tracing::info!(%addr, "Portal server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
    };

    if let Err(e) = served {
        tracing::error!(error = %e, "Server failed");
        process::exit(1);
    }
    tracing::info!("Server shutdown complete");
}

/// JSON for log aggregation, human-readable text otherwise. `RUST_LOG`
/// overrides the default filter.
fn init_logging(format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init(),
    }
}

/// Wait for Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, initiating shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating shutdown"),
    }
}
