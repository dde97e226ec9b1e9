//! # Spellgate
//!
//! A small backend that opens a protected page to anyone who types the
//! secret spell, one address at a time.
//!
//! # General Flow
//! - The landing page captures keystrokes and posts each one to `/keypress`
//!   together with a session UUID the browser makes up on load
//! - The server keeps a trailing window of keys per session and compares it
//!   against the configured spell on every keystroke
//! - The first session to complete the spell from a given source address
//!   gets a durable grant; every later match from that address is denied,
//!   so a leaked spell cannot be replayed from behind the same address
//! - `/protected_resource?session_id=...` checks the grant and nothing else
//!
//! # Notes
//!
//! ## Redb
//! Grants and address records must outlive the process, but the data is
//! tiny (two keyed record sets) and every access is a point lookup or a
//! single upsert. An embedded store gives that without running a database
//! server next to this one; redb's transactions cover the atomicity the
//! ledger needs.
//!
//! Key buffers stay in plain memory on purpose: a half-typed spell is
//! worthless across a restart.
//!
//! ## Address trust
//! `TRUST_FORWARDED_FOR` decides whether `X-Forwarded-For` is believed.
//! Only enable it behind a proxy that overwrites the header; spoofing
//! beyond that is explicitly not this service's problem.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};
use tokio::{
    net::TcpListener,
    signal::{
        ctrl_c,
        unix::{SignalKind, signal},
    },
};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod error;
pub mod gate;
pub mod routes;
pub mod spell;
pub mod state;
pub mod storage;

use routes::{index_handler, keypress_handler, not_found_handler, protected_handler};
use state::State;

pub fn app(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(index_handler))
        .route("/keypress", post(keypress_handler))
        .route("/protected_resource", get(protected_handler))
        .nest_service("/static", ServeDir::new("static"))
        .fallback(not_found_handler)
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new();

    info!("Starting server...");
    let router = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await.unwrap();
    info!("Server running on {address}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap();

    println!("Server shutting down...");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
