use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json,
    extract::{ConnectInfo, Query, State as AppState},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::AppError, state::State};

#[derive(Deserialize)]
pub struct KeyPressEvent {
    pub key: String,
    pub uuid: String,
}

#[derive(Serialize)]
pub struct KeyPressReply {
    pub message: String,
    pub spell_successful: bool,
}

#[derive(Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ProtectedReply {
    pub message: String,
}

pub async fn index_handler() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

pub async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html(include_str!("../static/404.html")),
    )
}

pub async fn keypress_handler(
    AppState(state): AppState<Arc<State>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(event): Json<KeyPressEvent>,
) -> Result<Json<KeyPressReply>, AppError> {
    let address = source_address(
        &state,
        &headers,
        connect_info.map(|ConnectInfo(peer)| peer),
    );
    debug!("Key '{}' received from {}", event.key, event.uuid);

    let outcome = state
        .gate
        .register_keystroke(&event.uuid, &event.key, address.as_deref())?;

    let message = if outcome.granted_now {
        "Spell cast successfully! Access granted.".to_string()
    } else if outcome.replay_denied {
        // The gate rejects address-less matches, so there is one here.
        let address = address.as_deref().unwrap_or("unknown");
        format!("IP {address} has already cast the spell. Access denied.")
    } else {
        format!("Key '{}' received", event.key)
    };

    Ok(Json(KeyPressReply {
        message,
        spell_successful: outcome.granted_now,
    }))
}

pub async fn protected_handler(
    AppState(state): AppState<Arc<State>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<ProtectedReply>, AppError> {
    let session_id = query.session_id.ok_or(AppError::SessionRequired)?;

    if !state.gate.check_access(&session_id)? {
        return Err(AppError::AccessDenied);
    }

    Ok(Json(ProtectedReply {
        message: "Welcome to the protected resource! You cast the spell correctly.".to_string(),
    }))
}

/// Resolves the submitting address: the first `X-Forwarded-For` entry
/// when the config trusts it, otherwise the socket peer. Trusting the
/// header (or not) is the boundary layer's whole responsibility; the
/// gate only sees "some stable address string or nothing".
fn source_address(state: &State, headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if state.config.trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());

        if let Some(first) = forwarded {
            return Some(first.to_string());
        }
    }

    peer.map(|peer| peer.ip().to_string())
}
