use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use tracing::{info, warn};

use recap_core::{pipeline::Recapper, selection::SelectionLimits};

use crate::handlers;
use crate::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Largest request body Slack sends us (events and forms are small).
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct AppState {
    pub recapper: Arc<Recapper>,
    pub signing_secret: String,
    pub limits: SelectionLimits,
    pub mention_keyword: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/slack/events", post(handlers::events::handle_events))
        .route("/slack/commands", post(handlers::commands::handle_command))
        .route(
            "/slack/interactions",
            post(handlers::interactions::handle_interaction),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            verify_slack_signature,
        ))
        .route("/health", get(health))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening for Slack requests");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// Buffers the body, checks the `v0` signature and hands the request on with
/// the same bytes.
async fn verify_slack_signature(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(
        &state.signing_secret,
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &bytes,
        Utc::now().timestamp(),
    ) {
        warn!(path = %parts.uri.path(), reason = %e, "rejected unsigned request");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
