use std::collections::BTreeMap;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use presence_core::{ingest_webhook, HookRegistry, HookRequest, HookTable, MemoryTree, SharedInstance, StatusBoard};
use tokio::net::TcpListener;
use tracing::{debug, info};

#[derive(Clone)]
pub struct AppState {
    pub hooks: HookTable,
    pub instance: SharedInstance<MemoryTree>,
    pub status: StatusBoard,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/hook/{hook}", any(hook))
        .route("/status", get(status))
        .with_state(state)
}

pub async fn serve(listen: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding hook server to {listen}"))?;
    info!(%listen, "hook server listening");
    axum::serve(listener, router(state))
        .await
        .context("hook server stopped")
}

pub(crate) async fn hook(
    State(app): State<AppState>,
    Path(hook): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = format!("/hook/{hook}");
    if !app.hooks.is_registered(&path) {
        debug!(%path, "request for unknown hook");
        return StatusCode::NOT_FOUND.into_response();
    }

    let request = hook_request(&method, &headers, &body);
    let reply = ingest_webhook(&app.instance, &request).await.response();
    let code = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, reply.body).into_response()
}

pub(crate) async fn status(State(app): State<AppState>) -> Response {
    Json(app.status.current()).into_response()
}

pub(crate) fn hook_request(method: &Method, headers: &HeaderMap, body: &[u8]) -> HookRequest {
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect::<BTreeMap<_, _>>();

    HookRequest {
        method: method.as_str().to_string(),
        headers,
        body: String::from_utf8_lossy(body).into_owned(),
    }
}
