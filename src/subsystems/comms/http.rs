//! HTTP channel: the messaging endpoint the bot service posts activities to,
//! plus a health check and the static views used by the sign-in flow.
//!
//! ```text
//! POST /api/messages        activity in, invoke response out
//! GET  /api/health
//! GET  /StaticViews/*path   files under `http.static_views_dir`
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, info, warn};

use crate::botframework::activity::Activity;
use crate::botframework::adapter::{Bot, BotAdapter, TurnOutcome};
use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};

/// Router state. Cheap to clone.
#[derive(Clone)]
pub struct HttpState {
    pub bot_name: Arc<str>,
    pub adapter: Arc<BotAdapter>,
    pub bot: Arc<dyn Bot>,
}

impl HttpState {
    pub fn new(bot_name: &str, adapter: BotAdapter, bot: impl Bot + 'static) -> Self {
        Self {
            bot_name: Arc::from(bot_name),
            adapter: Arc::new(adapter),
            bot: Arc::new(bot),
        }
    }
}

pub fn build_router(state: HttpState, static_views_dir: &Path) -> Router {
    Router::new()
        .route("/api/messages", post(messages))
        .route("/api/health", get(health))
        .nest_service("/StaticViews", ServeDir::new(static_views_dir))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("X-Requested-With"),
        ))
        .with_state(state)
}

/// POST /api/messages
async fn messages(State(state): State<HttpState>, headers: HeaderMap, body: Bytes) -> Response {
    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(a) => a,
        Err(e) => {
            debug!("rejecting malformed activity: {e}");
            return error_response(&AppError::BadRequest(format!("invalid activity: {e}")));
        }
    };

    let auth_header = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());

    match state.adapter.process(auth_header, activity, state.bot.as_ref()).await {
        Ok(TurnOutcome::Accepted) => StatusCode::OK.into_response(),
        Ok(TurnOutcome::Invoke(response)) => {
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            match response.body {
                Some(body) => (status, Json(body)).into_response(),
                None => status.into_response(),
            }
        }
        Err(e) => {
            warn!("activity rejected: {e}");
            error_response(&e)
        }
    }
}

/// GET /api/health
async fn health(State(state): State<HttpState>) -> Response {
    Json(json!({ "status": "ok", "bot": &*state.bot_name })).into_response()
}

fn error_response(err: &AppError) -> Response {
    let (status, code) = match err {
        AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
        AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (status, Json(json!({ "error": code, "message": err.to_string() }))).into_response()
}

// ── HttpChannel ───────────────────────────────────────────────────────────────

pub struct HttpChannel {
    channel_id: String,
    bind_addr: String,
    static_views_dir: PathBuf,
    state: HttpState,
}

impl HttpChannel {
    pub fn new(
        channel_id: impl Into<String>,
        bind_addr: impl Into<String>,
        static_views_dir: impl Into<PathBuf>,
        state: HttpState,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            bind_addr: bind_addr.into(),
            static_views_dir: static_views_dir.into(),
            state,
        }
    }
}

impl Component for HttpChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_http(*self, shutdown))
    }
}

async fn run_http(channel: HttpChannel, shutdown: CancellationToken) -> Result<(), AppError> {
    let HttpChannel { channel_id, bind_addr, static_views_dir, state } = channel;
    let router = build_router(state, &static_views_dir);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Comms(format!("http bind failed on {bind_addr}: {e}")))?;
    let port = listener.local_addr()?.port();

    info!(%channel_id, "Listening to {port}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Comms(format!("http server error: {e}")))?;

    info!(%channel_id, "http channel shut down");
    Ok(())
}
