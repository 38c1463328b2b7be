//! HTTP surface: `/ask_avatar`, `/ask_avatar_stream`, `/get_agent_info`, `/healthz`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::{AvatarError, Result};
use crate::services::avatar::messages;
use crate::services::AvatarService;

type SharedService = Arc<AvatarService>;

#[derive(Debug, Default, Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

impl AskRequest {
    /// A missing body, malformed JSON or a non-string question all read as
    /// an empty question.
    fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }
}

pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/ask_avatar", post(ask_handler))
        .route("/ask_avatar_stream", post(ask_stream_handler))
        .route("/get_agent_info", get(agent_info_handler))
        .route("/healthz", get(healthz_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                request_id = %Uuid::new_v4(),
                method = %req.method(),
                uri = %req.uri(),
            )
        }))
        .with_state(service)
}

/// Binds `bind` and serves until Ctrl-C.
pub async fn serve(service: SharedService, bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| AvatarError::Config(format!("invalid bind address {bind}: {e}")))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "avatar-rag listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Status and fixed message for a request that never produced an answer.
fn failure(error: &AvatarError) -> (StatusCode, &'static str) {
    match error {
        AvatarError::EmptyQuestion => (StatusCode::BAD_REQUEST, messages::EMPTY_QUESTION),
        AvatarError::NotReady => (StatusCode::INTERNAL_SERVER_ERROR, messages::NOT_READY),
        other => {
            tracing::error!(error = %other, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, messages::APOLOGY)
        }
    }
}

async fn ask_handler(State(service): State<SharedService>, body: Bytes) -> Response {
    let request = AskRequest::from_body(&body);

    match service.ask(&request.question).await {
        Ok(answer) => Json(json!({ "response": answer })).into_response(),
        Err(e) => {
            let (status, message) = failure(&e);
            (status, Json(json!({ "response": message }))).into_response()
        }
    }
}

async fn ask_stream_handler(State(service): State<SharedService>, body: Bytes) -> Response {
    let request = AskRequest::from_body(&body);

    let events = match service.ask_stream(&request.question) {
        Ok(events) => events,
        Err(e) => {
            let (status, message) = failure(&e);
            return (status, Json(json!({ "error": message }))).into_response();
        }
    };

    let frames = events.map(|event| Ok::<_, Infallible>(event.to_sse_frame()));

    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

async fn agent_info_handler(State(service): State<SharedService>) -> Json<Value> {
    Json(service.agent_info())
}

async fn healthz_handler(State(service): State<SharedService>) -> Response {
    let stats = service.knowledge().stats();
    let status = if stats.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(stats)).into_response()
}
