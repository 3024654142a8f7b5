//! Wayfarer HTTP 服务
//!
//! 启动: cargo run --bin wayfarer-web --features web
//! 端口优先取环境变量 PORT，其次 [server] port（默认 5000）

#![cfg(feature = "web")]

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::limit::ConcurrencyLimitLayer;

use wayfarer::agent::{spawn_run, BlogRequest, ResultSource, RunControl, TaskOutcome};
use wayfarer::config::load_config;
use wayfarer::core::{AgentBuilder, AgentComponents, AgentError};

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

struct AppState {
    components: AgentComponents,
}

#[derive(Debug, Deserialize)]
struct TravelRequest {
    #[serde(default)]
    query: String,
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct TravelResponse<'a> {
    response: &'a Value,
    fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    fallback_reason: Option<&'a str>,
}

fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

fn map_agent_error(e: AgentError) -> ApiError {
    match e {
        AgentError::InvalidRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
        AgentError::Cancelled => error_body(StatusCode::SERVICE_UNAVAILABLE, "request cancelled"),
        other => {
            tracing::error!("request failed: {}", other);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

fn fallback_reason<T>(outcome: &TaskOutcome<T>) -> Option<&str> {
    match &outcome.source {
        ResultSource::Fallback { reason } => Some(reason.as_str()),
        ResultSource::Agent => None,
    }
}

async fn travel(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TravelRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body.map_err(|e| error_body(StatusCode::BAD_REQUEST, e.body_text()))?;
    if req.query.trim().is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "No query provided"));
    }

    let outcome = spawn_run(RunControl::default(), move |control| async move {
        state
            .components
            .trip
            .plan_with(&req.query, req.session_id.as_deref(), control)
            .await
    })
    .await
    .map_err(map_agent_error)?;

    let body = TravelResponse {
        response: &outcome.document,
        fallback: outcome.is_fallback(),
        fallback_reason: fallback_reason(&outcome),
    };
    serde_json::to_value(&body)
        .map(Json)
        .map_err(|e| error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn blog_generator(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BlogRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = body.map_err(|e| error_body(StatusCode::BAD_REQUEST, e.body_text()))?;

    let outcome = spawn_run(RunControl::default(), move |control| async move {
        state.components.blog.generate_with(&req, control).await
    })
    .await
    .map_err(map_agent_error)?;

    let fallback = outcome.is_fallback();
    let reason = fallback_reason(&outcome).map(str::to_string);
    let mut value = outcome.document;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("fallback".to_string(), Value::Bool(fallback));
        if let Some(reason) = reason {
            obj.insert("fallback_reason".to_string(), Value::String(reason));
        }
    }
    Ok(Json(value))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    wayfarer::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });
    let server = cfg.server.clone();
    let components = AgentBuilder::from_config(cfg).build()?;
    let state = Arc::new(AppState { components });

    let app = Router::new()
        .route("/travel", post(travel))
        .route("/blog-generator", post(blog_generator))
        .route("/health", get(health))
        .layer(ConcurrencyLimitLayer::new(server.max_concurrent_requests.max(1)))
        .with_state(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(server.port);
    let addr = format!("{}:{}", server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Wayfarer web listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
