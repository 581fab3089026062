use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::{RequestBodyTimeoutLayer, TimeoutLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::service::StatsService;
use crate::stats::Statistics;
use crate::transaction::ValidationError;

/// Request bodies above this size are refused before parsing.
pub const BODY_LIMIT: usize = 1 << 20;

#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<StatsService>,
}

impl AppState {
    pub fn new(stats: StatsService) -> Self {
        Self {
            stats: Arc::new(stats),
        }
    }
}

/// Router with default timeouts and no `/metrics` route.
pub fn router(state: AppState) -> Router {
    create_router(state, &Config::default(), None)
}

pub fn create_router(state: AppState, cfg: &Config, metrics: Option<&Metrics>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route(
            "/transacao",
            post(create_transaction).delete(delete_transactions),
        )
        .route("/estatistica", get(statistics));

    if let Some(m) = metrics {
        app = app.merge(m.router::<AppState>());
    }

    with_middleware(app, cfg.server.read_timeout, cfg.server.write_timeout).with_state(state)
}

fn with_middleware(
    app: Router<AppState>,
    read_timeout: Duration,
    write_timeout: Duration,
) -> Router<AppState> {
    let trace = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            let request_id = req
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "http",
                method = %req.method(),
                path = %req.uri().path(),
                request_id
            )
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Last layer added runs first.
    app.layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CorsLayer::very_permissive())
        .layer(TimeoutLayer::new(write_timeout))
        .layer(RequestBodyTimeoutLayer::new(read_timeout))
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(trace)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/* ----------------------------
Wire types
---------------------------- */

#[derive(Debug, Deserialize)]
pub struct TransactionRequest {
    #[serde(rename = "valor")]
    pub value: f64,
    #[serde(rename = "dataHora")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    #[serde(rename = "valor")]
    pub value: f64,
    #[serde(rename = "dataHora")]
    pub timestamp: DateTime<Utc>,
}

/// Envelope used by the transaction endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    InvalidJson(String),
    InvalidTransaction(ValidationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::InvalidJson(message) => (
                StatusCode::BAD_REQUEST,
                ApiErrorBody {
                    code: "invalid_json",
                    message,
                    reason: None,
                },
            ),
            ApiError::InvalidTransaction(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiErrorBody {
                    code: "invalid_transaction",
                    message: e.to_string(),
                    reason: Some(e.kind()),
                },
            ),
        };
        let envelope: ApiResponse<()> = ApiResponse {
            success: false,
            data: None,
            error: Some(body),
        };
        (status, Json(envelope)).into_response()
    }
}

/* ----------------------------
Handlers
---------------------------- */

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn create_transaction(
    State(state): State<AppState>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResponse>>), ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "invalid transaction payload");
        ApiError::InvalidJson(rejection.body_text())
    })?;

    state
        .stats
        .add_transaction(req.value, req.timestamp)
        .map_err(ApiError::InvalidTransaction)?;

    info!(value = req.value, timestamp = %req.timestamp, "transaction created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TransactionResponse {
            value: req.value,
            timestamp: req.timestamp,
        })),
    ))
}

#[derive(Debug, Serialize)]
struct DeletedOut {
    message: &'static str,
}

async fn delete_transactions(State(state): State<AppState>) -> Json<ApiResponse<DeletedOut>> {
    state.stats.clear_transactions();
    Json(ApiResponse::ok(DeletedOut {
        message: "all transactions deleted",
    }))
}

async fn statistics(State(state): State<AppState>) -> Json<Statistics> {
    Json(state.stats.get_statistics())
}
