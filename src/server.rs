//! HTTP surface.
//!
//! | Route | Method | Response |
//! |-------|--------|----------|
//! | `/api/analyze` | POST (multipart, field `file`) | classification JSON |
//! | `/health` | GET | `{"status":"healthy","version":...}` |
//! | `/` | GET | service banner |
//!
//! Errors are returned as `{"detail": "..."}` with the status chosen by
//! [`ErrorKind`]. Every `/api/analyze` response carries the caller's
//! remaining rate-limit budget in `X-RateLimit-*` headers.

use crate::analyze::Analyzer;
use crate::config::MailsortConfig;
use crate::error::{ErrorKind, MailsortError};
use crate::gatekeeper::{client_identity, RateLimiter};
use crate::output::{RateLimitStatus, UploadedDocument};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequestParts, Multipart, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, warn, Level};

pub const SERVICE_NAME: &str = "mailsort e-mail classifier";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Headroom above the upload limit so oversized files reach the size check
/// and get a descriptive 413 instead of a bare body-limit rejection.
const BODY_LIMIT_HEADROOM: usize = 1024 * 1024;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub limiter: Arc<RateLimiter>,
    pub max_upload_bytes: u64,
}

impl AppState {
    pub fn new(analyzer: Analyzer, limiter: RateLimiter, config: &MailsortConfig) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            limiter: Arc::new(limiter),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let body_limit = usize::try_from(state.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(BODY_LIMIT_HEADROOM);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/analyze", post(analyze_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: MailsortConfig) -> Result<(), MailsortError> {
    let analyzer = Analyzer::from_config(&config)?;
    let limiter = RateLimiter::from_config(&config);
    let state = AppState::new(analyzer, limiter, &config);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| MailsortError::Internal(format!("failed to bind {addr}: {e}")))?;
    info!("{} v{} listening on {} ({})", SERVICE_NAME, VERSION, addr, config.environment);

    axum::serve(
        listener,
        create_router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down");
    })
    .await
    .map_err(|e| MailsortError::Internal(format!("server error: {e}")))
}

// ── Extractors ───────────────────────────────────────────────────────────────

/// Rate-limit key of the caller; see [`client_identity`].
#[derive(Debug, Clone)]
pub struct ClientIdentity(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Present only when served with connect info; absent under `oneshot`.
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self(client_identity(&parts.headers, peer)))
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": SERVICE_NAME, "version": VERSION }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "version": VERSION }))
}

#[tracing::instrument(skip_all, fields(client = %client.0))]
async fn analyze_handler(
    State(state): State<AppState>,
    client: ClientIdentity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let ClientIdentity(client) = client;

    if let Err(e) = state.limiter.check(&client) {
        return with_rate_limit_headers(e.into_response(), state.limiter.status(&client));
    }

    let response = match read_upload(multipart).await {
        Ok(document) => match state.analyzer.analyze(&document).await {
            Ok(result) => {
                state.limiter.record(&client);
                (StatusCode::OK, Json(result)).into_response()
            }
            Err(e) => e.into_response(),
        },
        Err(response) => response,
    };

    with_rate_limit_headers(response, state.limiter.status(&client))
}

/// Pull the `file` field out of the multipart body.
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadedDocument, Response> {
    let mut multipart = multipart.map_err(|e| {
        warn!("Analyze request without a multipart body: {}", e);
        missing_file()
    })?;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => {
                warn!("Analyze request with no file field");
                return Err(missing_file());
            }
            Err(e) => return Err(detail(e.status(), e.body_text())),
        };
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| detail(e.status(), e.body_text()))?;

        return Ok(UploadedDocument {
            bytes: bytes.to_vec(),
            content_type,
            filename,
        });
    }
}

// ── Responses ────────────────────────────────────────────────────────────────

fn missing_file() -> Response {
    detail(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Field 'file' is required".to_string(),
    )
}

fn detail(status: StatusCode, detail: String) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::NotFound => StatusCode::BAD_REQUEST,
        ErrorKind::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::Upstream | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for MailsortError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        let message = match kind {
            ErrorKind::Internal => format!("Unexpected error processing file: {self}"),
            _ => self.to_string(),
        };
        if status.is_server_error() {
            error!("Analysis failed: {}", message);
        } else {
            info!("Request rejected ({}): {}", status, message);
        }
        detail(status, message)
    }
}

fn with_rate_limit_headers(mut response: Response, status: RateLimitStatus) -> Response {
    let headers: &mut HeaderMap = response.headers_mut();
    for (name, value) in [
        ("x-ratelimit-limit-5min", status.limit_5min),
        ("x-ratelimit-remaining-5min", status.remaining_5min),
        ("x-ratelimit-limit-24h", status.limit_24h),
        ("x-ratelimit-remaining-24h", status.remaining_24h),
    ] {
        headers.insert(name, HeaderValue::from(value));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::TooLarge), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(status_for(ErrorKind::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_for(ErrorKind::Upstream), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_errors_are_prefixed() {
        let response = MailsortError::Internal("disk full".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["detail"],
            "Unexpected error processing file: Internal error: disk full"
        );
    }

    #[test]
    fn headers_carry_remaining_budget() {
        let response = with_rate_limit_headers(
            StatusCode::OK.into_response(),
            RateLimitStatus {
                limit_5min: 10,
                remaining_5min: 7,
                limit_24h: 100,
                remaining_24h: 97,
            },
        );
        let h = response.headers();
        assert_eq!(h["x-ratelimit-limit-5min"], "10");
        assert_eq!(h["x-ratelimit-remaining-5min"], "7");
        assert_eq!(h["x-ratelimit-limit-24h"], "100");
        assert_eq!(h["x-ratelimit-remaining-24h"], "97");
    }
}
