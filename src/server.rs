use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::any::Any;
use std::net::SocketAddr;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyHeader, CorsLayer};

use crate::analyze::{self, AnalyzeContext};
use crate::config::Settings;
use crate::error::{panic_message, AppError, AppResult};
use crate::logger::{self, LogLevel};

async fn health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                logger::warn("server", &format!("Ignoring invalid CORS origin: {}", origin));
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AnyHeader)
}

/// Panics inside a handler become the generic 500 body instead of a dropped
/// connection.
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    AppError::Unexpected(panic_message(&*payload)).into_response()
}

async fn log_requests(request: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let mut response = next.run(request).await;

    let status = response.status();
    let level = if status.is_server_error() {
        LogLevel::Error
    } else if status.is_client_error() {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };
    logger::log_with_metadata(
        level,
        "http",
        &format!(
            "{} {} -> {} ({}ms)",
            method,
            path,
            status.as_u16(),
            start.elapsed().as_millis()
        ),
        Some(&format!("request_id={}", request_id)),
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

pub fn app(ctx: AnalyzeContext) -> Router {
    let cors = cors_layer(&ctx.settings);
    let body_limit = ctx.settings.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/analyze-content", post(analyze::analyze_content))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(ctx)
}

pub async fn serve(settings: Settings) -> AppResult<()> {
    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid bind address '{}': {}", settings.bind_addr, e)))?;

    if !settings.has_api_key() {
        logger::warn(
            "server",
            "OPENROUTER_API_KEY is not set; upstream requests will be sent without authorization",
        );
    }
    logger::info(
        "server",
        &format!(
            "Using endpoint {} (text model {}, vision model {}, timeout {}s)",
            settings.endpoint, settings.text_model, settings.vision_model, settings.request_timeout_secs
        ),
    );

    let ctx = AnalyzeContext::new(settings)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    logger::info("server", &format!("Listening on {}", addr));

    axum::serve(listener, app(ctx))
        .await
        .map_err(|e| AppError::Unexpected(format!("Server error: {}", e)))
}
