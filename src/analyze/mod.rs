//! Analyze module
//!
//! Translates a content submission into a chat-completion request and the
//! model's answer back into the verdict JSON returned to the web client.
//!
//! ```text
//! form / multipart -> Submission -> ProviderRequest -> completion API
//!                                                          |
//!            verdict JSON or {raw_response} <- normalize <-+
//! ```
//!
//! - `submission`: form parsing and input normalisation
//! - `prompt`: instruction template and field escaping
//! - `request`: provider request types and model selection
//! - `client`: HTTP client, headers, retry
//! - `response`: envelope unwrapping and JSON extraction
//! - `context`: shared handler state

pub mod client;
pub mod context;
pub mod prompt;
pub mod request;
pub mod response;
pub mod submission;

use std::collections::HashMap;
use std::time::Instant;

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::logger;

pub use context::{AnalyzeContext, RetryConfig};
pub use submission::{FormInput, InputType, Submission};

/// Run one submission through the completion API.
pub async fn analyze(ctx: &AnalyzeContext, submission: &Submission) -> AppResult<Value> {
    let start = Instant::now();
    let body = request::build_provider_request(&ctx.settings, submission);

    logger::info(
        "analyze",
        &format!("Request started: model={}, {}", body.model, submission.summary()),
    );

    let headers = client::build_headers(&ctx.settings);
    let response = client::send_with_retry(
        &ctx.client,
        &ctx.settings.endpoint,
        headers,
        &body,
        &ctx.retry_config(),
    )
    .await?;

    let response_text = response.text().await.map_err(|e| {
        logger::error("analyze", &format!("Failed to read response body: {}", e));
        AppError::Provider(format!("Failed to read response: {}", e))
    })?;

    let envelope: Value = serde_json::from_str(&response_text).map_err(|e| {
        logger::error(
            "analyze",
            &format!(
                "Failed to parse response JSON: {}, body: {}",
                e,
                response_text.chars().take(500).collect::<String>()
            ),
        );
        AppError::Provider(format!("Failed to parse response: {}", e))
    })?;

    let content = response::completion_text(&envelope)?;
    let result = response::normalize(&content);

    logger::info(
        "analyze",
        &format!(
            "Request completed: model={}, latency={}ms, structured={}",
            body.model,
            start.elapsed().as_millis(),
            result.get("raw_response").is_none()
        ),
    );

    Ok(result)
}

async fn read_form(request: Request) -> AppResult<FormInput> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| AppError::InvalidInput(format!("Invalid multipart request: {}", e)))?;
        FormInput::from_multipart(multipart).await
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|rejection| {
                let message = format!("Invalid form body: {}", rejection.body_text());
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    AppError::TooLarge(message)
                } else {
                    AppError::InvalidInput(message)
                }
            })?;
        Ok(FormInput::from_fields(fields))
    } else {
        // No form body: same outcome as a form with no fields.
        Ok(FormInput::default())
    }
}

async fn handle(ctx: &AnalyzeContext, request: Request) -> AppResult<Value> {
    let input = read_form(request).await?;
    let submission = Submission::resolve(input)?;
    analyze(ctx, &submission).await
}

/// Route: POST /analyze-content
pub async fn analyze_content(State(ctx): State<AnalyzeContext>, request: Request) -> Response {
    match handle(&ctx, request).await {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    }
}
