use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::core::{
    Downloader, ErrorKind, Orchestrator, ResolutionRequest, ResolveFailure, SUPPORTED_QUALITIES,
};
use crate::utils::attachment_filename;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub downloader: Arc<Downloader>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/resolve", get(resolve_handler))
        .route("/api/download", get(download_handler))
        .route("/api/backends", get(backends_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ResolveParams {
    url: String,
    quality: Option<String>,
}

async fn resolve_handler(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> Response {
    let request = match build_request(params) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.orchestrator.resolve(&request).await {
        Ok(descriptor) => Json(descriptor).into_response(),
        Err(failure) => failure_response(&failure),
    }
}

async fn download_handler(
    State(state): State<AppState>,
    Query(params): Query<ResolveParams>,
) -> Response {
    let request = match build_request(params) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let descriptor = match state.orchestrator.resolve(&request).await {
        Ok(descriptor) => descriptor,
        Err(failure) => return failure_response(&failure),
    };

    let upstream = match state.downloader.fetch(&descriptor).await {
        Ok(upstream) => upstream,
        Err(e) => {
            return error_response(
                StatusCode::BAD_GATEWAY,
                format!("Error fetching resolved resource: {e}"),
            )
        }
    };

    info!(
        "Streaming {} ({} bytes)",
        descriptor.resolved_url,
        upstream
            .content_length()
            .map_or_else(|| "unknown".to_string(), |s| s.to_string())
    );

    let filename = attachment_filename(&descriptor, request.quality());
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let mut builder = axum::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        );
    if let Some(len) = upstream.content_length() {
        builder = builder.header(header::CONTENT_LENGTH, len);
    }

    let stream = upstream.bytes_stream().map_err(std::io::Error::other);
    match builder.body(Body::from_stream(stream)) {
        Ok(response) => response,
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn backends_handler(State(state): State<AppState>) -> Response {
    Json(json!({ "backends": state.orchestrator.registry().snapshot() })).into_response()
}

async fn index_handler() -> Html<&'static str> {
    Html(
        r#"<h1>vidgate</h1>
<p>Available endpoints:</p>
<ul>
    <li><strong>Resolve:</strong> GET /api/resolve?url=MEDIA_URL&quality=720</li>
    <li><strong>Download:</strong> GET /api/download?url=MEDIA_URL&quality=720</li>
    <li><strong>Backends:</strong> GET /api/backends</li>
</ul>
<p>Supported qualities: 144, 240, 360, 480, 540, 720, 1080, 1440, 2160, best, worst</p>"#,
    )
}

fn build_request(params: ResolveParams) -> Result<ResolutionRequest, Response> {
    if let Some(quality) = &params.quality {
        if !SUPPORTED_QUALITIES.contains(&quality.as_str()) {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                format!(
                    "Unsupported quality. Use: {}",
                    SUPPORTED_QUALITIES.join(", ")
                ),
            ));
        }
    }

    let mut request = ResolutionRequest::new(params.url);
    if let Some(quality) = params.quality {
        request = request.with_format_hint(quality);
    }
    Ok(request)
}

/// 400 for a malformed request, 504 when every backend timed out (capacity
/// or outage signal), 502 otherwise; the body always carries the full
/// per-backend failure list.
fn failure_response(failure: &ResolveFailure) -> Response {
    let status = match failure {
        ResolveFailure::Invalid(_) => StatusCode::BAD_REQUEST,
        ResolveFailure::Exhausted(errors) => {
            if !errors.is_empty() && errors.iter().all(|e| e.kind == ErrorKind::Timeout) {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::BAD_GATEWAY
            }
        }
    };

    let body = Json(json!({
        "error": failure.to_string(),
        "backends": failure.errors(),
    }));

    (status, body).into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BackendError;

    #[test]
    fn test_failure_status_mapping() {
        let invalid = ResolveFailure::Invalid(BackendError::invalid("empty URL"));
        assert_eq!(failure_response(&invalid).status(), StatusCode::BAD_REQUEST);

        let all_timeouts = ResolveFailure::Exhausted(vec![
            BackendError::timeout("a", "deadline"),
            BackendError::timeout("b", "deadline"),
        ]);
        assert_eq!(
            failure_response(&all_timeouts).status(),
            StatusCode::GATEWAY_TIMEOUT
        );

        let mixed = ResolveFailure::Exhausted(vec![
            BackendError::timeout("a", "deadline"),
            BackendError::upstream("b", "HTTP 500"),
        ]);
        assert_eq!(failure_response(&mixed).status(), StatusCode::BAD_GATEWAY);

        let nothing_tried = ResolveFailure::Exhausted(vec![]);
        assert_eq!(
            failure_response(&nothing_tried).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_quality_validation() {
        let ok = build_request(ResolveParams {
            url: "https://example.com/x".to_string(),
            quality: Some("720".to_string()),
        });
        assert_eq!(ok.unwrap().quality(), "720");

        let bad = build_request(ResolveParams {
            url: "https://example.com/x".to_string(),
            quality: Some("4000".to_string()),
        });
        assert_eq!(bad.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
