//! HTTP API built on axum.
//!
//! - `GET /`: service banner
//! - `POST /api/evaluate`: JSON request in, HTML report out
//! - `GET /api/download-pdf`: query-string request in, PDF report out

use crate::dispatch::EndpointKind;
use crate::endpoint::HttpMethod;
use crate::error::{EvaluationError, Result};
use crate::evaluation::{EvaluationRequest, Evaluator};
use crate::report::{HtmlRenderer, PDF_FILENAME, PdfRenderer};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    evaluator: Arc<Evaluator>,
    html: Arc<HtmlRenderer>,
}

impl AppState {
    pub fn new(evaluator: Evaluator) -> Result<Self> {
        Ok(Self {
            evaluator: Arc::new(evaluator),
            html: Arc::new(HtmlRenderer::new()?),
        })
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }
}

/// Build the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.evaluator.config().server.allowed_origins);

    Router::new()
        .route("/", get(root_handler))
        .route("/api/evaluate", post(evaluate_handler))
        .route("/api/download-pdf", get(download_pdf_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins; `"*"` or an empty list allows any origin.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([CONTENT_DISPOSITION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let list: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        cors.allow_origin(AllowOrigin::list(list))
    }
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn run(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "RAG evaluation service listening");
    axum::serve(listener, app).await
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "RAG evaluation service" }))
}

async fn evaluate_handler(
    State(state): State<AppState>,
    Json(request): Json<EvaluationRequest>,
) -> Response {
    tracing::info!(
        endpoint = %request.target_url,
        endpoint_type = %request.endpoint_kind,
        "Received evaluation request"
    );

    let (status, page) = match state.evaluator.evaluate(&request).await {
        Ok(result) => (StatusCode::OK, state.html.render_report(&result)),
        Err(err) => {
            let status = match err {
                EvaluationError::Rejected { .. } => StatusCode::BAD_REQUEST,
                EvaluationError::AllFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, state.html.render_evaluation_error(&err))
        }
    };

    match page {
        Ok(html) => (status, Html(html)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to render HTML report");
            system_error(&state, &err.to_string())
        }
    }
}

fn system_error(state: &AppState, message: &str) -> Response {
    match state.html.render_system_error(message) {
        Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()).into_response(),
    }
}

fn default_response_path() -> String {
    "answer".to_string()
}

/// Query parameters of the PDF download. `headers` and `request_format`
/// arrive as JSON-encoded strings.
#[derive(Debug, Deserialize)]
pub struct PdfParams {
    #[serde(alias = "target_url")]
    pub rag_endpoint: String,
    #[serde(default, alias = "credential")]
    pub api_key: Option<String>,
    #[serde(default, alias = "endpoint_kind")]
    pub endpoint_type: EndpointKind,
    #[serde(default, alias = "http_method")]
    pub request_method: HttpMethod,
    #[serde(default = "default_response_path")]
    pub response_path: String,
    #[serde(default)]
    pub headers: Option<String>,
    #[serde(default)]
    pub request_format: Option<String>,
}

impl PdfParams {
    /// Decode the JSON-encoded parameters. The error is the client-facing message.
    pub fn into_request(self) -> std::result::Result<EvaluationRequest, &'static str> {
        let extra_headers = match self.headers.as_deref().filter(|h| !h.is_empty()) {
            Some(raw) => Some(
                serde_json::from_str::<HashMap<String, String>>(raw)
                    .map_err(|_| "Invalid JSON format in headers")?,
            ),
            None => None,
        };

        let request_template = match self.request_format.as_deref().filter(|f| !f.is_empty()) {
            Some(raw) if self.endpoint_type == EndpointKind::Custom => Some(
                serde_json::from_str::<Value>(raw)
                    .map_err(|_| "Invalid JSON format in request_format")?,
            ),
            _ => None,
        };

        Ok(EvaluationRequest {
            target_url: self.rag_endpoint,
            credential: self.api_key,
            endpoint_kind: self.endpoint_type,
            http_method: self.request_method,
            request_template,
            response_path: self.response_path,
            extra_headers,
        })
    }
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

async fn download_pdf_handler(
    State(state): State<AppState>,
    Query(params): Query<PdfParams>,
) -> Response {
    let request = match params.into_request() {
        Ok(request) => request,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, message),
    };

    tracing::info!(endpoint = %request.target_url, "Received PDF report request");

    let result = match state.evaluator.evaluate(&request).await {
        Ok(result) => result,
        Err(err @ EvaluationError::Rejected { .. }) => {
            return json_error(StatusCode::BAD_REQUEST, err.to_string());
        }
        Err(err) => {
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate PDF: {}", err),
            );
        }
    };

    let pdf = PdfRenderer::load(&state.evaluator.config().report)
        .and_then(|renderer| renderer.render(&result, chrono::Local::now()));

    match pdf {
        Ok(bytes) => (
            [
                (CONTENT_TYPE, "application/pdf".to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename={}", PDF_FILENAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Error generating PDF");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate PDF: {}", err),
            )
        }
    }
}
