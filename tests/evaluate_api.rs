//! End-to-end tests: the evaluation API against mock endpoints.

mod common;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{Hits, api, get as api_get, post_json, serve, test_config};
use pretty_assertions::assert_eq;
use rag_evaluator::dataset::{SampleCase, SampleSet};
use rag_evaluator::dispatch::EndpointKind;
use rag_evaluator::endpoint::{EndpointOverride, EndpointOverrides, HttpMethod};
use rag_evaluator::error::{DispatchErrorKind, EvaluationError};
use rag_evaluator::evaluation::{EvaluationRequest, Evaluator, OutcomeStatus};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn chat_completion(
    State(hits): State<Hits>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    hits.hit();
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer sk-test");
    if !authorized || body["model"] != "gpt-3.5-turbo" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "message": "Invalid API key" } })),
        )
            .into_response();
    }
    let question = body["messages"][0]["content"].as_str().unwrap_or_default();
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": format!("Answer to {}", question) } }]
    }))
    .into_response()
}

async fn openai_mock() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completion))
        .with_state(hits.clone());
    (format!("{}/v1/chat/completions", serve(app).await), hits)
}

async fn always_500(State(hits): State<Hits>) -> StatusCode {
    hits.hit();
    StatusCode::INTERNAL_SERVER_ERROR
}

fn one_case() -> SampleSet {
    let mut set = SampleSet::new("one");
    set.add_case(SampleCase::new("Who?", "Ada"));
    set
}

#[tokio::test]
async fn test_openai_endpoint_answers() {
    let (url, hits) = openai_mock().await;
    let request = EvaluationRequest {
        endpoint_kind: EndpointKind::Openai,
        credential: Some("sk-test".to_string()),
        ..EvaluationRequest::new(url)
    };

    let evaluator = Evaluator::new(Arc::new(test_config())).unwrap();
    let result = evaluator.evaluate(&request).await.unwrap();

    assert_eq!(hits.count(), 5);
    assert_eq!(result.endpoint_kind, EndpointKind::Openai);
    assert_eq!(result.success_count, 5);
    for outcome in &result.outcomes {
        assert_eq!(outcome.status(), OutcomeStatus::Success);
        assert_eq!(outcome.produced_answer(), format!("Answer to {}", outcome.question));
    }
    assert_eq!(result.metrics.context_recall, 0.0);
}

#[tokio::test]
async fn test_openai_report_html() {
    let (url, _hits) = openai_mock().await;
    let (status, html) = post_json(
        api(test_config()),
        "/api/evaluate",
        json!({ "target_url": url, "endpoint_kind": "openai", "credential": "sk-test" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("<td>Answer to Who introduced the theory of relativity?</td>"));
    assert!(html.contains("<span>92.0%</span>"));
}

#[tokio::test]
async fn test_openai_key_from_config() {
    let (url, hits) = openai_mock().await;
    let config = rag_evaluator::Config {
        openai_api_key: Some("sk-test".to_string()),
        ..test_config()
    };
    let request = EvaluationRequest {
        endpoint_kind: EndpointKind::Openai,
        ..EvaluationRequest::new(url)
    };

    let result = Evaluator::new(Arc::new(config))
        .unwrap()
        .with_cases(one_case())
        .evaluate(&request)
        .await
        .unwrap();
    assert_eq!(result.outcomes[0].produced_answer(), "Answer to Who?");
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn test_empty_credential_falls_back_to_config_key() {
    let (url, hits) = openai_mock().await;
    let config = rag_evaluator::Config {
        openai_api_key: Some("sk-test".to_string()),
        ..test_config()
    };
    let request = EvaluationRequest {
        endpoint_kind: EndpointKind::Openai,
        credential: Some(String::new()),
        ..EvaluationRequest::new(url)
    };

    let result = Evaluator::new(Arc::new(config))
        .unwrap()
        .with_cases(one_case())
        .evaluate(&request)
        .await
        .unwrap();
    assert_eq!(result.outcomes[0].produced_answer(), "Answer to Who?");
    assert_eq!(hits.count(), 1);
}

#[tokio::test]
async fn test_invalid_scheme_is_400_without_dispatch() {
    let hits = Hits::default();
    let app = Router::new()
        .fallback(always_500)
        .with_state(hits.clone());
    let base = serve(app).await;
    let url = base.replace("http://", "ftp://");

    let (status, html) = post_json(
        api(test_config()),
        "/api/evaluate",
        json!({ "rag_endpoint": url }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("Invalid endpoint URL:"));
    assert_eq!(hits.count(), 0);
}

#[tokio::test]
async fn test_custom_endpoint_response_path() {
    let hits = Hits::default();
    let app = Router::new()
        .route(
            "/ask",
            post(|State(hits): State<Hits>, Json(body): Json<Value>| async move {
                hits.hit();
                if body["input"]["question"].as_str().is_some_and(|q| q.ends_with('?')) {
                    Json(json!({ "data": { "answer": "42" } })).into_response()
                } else {
                    StatusCode::BAD_REQUEST.into_response()
                }
            }),
        )
        .with_state(hits.clone());
    let url = format!("{}/ask", serve(app).await);

    let request = EvaluationRequest {
        endpoint_kind: EndpointKind::Custom,
        http_method: HttpMethod::Post,
        request_template: Some(json!({ "input": { "question": "{prompt}" } })),
        response_path: "data.answer".to_string(),
        ..EvaluationRequest::new(url)
    };

    let result = Evaluator::new(Arc::new(test_config()))
        .unwrap()
        .evaluate(&request)
        .await
        .unwrap();

    assert_eq!(hits.count(), 5);
    for outcome in &result.outcomes {
        assert_eq!(outcome.produced_answer(), "42");
    }
}

#[tokio::test]
async fn test_custom_get_flattens_template() {
    let app = Router::new().route(
        "/search",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            Json(json!({ "results": [{ "text": params.get("input_text").cloned().unwrap_or_default() }] }))
        }),
    );
    let url = format!("{}/search", serve(app).await);

    let request = EvaluationRequest {
        endpoint_kind: EndpointKind::Custom,
        http_method: HttpMethod::Get,
        request_template: Some(json!({ "input": { "text": "Q: {prompt}" } })),
        response_path: "results.0.text".to_string(),
        ..EvaluationRequest::new(url)
    };

    let result = Evaluator::new(Arc::new(test_config()))
        .unwrap()
        .with_cases(one_case())
        .evaluate(&request)
        .await
        .unwrap();
    assert_eq!(result.outcomes[0].produced_answer(), "Q: Who?");
}

#[tokio::test]
async fn test_custom_plain_text_kept_whole() {
    let long_answer = "plain ".repeat(150);
    let body = long_answer.clone();
    let app = Router::new().route("/ask", post(move || async move { body }));
    let url = format!("{}/ask", serve(app).await);

    let request = EvaluationRequest {
        endpoint_kind: EndpointKind::Custom,
        http_method: HttpMethod::Post,
        request_template: Some(json!({ "q": "{prompt}" })),
        response_path: "data.answer".to_string(),
        ..EvaluationRequest::new(url)
    };

    let result = Evaluator::new(Arc::new(test_config()))
        .unwrap()
        .with_cases(one_case())
        .evaluate(&request)
        .await
        .unwrap();
    assert_eq!(result.outcomes[0].status(), OutcomeStatus::Success);
    assert_eq!(result.outcomes[0].produced_answer(), long_answer);
    assert!(long_answer.chars().count() > rag_evaluator::dispatch::RAW_TEXT_LIMIT);
}

#[tokio::test]
async fn test_custom_missing_path_is_error() {
    let app = Router::new().route("/ask", post(|| async { Json(json!({ "data": {} })) }));
    let url = format!("{}/ask", serve(app).await);

    let request = EvaluationRequest {
        endpoint_kind: EndpointKind::Custom,
        http_method: HttpMethod::Post,
        request_template: Some(json!({ "q": "{prompt}" })),
        response_path: "data.answer".to_string(),
        ..EvaluationRequest::new(url)
    };

    let err = Evaluator::new(Arc::new(test_config()))
        .unwrap()
        .with_cases(one_case())
        .evaluate(&request)
        .await
        .unwrap_err();
    match err {
        EvaluationError::AllFailed { errors, .. } => {
            assert_eq!(
                errors,
                vec![r#"Query 1: Error: Could not find path 'data.answer' in response: {"data":{}}"#.to_string()]
            );
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_all_failed_is_500_with_capped_errors() {
    let hits = Hits::default();
    let app = Router::new().fallback(always_500).with_state(hits.clone());
    let url = serve(app).await;

    let (status, html) = post_json(
        api(test_config()),
        "/api/evaluate",
        json!({ "rag_endpoint": url, "endpoint_type": "generic" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(html.contains("All queries failed."));
    assert_eq!(html.matches("<li>Query ").count(), 3);
    assert!(html.contains("<li>...and 2 more errors</li>"));
    // Error statuses are not retried
    assert_eq!(hits.count(), 5);
}

#[tokio::test]
async fn test_partial_failure_renders_warnings() {
    let app = Router::new().fallback(|Query(params): Query<HashMap<String, String>>| async move {
        let query = params.get("query").cloned().unwrap_or_default();
        if query.contains("Newton") {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        } else {
            Json(json!({ "answer": "ok" })).into_response()
        }
    });
    let url = serve(app).await;

    let (status, html) = post_json(api(test_config()), "/api/evaluate", json!({ "rag_endpoint": url })).await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("4 out of 5 queries completed successfully"));
    assert!(html.contains("<li>Query 3: Error: "));
}

#[tokio::test]
async fn test_generic_sends_default_params() {
    let app = Router::new().route(
        "/rag",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            Json(json!({
                "result": format!("{}|{}|{}", params["groupid"], params["session_id"], params["query"])
            }))
        }),
    );
    let url = format!("{}/rag", serve(app).await);

    let result = Evaluator::new(Arc::new(test_config()))
        .unwrap()
        .with_cases(one_case())
        .evaluate(&EvaluationRequest::new(url))
        .await
        .unwrap();
    assert_eq!(result.outcomes[0].produced_answer(), "12|111|Who?");
}

#[tokio::test]
async fn test_generic_override_posts_json() {
    let app = Router::new().route(
        "/query",
        post(|Json(body): Json<Value>| async move {
            Json(json!({ "response": format!("{}:{}", body["groupid"], body["query"].as_str().unwrap_or("")) }))
        }),
    );
    let base = serve(app).await;
    let host = base.trim_start_matches("http://").to_string();

    let mut params = serde_json::Map::new();
    params.insert("groupid".to_string(), json!(7));
    let config = rag_evaluator::Config {
        endpoints: EndpointOverrides::new(vec![EndpointOverride {
            pattern: host,
            note: None,
            timeout_secs: Some(2.0),
            params: Some(params),
            method: Some(HttpMethod::Post),
        }]),
        ..test_config()
    };

    let result = Evaluator::new(Arc::new(config))
        .unwrap()
        .with_cases(one_case())
        .evaluate(&EvaluationRequest::new(format!("{}/query", base)))
        .await
        .unwrap();
    assert_eq!(result.outcomes[0].produced_answer(), "7:Who?");
}

#[tokio::test]
async fn test_generic_timeout_is_bounded() {
    let hits = Hits::default();
    let app = Router::new()
        .fallback(|State(hits): State<Hits>| async move {
            hits.hit();
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(json!({ "answer": "too late" }))
        })
        .with_state(hits.clone());
    let url = serve(app).await;

    let config = rag_evaluator::Config {
        endpoints: EndpointOverrides::empty(),
        ..rag_evaluator::Config::with_timeouts(0.4, 2)
    };
    let start = Instant::now();
    let err = Evaluator::new(Arc::new(config))
        .unwrap()
        .with_cases(one_case())
        .evaluate(&EvaluationRequest::new(url))
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs_f64(0.4 * 2.0 + 0.5));
    assert_eq!(hits.count(), 2);
    match err {
        EvaluationError::AllFailed { errors, .. } => assert_eq!(
            errors,
            vec!["Query 1: Error: Server response timeout. Please try again later or check your endpoint configuration.".to_string()]
        ),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_refused_is_not_retried() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let evaluator = Evaluator::new(Arc::new(test_config()))
        .unwrap()
        .with_cases(one_case());
    let request = EvaluationRequest::new(format!("http://{}/rag", addr));

    let start = Instant::now();
    let err = evaluator.evaluate(&request).await.unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(2));

    let EvaluationError::AllFailed { errors, .. } = err else {
        panic!("expected all-failed");
    };
    assert!(errors[0].starts_with("Query 1: Error: Unable to connect to the server."));
}

#[tokio::test]
async fn test_azure_requires_key() {
    let hits = Hits::default();
    let app = Router::new().fallback(always_500).with_state(hits.clone());
    let url = serve(app).await;

    let request = EvaluationRequest {
        endpoint_kind: EndpointKind::Azure,
        ..EvaluationRequest::new(url)
    };
    let evaluator = Evaluator::new(Arc::new(test_config())).unwrap();
    let err = evaluator.evaluate(&request).await.unwrap_err();

    assert_eq!(hits.count(), 0);
    let EvaluationError::AllFailed { errors, .. } = err else {
        panic!("expected all-failed");
    };
    assert_eq!(errors.len(), 5);
    assert_eq!(errors[0], "Query 1: Error: API key not provided for Azure endpoint.");
}

#[tokio::test]
async fn test_outcome_kinds_survive_in_result() {
    let app = Router::new().fallback(|Query(params): Query<HashMap<String, String>>| async move {
        if params.get("query").is_some_and(|q| q.contains("relativity")) {
            Json(json!({ "answer": "Error: model overloaded" })).into_response()
        } else {
            "plain text answer".into_response()
        }
    });
    let url = serve(app).await;

    let result = Evaluator::new(Arc::new(test_config()))
        .unwrap()
        .evaluate(&EvaluationRequest::new(url))
        .await
        .unwrap();

    let first = &result.outcomes[0];
    assert_eq!(first.error().map(|e| e.kind), Some(DispatchErrorKind::Upstream));
    assert_eq!(first.produced_answer(), "Error: model overloaded");
    assert_eq!(result.outcomes[1].produced_answer(), "plain text answer");
    assert_eq!(result.success_count, 4);
}

#[tokio::test]
async fn test_pdf_rejects_bad_json_params() {
    let (status, _, body) = api_get(
        api(test_config()),
        "/api/download-pdf?rag_endpoint=http%3A%2F%2F127.0.0.1%3A9%2F&headers=notjson",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Invalid JSON format in headers");

    let (status, _, body) = api_get(
        api(test_config()),
        "/api/download-pdf?rag_endpoint=http%3A%2F%2F127.0.0.1%3A9%2F&endpoint_type=custom&request_format=%7Bx",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Invalid JSON format in request_format");
}

#[tokio::test]
async fn test_pdf_invalid_url_and_all_failed() {
    let (status, _, body) = api_get(
        api(test_config()),
        "/api/download-pdf?rag_endpoint=ftp%3A%2F%2Fexample.com",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("ftp://example.com"));

    let hits = Hits::default();
    let app = Router::new().fallback(always_500).with_state(hits.clone());
    let url = serve(app).await;
    let uri = format!(
        "/api/download-pdf?rag_endpoint={}",
        url.replace(':', "%3A").replace('/', "%2F")
    );

    let (status, _, body) = api_get(api(test_config()), &uri).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().starts_with("Failed to generate PDF: All queries failed"));
    assert_eq!(hits.count(), 5);
}

/// Copies system DejaVu fonts into a temp dir under the report font names.
/// `None` when the host has no DejaVu fonts.
fn report_fonts() -> Option<tempfile::TempDir> {
    let system = std::path::Path::new("/usr/share/fonts/truetype/dejavu");
    let regular = system.join("DejaVuSans.ttf");
    let bold = system.join("DejaVuSans-Bold.ttf");
    if !regular.exists() || !bold.exists() {
        return None;
    }
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::copy(regular, dir.path().join("Poppins-Regular.ttf")).unwrap();
    std::fs::copy(bold, dir.path().join("Poppins-Bold.ttf")).unwrap();
    Some(dir)
}

#[tokio::test]
async fn test_pdf_download_succeeds() {
    let Some(fonts) = report_fonts() else {
        eprintln!("skipping: no DejaVu fonts on this host");
        return;
    };

    let app = Router::new().fallback(|| async { Json(json!({ "answer": "Ada Lovelace" })) });
    let url = serve(app).await;
    let mut config = test_config();
    config.report.fonts_dir = fonts.path().to_path_buf();

    let uri = format!(
        "/api/download-pdf?rag_endpoint={}",
        url.replace(':', "%3A").replace('/', "%2F")
    );
    let (status, headers, body) = api_get(api(config), &uri).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/pdf");
    assert_eq!(
        headers["content-disposition"],
        "attachment; filename=rag_evaluation_report.pdf"
    );
    assert!(body.starts_with(b"%PDF-"));
}
