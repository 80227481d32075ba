//! RAG Evaluator - score question-answering endpoints against a fixed question set.
//!
//! The evaluator sends five reference questions to an endpoint, one after
//! the other, collects the answers and renders an HTML or PDF report with
//! a small set of metrics.
//!
//! # Overview
//!
//! Four kinds of endpoints are supported:
//! 1. Generic RAG services taking `groupid`/`query`/`session_id`
//! 2. OpenAI-style chat completion APIs
//! 3. Azure-style chat completion APIs (`api-key` header)
//! 4. Custom endpoints with a request template and a response path
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_evaluator::{
//!     config::Config,
//!     evaluation::{EvaluationRequest, Evaluator},
//!     report::HtmlRenderer,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!
//!     let evaluator = Evaluator::new(Arc::new(config))?;
//!     let request = EvaluationRequest::new("https://rag.example.com/ask");
//!
//!     let result = evaluator.evaluate(&request).await?;
//!     result.print_summary();
//!
//!     let html = HtmlRenderer::new()?.render_report(&result)?;
//!     std::fs::write("report.html", html)?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Evaluator**: runs the question set and aggregates metrics
//! - **Dispatcher**: one implementation per endpoint kind
//! - **EndpointOverrides**: per-host parameters, timeouts and methods
//! - **HtmlRenderer** / **PdfRenderer**: report output
//! - **server**: the axum HTTP API

pub mod config;
pub mod dataset;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod evaluation;
pub mod json;
pub mod report;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use dataset::{SampleCase, SampleSet, sample_cases};
pub use dispatch::{Dispatcher, EndpointKind};
pub use endpoint::{EndpointOverride, EndpointOverrides, HttpMethod};
pub use error::{DispatchError, DispatchErrorKind, EvaluationError, EvaluatorError, Result};
pub use evaluation::{EvaluationRequest, EvaluationResult, Evaluator, Metrics, QueryOutcome};
pub use report::{HtmlRenderer, PdfRenderer};
