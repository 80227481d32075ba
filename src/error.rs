//! Error types for the evaluator.
//!
//! Three layers of failure exist and each has its own type:
//! - [`EvaluatorError`]: infrastructure failures (config, I/O, rendering).
//! - [`DispatchError`]: a single query against the evaluated endpoint failed.
//! - [`EvaluationError`]: a whole run was rejected or produced no answers.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, EvaluatorError>;

/// Infrastructure errors that can occur in the evaluator.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error during serialization/deserialization.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction or transport error outside of dispatch.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// HTML template registration or rendering error.
    #[error("Template error: {0}")]
    Template(String),

    /// Font loading error.
    #[error("Failed to load font '{path}': {message}")]
    Font { path: PathBuf, message: String },

    /// PDF layout or rendering error.
    #[error("PDF rendering error: {0}")]
    Pdf(String),
}

impl EvaluatorError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for EvaluatorError {
    fn from(err: reqwest::Error) -> Self {
        EvaluatorError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for EvaluatorError {
    fn from(err: serde_json::Error) -> Self {
        EvaluatorError::Serialization(err.to_string())
    }
}

impl From<handlebars::RenderError> for EvaluatorError {
    fn from(err: handlebars::RenderError) -> Self {
        EvaluatorError::Template(err.to_string())
    }
}

impl From<handlebars::TemplateError> for EvaluatorError {
    fn from(err: handlebars::TemplateError) -> Self {
        EvaluatorError::Template(err.to_string())
    }
}

impl From<genpdf::error::Error> for EvaluatorError {
    fn from(err: genpdf::error::Error) -> Self {
        EvaluatorError::Pdf(err.to_string())
    }
}

/// Category of a failed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchErrorKind {
    /// Every attempt ran into the per-request timeout.
    Timeout,
    /// The endpoint could not be reached.
    Connection,
    /// The endpoint answered with a non-success status.
    HttpStatus,
    /// Any other transport-level failure.
    Request,
    /// The response body could not be interpreted.
    InvalidResponse,
    /// The configured response path does not exist in the response.
    PathNotFound,
    /// The endpoint kind needs a credential and none was available.
    MissingCredential,
    /// The endpoint itself answered with an error message. The message is
    /// the endpoint's answer, prefix included.
    Upstream,
    /// Anything not covered above, e.g. a panicking dispatcher.
    Unexpected,
}

/// A failed query against an evaluated endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchError {
    pub kind: DispatchErrorKind,
    pub message: String,
}

impl DispatchError {
    pub fn new(kind: DispatchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::Timeout, message)
    }

    pub fn missing_credential(message: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::MissingCredential, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::InvalidResponse, message)
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::Unexpected, message)
    }

    /// An answer the endpoint itself marked as an error, kept verbatim.
    pub fn upstream(answer: impl Into<String>) -> Self {
        Self::new(DispatchErrorKind::Upstream, answer)
    }

    /// Classify a transport error from the HTTP client.
    ///
    /// Timeouts are checked first: a connect timeout is also a connect error,
    /// and it must count against the retry budget.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout("Server response timeout. Please try again later.")
        } else if err.is_connect() {
            Self::new(
                DispatchErrorKind::Connection,
                format!(
                    "Unable to connect to the server. Please check your network connection and endpoint URL. Details: {}",
                    err
                ),
            )
        } else if err.is_status() {
            Self::new(DispatchErrorKind::HttpStatus, err.to_string())
        } else if err.is_decode() {
            Self::invalid_response(err.to_string())
        } else {
            Self::new(DispatchErrorKind::Request, err.to_string())
        }
    }

    /// The legacy textual form shown in reports: `"Error: ..."`, or
    /// `"Unexpected error: ..."` for uncategorized failures. Upstream errors
    /// already carry their prefix.
    pub fn sentinel(&self) -> String {
        match self.kind {
            DispatchErrorKind::Upstream => self.message.clone(),
            DispatchErrorKind::Unexpected => format!("Unexpected error: {}", self.message),
            _ => format!("{}{}", ERROR_SENTINEL, self.message),
        }
    }
}

/// Prefix marking a failed answer in reports.
pub const ERROR_SENTINEL: &str = "Error: ";

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sentinel())
    }
}

impl std::error::Error for DispatchError {}

/// Run-level outcomes that end an evaluation without a result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    /// The target URL failed validation; nothing was dispatched.
    #[error("Invalid endpoint URL: {url}. URL must start with http:// or https://")]
    Rejected { url: String },

    /// Every query failed.
    #[error("All queries failed for endpoint {endpoint}: {}", ErrorPreview::new(.errors))]
    AllFailed {
        endpoint: String,
        errors: Vec<String>,
    },
}

/// Number of error messages shown before collapsing the rest into a count.
pub const ERROR_PREVIEW_LEN: usize = 3;

/// The first few error messages of a run plus a count of the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPreview {
    pub shown: Vec<String>,
    pub remaining: usize,
}

impl ErrorPreview {
    pub fn new(errors: &[String]) -> Self {
        let shown: Vec<String> = errors.iter().take(ERROR_PREVIEW_LEN).cloned().collect();
        Self {
            remaining: errors.len() - shown.len(),
            shown,
        }
    }
}

impl fmt::Display for ErrorPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shown.join("; "))?;
        if self.remaining > 0 {
            write!(f, "; ...and {} more errors", self.remaining)?;
        }
        Ok(())
    }
}
