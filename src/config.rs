//! Configuration for the evaluator.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.
//! The resulting [`Config`] is built once at startup and shared read-only.

use crate::endpoint::{EndpointOverride, EndpointOverrides};
use crate::error::{EvaluatorError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind.
    pub port: u16,

    /// Origins allowed by CORS. `"*"` (or an empty list) allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Settings for outbound queries against evaluated endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-attempt timeout in seconds. The generic dispatcher uses half of it
    /// on its first attempt.
    pub timeout_secs: f64,

    /// Attempt budget of the generic dispatcher.
    pub max_retries: u32,

    /// Skip TLS certificate verification for evaluated endpoints.
    pub accept_invalid_certs: bool,

    /// Number of cases per progress group when logging.
    pub batch_size: usize,

    /// `groupid` parameter sent to generic endpoints.
    pub group_id: i64,

    /// `session_id` parameter sent to generic endpoints.
    pub session_id: i64,

    /// Model requested from OpenAI-style endpoints.
    pub openai_model: String,

    /// Sampling temperature for chat-completion endpoints.
    pub temperature: f32,

    /// Token budget for chat-completion endpoints.
    pub max_tokens: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 8.0,
            max_retries: 2,
            accept_invalid_certs: true,
            batch_size: 3,
            group_id: 12,
            session_id: 111,
            openai_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 150,
        }
    }
}

impl DispatchConfig {
    /// Full per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

/// Report rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory holding `Poppins-Regular.ttf` and `Poppins-Bold.ttf`.
    pub fonts_dir: PathBuf,

    /// Font family name; files are `<family>-Regular.ttf` and `<family>-Bold.ttf`.
    pub font_family: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            fonts_dir: PathBuf::from("fonts"),
            font_family: "Poppins".to_string(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Outbound query settings
    pub dispatch: DispatchConfig,

    /// Report settings
    pub report: ReportConfig,

    /// Default credential for OpenAI-style endpoints
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// Endpoint-specific overrides, matched in order
    pub endpoints: EndpointOverrides,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    server: Option<ServerConfig>,
    dispatch: Option<DispatchConfig>,
    report: Option<ReportConfig>,
    openai_api_key: Option<String>,
    endpoints: Option<Vec<EndpointOverride>>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (OPENAI_API_KEY, RAG_EVAL_*)
    /// 2. Config file (`path`, or ~/.config/rag-evaluator/config.yaml)
    /// 3. Default values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        match path {
            Some(path) => config = Self::load_from_file(path)?,
            None => {
                if let Some(config_path) = Self::config_file_path() {
                    if config_path.exists() {
                        config = Self::load_from_file(&config_path)?;
                    }
                }
            }
        }

        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvaluatorError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text. Missing sections keep their defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| EvaluatorError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(server) = file_config.server {
            config.server = server;
        }
        if let Some(dispatch) = file_config.dispatch {
            config.dispatch = dispatch;
        }
        if let Some(report) = file_config.report {
            config.report = report;
        }
        if let Some(key) = file_config.openai_api_key {
            config.openai_api_key = Some(key);
        }
        if let Some(endpoints) = file_config.endpoints {
            config.endpoints = EndpointOverrides::new(endpoints);
        }

        Ok(config)
    }

    /// Override values from environment-style lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.openai_api_key = Some(key);
        }

        if let Some(host) = lookup("RAG_EVAL_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("RAG_EVAL_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(origins) = lookup("RAG_EVAL_ALLOWED_ORIGINS") {
            self.server.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Some(timeout) = lookup("RAG_EVAL_TIMEOUT_SECS").and_then(|t| t.parse().ok()) {
            self.dispatch.timeout_secs = timeout;
        }

        if let Some(retries) = lookup("RAG_EVAL_MAX_RETRIES").and_then(|r| r.parse().ok()) {
            self.dispatch.max_retries = retries;
        }

        if let Some(dir) = lookup("RAG_EVAL_FONTS_DIR") {
            self.report.fonts_dir = PathBuf::from(dir);
        }
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-evaluator")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !is_positive(self.dispatch.timeout_secs) {
            return Err(EvaluatorError::InvalidConfig(format!(
                "dispatch.timeout_secs must be positive, got {}",
                self.dispatch.timeout_secs
            )));
        }

        if self.dispatch.max_retries == 0 {
            return Err(EvaluatorError::InvalidConfig(
                "dispatch.max_retries must be at least 1".to_string(),
            ));
        }

        if self.dispatch.batch_size == 0 {
            return Err(EvaluatorError::InvalidConfig(
                "dispatch.batch_size must be at least 1".to_string(),
            ));
        }

        for entry in self.endpoints.iter() {
            if entry.pattern.is_empty() {
                return Err(EvaluatorError::InvalidConfig(
                    "endpoint override patterns must not be empty".to_string(),
                ));
            }
            if let Some(timeout) = entry.timeout_secs {
                if !is_positive(timeout) {
                    return Err(EvaluatorError::InvalidConfig(format!(
                        "timeout for endpoint override '{}' must be positive",
                        entry.pattern
                    )));
                }
            }
        }

        Ok(())
    }

    /// Create a config with explicit dispatch timing (useful for testing).
    pub fn with_timeouts(timeout_secs: f64, max_retries: u32) -> Self {
        Self {
            dispatch: DispatchConfig {
                timeout_secs,
                max_retries,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn is_positive(secs: f64) -> bool {
    secs.is_finite() && secs > 0.0
}
