//! RAG Evaluator CLI
//!
//! Serves the evaluation API or runs a single evaluation from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_evaluator::{
    config::Config,
    dataset::SampleSet,
    dispatch::EndpointKind,
    endpoint::HttpMethod,
    evaluation::{EvaluationRequest, Evaluator},
    report::{HtmlRenderer, PdfRenderer, font_paths},
    server::{self, AppState},
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// RAG Evaluator - score question-answering endpoints against a fixed question set
#[derive(Parser)]
#[command(name = "rag-evaluator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Interface to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Evaluate an endpoint and print the results
    Run {
        /// URL of the endpoint to evaluate
        url: String,

        /// Endpoint kind: generic, openai, azure or custom
        #[arg(short, long, default_value = "generic", value_parser = parse_kind)]
        kind: EndpointKind,

        /// API key for the endpoint
        #[arg(long)]
        api_key: Option<String>,

        /// HTTP method for custom endpoints
        #[arg(short, long, default_value = "GET", value_parser = parse_method)]
        method: HttpMethod,

        /// JSON request template for custom endpoints; `{prompt}` marks the question
        #[arg(short, long)]
        template: Option<String>,

        /// Path of the answer in custom endpoint responses
        #[arg(long, default_value = "answer")]
        response_path: String,

        /// Extra request header as NAME=VALUE (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Write the HTML report here
        #[arg(long)]
        html: Option<PathBuf>,

        /// Write the PDF report here
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Use questions from a JSON file instead of the built-in set
        #[arg(long)]
        cases: Option<PathBuf>,

        /// Ask only the first N questions
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Download the report fonts into the configured fonts directory
    FetchFonts,

    /// Show the effective configuration and check report fonts
    Check,
}

fn parse_kind(s: &str) -> std::result::Result<EndpointKind, String> {
    EndpointKind::parse(s).ok_or_else(|| format!("unknown endpoint kind '{}'", s))
}

fn parse_method(s: &str) -> std::result::Result<HttpMethod, String> {
    HttpMethod::parse(s).ok_or_else(|| format!("unsupported HTTP method '{}'", s))
}

fn parse_header(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Serve { host, port } => cmd_serve(config, host, port).await,
        Commands::Run {
            url,
            kind,
            api_key,
            method,
            template,
            response_path,
            headers,
            html,
            pdf,
            cases,
            limit,
        } => {
            let request_template = template
                .map(|t| serde_json::from_str(&t))
                .transpose()
                .context("--template must be valid JSON")?;
            let request = EvaluationRequest {
                target_url: url,
                credential: api_key,
                endpoint_kind: kind,
                http_method: method,
                request_template,
                response_path,
                extra_headers: (!headers.is_empty())
                    .then(|| headers.into_iter().collect::<HashMap<_, _>>()),
            };
            cmd_run(config, request, html, pdf, cases, limit).await
        }
        Commands::FetchFonts => cmd_fetch_fonts(config).await,
        Commands::Check => cmd_check(config),
    }
}

/// Human-readable logs on stderr, or JSON lines with `--json-logs`.
/// `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let human_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter())
    });

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    tracing_subscriber::registry()
        .with(human_layer)
        .with(json_layer)
        .init();
}

async fn cmd_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate().context("Invalid configuration")?;

    let (regular, bold) = font_paths(&config.report);
    if !regular.exists() || !bold.exists() {
        tracing::warn!(
            fonts_dir = %config.report.fonts_dir.display(),
            "Report fonts missing; PDF downloads will fail until `rag-evaluator fetch-fonts` is run"
        );
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let evaluator = Evaluator::new(Arc::new(config)).context("Failed to create evaluator")?;
    let state = AppState::new(evaluator).context("Failed to prepare report templates")?;

    server::run(state, &host, port)
        .await
        .with_context(|| format!("Server on {}:{} failed", host, port))
}

async fn cmd_run(
    config: Config,
    request: EvaluationRequest,
    html_out: Option<PathBuf>,
    pdf_out: Option<PathBuf>,
    cases: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let mut evaluator = Evaluator::new(Arc::new(config)).context("Failed to create evaluator")?;
    if let Some(path) = cases {
        let set = SampleSet::load_json(&path).context("Failed to load question set")?;
        evaluator = evaluator.with_cases(set);
    }
    if let Some(n) = limit {
        let set = evaluator.cases().take(n);
        evaluator = evaluator.with_cases(set);
    }

    println!("Evaluating: {}", request.target_url);
    println!("Endpoint kind: {}", request.resolved_kind());
    println!("Questions: {}", evaluator.cases().len());

    let result = evaluator
        .evaluate(&request)
        .await
        .context("Evaluation failed")?;

    result.print_summary();

    if let Some(path) = html_out {
        let html = HtmlRenderer::new()?.render_report(&result)?;
        std::fs::write(&path, html)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("HTML report saved to: {}", path.display());
    }

    if let Some(path) = pdf_out {
        let pdf = PdfRenderer::load(&evaluator.config().report)?
            .render(&result, chrono::Local::now())?;
        std::fs::write(&path, pdf)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("PDF report saved to: {}", path.display());
    }

    Ok(())
}

async fn cmd_fetch_fonts(config: Config) -> Result<()> {
    let family = &config.report.font_family;
    let dir = &config.report.fonts_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let (regular, bold) = font_paths(&config.report);
    let client = reqwest::Client::new();

    for path in [regular, bold] {
        if path.exists() {
            println!("  exists      {}", path.display());
            continue;
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("Invalid font file name")?;
        let url = format!(
            "https://github.com/google/fonts/raw/main/ofl/{}/{}",
            family.to_lowercase(),
            file_name
        );

        let bytes = client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .with_context(|| format!("Failed to download {}", url))?
            .bytes()
            .await
            .with_context(|| format!("Failed to read {}", url))?;

        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  downloaded  {} ({:.1} KB)", path.display(), bytes.len() as f64 / 1024.0);
    }

    Ok(())
}

fn cmd_check(config: Config) -> Result<()> {
    println!("Configuration:");
    println!("  Listen:        {}:{}", config.server.host, config.server.port);
    println!("  CORS origins:  {}", config.server.allowed_origins.join(", "));
    println!("  Timeout:       {}s", config.dispatch.timeout_secs);
    println!("  Max retries:   {}", config.dispatch.max_retries);
    println!(
        "  OpenAI key:    {}",
        if config.openai_api_key.is_some() { "set" } else { "not set" }
    );
    println!("  Overrides:");
    for entry in config.endpoints.iter() {
        println!(
            "    {:<24} timeout={:?} method={}",
            entry.pattern,
            entry.timeout_secs,
            entry.method.map(|m| m.as_str()).unwrap_or("-")
        );
    }
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    match PdfRenderer::load(&config.report) {
        Ok(_) => println!("Report fonts: OK ({})", config.report.fonts_dir.display()),
        Err(e) => println!("Report fonts: {}", e),
    }

    Ok(())
}
