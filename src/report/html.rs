//! HTML reports rendered with Handlebars.
//!
//! All values pass through Handlebars' HTML escaping, so endpoint answers
//! can never inject markup into the report.

use super::format_percent;
use crate::error::{ErrorPreview, EvaluationError, Result};
use crate::evaluation::EvaluationResult;
use handlebars::Handlebars;
use serde_json::json;

const REPORT: &str = "report";
const INVALID_URL: &str = "invalid_url";
const ALL_FAILED: &str = "all_failed";
const SYSTEM_ERROR: &str = "system_error";

const ERROR_STYLE: &str = r#"<style>
        body { font-family: Arial, sans-serif; margin: 20px; line-height: 1.6; }
        .error { color: #e53e3e; padding: 15px; border-left: 4px solid #e53e3e; background-color: #fff5f5; }
        .tip { color: #2b6cb0; padding: 15px; border-left: 4px solid #2b6cb0; background-color: #ebf8ff; margin-top: 20px; }
    </style>"#;

const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>RAG Evaluation Results</title>
    <style>
        :root {
            --primary-color: #007bff;
            --border-color: #e2e8f0;
            --bg-color: #ffffff;
            --text-color: #1a202c;
            --hover-bg: #f7fafc;
        }
        body { font-family: 'Poppins', system-ui, -apple-system, sans-serif; color: var(--text-color); line-height: 1.6; margin: 0; padding: 0; }
        .container { width: 100%; background: var(--bg-color); border-radius: 8px; overflow: hidden; }
        .table-wrapper { width: 100%; overflow-x: auto; margin-bottom: 1rem; border-radius: 8px; box-shadow: 0 1px 3px 0 rgba(0, 0, 0, 0.1); }
        table { width: 100%; border-collapse: separate; border-spacing: 0; margin: 0; border: 1px solid var(--border-color); min-width: 600px; }
        th, td { border: 1px solid var(--border-color); padding: 0.75rem; text-align: left; min-width: 120px; word-wrap: break-word; max-width: 300px; }
        th { background-color: var(--primary-color); color: white !important; font-weight: 500; white-space: nowrap; position: sticky; top: 0; z-index: 1; }
        th:first-child, td:first-child { padding-left: 1.5rem; }
        tr:nth-child(even) { background-color: var(--hover-bg); }
        tr:hover td { background-color: rgba(0, 123, 255, 0.05); }
        .warning-section { background: #fffaf0; border-left: 4px solid #dd6b20; border-radius: 8px; padding: 1rem; margin-top: 1.5rem; }
        .warning-section h3 { color: #dd6b20; margin-top: 0; font-weight: 500; font-size: 1.1rem; }
        .metrics { background: var(--bg-color); border-radius: 8px; padding: 1rem; margin-top: 1.5rem; border: 1px solid var(--border-color); }
        .metrics h3 { color: var(--primary-color); margin-top: 0; font-weight: 500; font-size: 1.1rem; }
        .metrics ul { list-style: none; padding: 0; margin: 0; }
        .metrics li { padding: 0.75rem; border-bottom: 1px solid var(--border-color); display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 0.5rem; }
        .metrics li:last-child { border-bottom: none; }
        @media (max-width: 640px) {
            th, td { padding: 0.5rem; font-size: 0.875rem; }
            .metrics li { padding: 0.5rem; }
            .metrics h3 { font-size: 1rem; }
        }
    </style>
</head>
<body>
    <div class="container">
        <div class="table-wrapper">
            <table>
                <thead>
                    <tr>
                        <th>User Query</th>
                        <th>Generated Response</th>
                        <th>Reference Answer</th>
                    </tr>
                </thead>
                <tbody>
                {{#each rows}}
                    <tr>
                        <td>{{question}}</td>
                        <td>{{answer}}</td>
                        <td>{{reference}}</td>
                    </tr>
                {{/each}}
                </tbody>
            </table>
        </div>
        {{#if warnings}}
        <div class="warning-section">
            <h3>⚠️ Warnings</h3>
            <p>{{warnings.success_count}} out of {{warnings.total}} queries completed successfully. Some queries encountered errors:</p>
            <ul class="warning-list">
                {{#each warnings.shown}}
                <li>{{this}}</li>
                {{/each}}
                {{#if warnings.remaining}}
                <li>...and {{warnings.remaining}} more errors</li>
                {{/if}}
            </ul>
        </div>
        {{/if}}
        <div class="metrics">
            <h3>Evaluation Metrics</h3>
            <ul>
            {{#each metrics}}
                <li>
                    <span>{{name}}</span>
                    <span>{{value}}</span>
                </li>
            {{/each}}
            </ul>
        </div>
    </div>
</body>
</html>
"#;

const INVALID_URL_TEMPLATE: &str = r#"<html>
<head>
    <title>RAG Evaluation Error</title>
    {{{style}}}
</head>
<body>
    <h2>RAG Evaluation Error</h2>
    <div class="error">
        <p><strong>Invalid endpoint URL:</strong> {{url}}</p>
        <p>URL must start with http:// or https://</p>
    </div>
    <div class="tip">
        <p><strong>Tip:</strong> Make sure your endpoint URL is correct and includes the protocol (http:// or https://)</p>
    </div>
</body>
</html>
"#;

const ALL_FAILED_TEMPLATE: &str = r#"<html>
<head>
    <title>RAG Evaluation Failed</title>
    {{{style}}}
</head>
<body>
    <h2>RAG Evaluation Failed</h2>
    <div class="error">
        <p><strong>All queries failed.</strong></p>
        <p>Endpoint: {{endpoint}}</p>
        <p>Error details:</p>
        <ul>
            {{#each errors.shown}}
            <li>{{this}}</li>
            {{/each}}
            {{#if errors.remaining}}
            <li>...and {{errors.remaining}} more errors</li>
            {{/if}}
        </ul>
    </div>
    <div class="tip">
        <p><strong>Troubleshooting tips:</strong></p>
        <ul>
            <li>Verify the endpoint URL is correct and accessible</li>
            <li>Check if authentication credentials are required (API key, etc.)</li>
            <li>Ensure the endpoint accepts the parameters being sent</li>
            <li>Verify the endpoint returns responses in the expected format</li>
            <li>Check network connectivity and firewall settings</li>
        </ul>
    </div>
</body>
</html>
"#;

const SYSTEM_ERROR_TEMPLATE: &str = r#"<html>
<head>
    <title>Evaluation System Error</title>
    {{{style}}}
</head>
<body>
    <h2>Evaluation System Error</h2>
    <div class="error">
        <p><strong>An unexpected error occurred during evaluation:</strong></p>
        <p>{{message}}</p>
    </div>
</body>
</html>
"#;

/// Renders evaluation results and failure pages.
pub struct HtmlRenderer {
    registry: Handlebars<'static>,
}

impl HtmlRenderer {
    /// Register all templates.
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_template_string(REPORT, REPORT_TEMPLATE)?;
        registry.register_template_string(INVALID_URL, INVALID_URL_TEMPLATE)?;
        registry.register_template_string(ALL_FAILED, ALL_FAILED_TEMPLATE)?;
        registry.register_template_string(SYSTEM_ERROR, SYSTEM_ERROR_TEMPLATE)?;
        Ok(Self { registry })
    }

    /// The results table, a warnings section when some queries failed,
    /// and the metrics list.
    pub fn render_report(&self, result: &EvaluationResult) -> Result<String> {
        let rows: Vec<_> = result
            .outcomes
            .iter()
            .map(|outcome| {
                json!({
                    "question": outcome.question,
                    "answer": outcome.produced_answer(),
                    "reference": outcome.reference_answer,
                })
            })
            .collect();

        let metrics: Vec<_> = result
            .metrics
            .entries()
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": format_percent(*value) }))
            .collect();

        let warnings = result.has_warnings().then(|| {
            let preview = result.warning_preview();
            json!({
                "success_count": result.success_count,
                "total": result.total(),
                "shown": preview.shown,
                "remaining": preview.remaining,
            })
        });

        let data = json!({
            "rows": rows,
            "metrics": metrics,
            "warnings": warnings,
        });
        Ok(self.registry.render(REPORT, &data)?)
    }

    /// Page for a target URL without an http(s) scheme.
    pub fn render_invalid_url(&self, url: &str) -> Result<String> {
        let data = json!({ "style": ERROR_STYLE, "url": url });
        Ok(self.registry.render(INVALID_URL, &data)?)
    }

    /// Page for a run where every query failed.
    pub fn render_all_failed(&self, endpoint: &str, errors: &[String]) -> Result<String> {
        let data = json!({
            "style": ERROR_STYLE,
            "endpoint": endpoint,
            "errors": ErrorPreview::new(errors),
        });
        Ok(self.registry.render(ALL_FAILED, &data)?)
    }

    /// Page for failures outside the evaluation itself.
    pub fn render_system_error(&self, message: &str) -> Result<String> {
        let data = json!({ "style": ERROR_STYLE, "message": message });
        Ok(self.registry.render(SYSTEM_ERROR, &data)?)
    }

    /// Page for a run-level evaluation error.
    pub fn render_evaluation_error(&self, err: &EvaluationError) -> Result<String> {
        match err {
            EvaluationError::Rejected { url } => self.render_invalid_url(url),
            EvaluationError::AllFailed { endpoint, errors } => self.render_all_failed(endpoint, errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::SampleCase;
    use crate::dispatch::EndpointKind;
    use crate::error::DispatchError;
    use crate::evaluation::{Metrics, QueryOutcome};

    fn result(outcomes: Vec<QueryOutcome>, warnings: Vec<String>) -> EvaluationResult {
        let success_count = outcomes.iter().filter(|o| o.is_success()).count();
        EvaluationResult {
            endpoint: "http://rag.example.com".to_string(),
            endpoint_kind: EndpointKind::Generic,
            metrics: Metrics::compute(&outcomes),
            outcomes,
            warnings,
            success_count,
            total_time_secs: 0.1,
        }
    }

    #[test]
    fn test_report_rows_and_metrics() {
        let case = SampleCase::new("Who?", "Ada");
        let html = HtmlRenderer::new()
            .unwrap()
            .render_report(&result(vec![QueryOutcome::success(&case, "Ada")], vec![]))
            .unwrap();

        assert!(html.contains("<td>Who?</td>"));
        assert!(html.contains("<td>Ada</td>"));
        assert!(html.contains("<span>Context Recall</span>"));
        assert!(html.contains("<span>100.0%</span>"));
        assert!(html.contains("<span>92.0%</span>"));
        assert!(html.contains("<span>88.0%</span>"));
        assert!(!html.contains("warning-section\">"));
    }

    #[test]
    fn test_report_warnings_section() {
        let case = SampleCase::new("Who?", "Ada");
        let outcomes = vec![
            QueryOutcome::success(&case, "Ada"),
            QueryOutcome::failure(&case, DispatchError::timeout("slow")),
        ];
        let warnings = vec!["Query 2: Error: slow".to_string()];
        let html = HtmlRenderer::new()
            .unwrap()
            .render_report(&result(outcomes, warnings))
            .unwrap();

        assert!(html.contains("1 out of 2 queries completed successfully"));
        assert!(html.contains("<li>Query 2: Error: slow</li>"));
        assert!(html.contains("<td>Error: slow</td>"));
        assert!(!html.contains("more errors"));
    }

    #[test]
    fn test_answers_are_escaped() {
        let case = SampleCase::new("Q?", "A");
        let html = HtmlRenderer::new()
            .unwrap()
            .render_report(&result(
                vec![QueryOutcome::success(&case, "<script>alert(1)</script>")],
                vec![],
            ))
            .unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_all_failed_page() {
        let errors: Vec<String> = (1..=5).map(|i| format!("Query {}: Error: boom", i)).collect();
        let html = HtmlRenderer::new()
            .unwrap()
            .render_all_failed("http://rag.example.com", &errors)
            .unwrap();

        assert!(html.contains("All queries failed."));
        assert!(html.contains("<li>Query 3: Error: boom</li>"));
        assert!(!html.contains("Query 4:"));
        assert!(html.contains("<li>...and 2 more errors</li>"));
        assert!(html.contains("Troubleshooting tips"));
    }

    #[test]
    fn test_invalid_url_page() {
        let html = HtmlRenderer::new()
            .unwrap()
            .render_evaluation_error(&EvaluationError::Rejected {
                url: "ftp://example.com".to_string(),
            })
            .unwrap();
        assert!(html.contains("Invalid endpoint URL:</strong> ftp://example.com"));
        assert!(html.contains("URL must start with http:// or https://"));
    }

    #[test]
    fn test_system_error_page() {
        let html = HtmlRenderer::new().unwrap().render_system_error("disk full").unwrap();
        assert!(html.contains("Evaluation System Error"));
        assert!(html.contains("<p>disk full</p>"));
    }
}
