use askama::Template;
use chrono::Local;

use crate::model::{Decision, Finding};

use super::ReportSummary;

#[derive(Template)]
#[template(path = "report.html")]
struct ReportTemplate<'a> {
    generated_at: String,
    summary: ReportSummary,
    rows: Vec<FindingRow<'a>>,
}

struct FindingRow<'a> {
    id: String,
    category: String,
    severity: String,
    decision: String,
    file: String,
    line: u32,
    function: &'a str,
    sink_function: &'a str,
    explanation: &'a str,
}

/// Renders the findings set as a standalone HTML report.
pub struct HtmlReportRenderer;

impl HtmlReportRenderer {
    /// Renders `findings` to an HTML string.
    ///
    /// # Errors
    /// Propagates any error from the underlying askama render.
    pub fn render(findings: &[Finding]) -> Result<String, askama::Error> {
        let rows = findings
            .iter()
            .filter(|finding| finding.vulnerability.decision != Decision::No)
            .map(|finding| FindingRow {
                id: finding.id.to_string(),
                category: finding.vulnerability.category.to_string(),
                severity: format!("{:?}", finding.vulnerability.severity),
                decision: format!("{:?}", finding.vulnerability.decision),
                file: finding.file.display().to_string(),
                line: finding.line,
                function: &finding.function,
                sink_function: &finding.sink_function,
                explanation: &finding.vulnerability.explanation,
            })
            .collect();

        let template = ReportTemplate {
            generated_at: Local::now().to_rfc3339(),
            summary: ReportSummary::from_findings(findings),
            rows,
        };
        template.render()
    }
}
