//! P6: report renderer.
//!
//! Writes the merged findings set to disk as JSON (always) and, when
//! the `html_report` feature is enabled, as a standalone HTML report.

use tracing::info;

use crate::model::{Decision, Finding};
use crate::output::print_finding_status;
use crate::report::render_summary_table;
use crate::utils::{write_json, RunPaths};

/// Writes every run artifact `paths` names: `*_vulnerabilities.json`
/// always, `*_vulnerability_report.html` when the `html_report`
/// feature is enabled, per spec.md §6's persisted-layout.
///
/// # Errors
/// Propagates I/O errors writing under `paths.dir()`.
pub fn render(findings: &[Finding], paths: &RunPaths) -> std::io::Result<()> {
    write_json(&paths.vulnerabilities_json(), findings)?;

    #[cfg(feature = "html_report")]
    {
        match crate::report::HtmlReportRenderer::render(findings) {
            Ok(html) => std::fs::write(paths.vulnerability_report_html(), html)?,
            Err(err) => tracing::warn!(%err, "failed to render HTML report"),
        }
    }

    for finding in findings.iter().filter(|f| f.vulnerability.decision != Decision::No) {
        print_finding_status(finding);
    }

    let table = render_summary_table(findings);
    println!("{table}");
    info!(count = findings.len(), dir = %paths.dir().display(), "report written");
    Ok(())
}
