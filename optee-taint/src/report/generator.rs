use comfy_table::{Cell, Table};

use crate::model::{Decision, Finding};

/// Counts used for the terminal-facing run summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportSummary {
    /// Total findings after merge.
    pub total: usize,
    /// Findings with decision `Yes`.
    pub confirmed: usize,
    /// Findings with decision `Suspected`.
    pub suspected: usize,
}

impl ReportSummary {
    /// Summarizes a findings slice.
    #[must_use]
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self {
            total: findings.len(),
            ..Self::default()
        };
        for finding in findings {
            match finding.vulnerability.decision {
                Decision::Yes => summary.confirmed += 1,
                Decision::Suspected => summary.suspected += 1,
                Decision::No => {}
            }
        }
        summary
    }
}

/// Renders a `comfy-table` summary of every non-`No` finding for
/// terminal output.
#[must_use]
pub fn render_summary_table(findings: &[Finding]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Category", "Severity", "Decision", "File:Line", "Function"]);
    for finding in findings.iter().filter(|f| f.vulnerability.decision != Decision::No) {
        table.add_row(vec![
            Cell::new(finding.id.to_string()),
            Cell::new(finding.vulnerability.category.to_string()),
            Cell::new(format!("{:?}", finding.vulnerability.severity)),
            Cell::new(format!("{:?}", finding.vulnerability.decision)),
            Cell::new(format!("{}:{}", finding.file.display(), finding.line)),
            Cell::new(&finding.function),
        ]);
    }
    table
}
