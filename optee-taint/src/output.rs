//! Terminal progress and status helpers, shared by the pipeline and
//! the CLI's `analyze` command.

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::model::{Decision, Finding};

/// Builds a progress bar for P5's per-flow analysis loop.
#[must_use]
pub fn taint_progress_bar(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} flows analyzed") {
        bar.set_style(style);
    }
    bar
}

/// Prints a one-line colored status for a single finding as it's produced.
pub fn print_finding_status(finding: &Finding) {
    let label = match finding.vulnerability.decision {
        Decision::Yes => "CONFIRMED".red().bold(),
        Decision::Suspected => "SUSPECTED".yellow().bold(),
        Decision::No => "CLEAR".green(),
    };
    println!(
        "{label} {} {}:{} ({})",
        finding.vulnerability.category,
        finding.file.display(),
        finding.line,
        finding.sink_function,
    );
}
