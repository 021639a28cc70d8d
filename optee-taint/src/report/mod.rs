//! Report rendering: turns the merged findings set into a
//! human-readable artifact.
//!
//! The terminal summary (`comfy-table`) always renders; the HTML
//! report is gated behind the `html_report` feature so a minimal
//! build can skip the `askama`/`chrono` dependency entirely.

mod generator;
#[cfg(feature = "html_report")]
mod templates;

pub use generator::{render_summary_table, ReportSummary};
#[cfg(feature = "html_report")]
pub use templates::HtmlReportRenderer;
