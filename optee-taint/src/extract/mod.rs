//! Response extraction: turns an LLM's free-text completion into a
//! structured JSON payload, tolerating the many ways a model deviates
//! from the requested two-line/three-line output contract.

mod repair;

pub use repair::{repair_json, RepairStats};

use serde_json::Value;
use tracing::debug;

/// Outcome of running the extraction cascade over one raw completion.
#[derive(Debug, Clone)]
pub struct ExtractedResponse {
    /// The parsed JSON payload. Always present — a total failure still
    /// produces the `{"items": []}` sentinel rather than `None`, so
    /// callers never have to special-case "no value at all".
    pub value: Value,
    /// Which extraction strategy produced `value`, for diagnostics.
    pub strategy: &'static str,
    /// The trailing `FINDINGS=...` / `END_FINDINGS=...` marker line, if
    /// one was found verbatim in the text.
    pub findings_marker: Option<String>,
    /// Whether extraction fell all the way through to the
    /// `error_parse` sentinel.
    pub is_total_failure: bool,
}

/// Runs the six-strategy extraction cascade over raw LLM output.
///
/// Never panics and never returns `Err`: a response this function
/// cannot make sense of still produces a well-formed
/// [`ExtractedResponse`] flagged as a total failure, per spec.md §7 —
/// the extractor must never itself become the reason a chain's
/// conversation aborts.
#[must_use]
pub fn extract(raw: &str) -> ExtractedResponse {
    let findings_marker = find_marker_line(raw);

    if let Some(value) = try_first_line(raw) {
        debug!(strategy = "first_line", "extraction succeeded");
        return ExtractedResponse {
            value,
            strategy: "first_line",
            findings_marker,
            is_total_failure: false,
        };
    }

    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return ExtractedResponse {
            value,
            strategy: "whole_text",
            findings_marker,
            is_total_failure: false,
        };
    }

    if let Some(value) = try_fenced_block(raw) {
        return ExtractedResponse {
            value,
            strategy: "fenced_block",
            findings_marker,
            is_total_failure: false,
        };
    }

    if let Some(value) = try_brace_scan(raw) {
        return ExtractedResponse {
            value,
            strategy: "brace_scan",
            findings_marker,
            is_total_failure: false,
        };
    }

    if let Some((value, _stats)) = try_repair(raw) {
        return ExtractedResponse {
            value,
            strategy: "rule_repair",
            findings_marker,
            is_total_failure: false,
        };
    }

    ExtractedResponse {
        value: serde_json::json!({"items": [], "error": "error_parse"}),
        strategy: "total_failure",
        findings_marker,
        is_total_failure: true,
    }
}

fn try_first_line(raw: &str) -> Option<Value> {
    let first_line = raw.lines().next()?.trim();
    serde_json::from_str(first_line).ok()
}

fn try_fenced_block(raw: &str) -> Option<Value> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let end = after_fence.find("```")?;
    serde_json::from_str(after_fence[..end].trim()).ok()
}

fn try_brace_scan(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

fn try_repair(raw: &str) -> Option<(Value, RepairStats)> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    repair_json(&raw[start..=end])
}

/// Finds a `FINDINGS=...` or `END_FINDINGS=...` marker line anywhere
/// in the text, tolerating leading whitespace.
fn find_marker_line(raw: &str) -> Option<String> {
    raw.lines()
        .map(str::trim)
        .find(|line| line.starts_with("FINDINGS=") || line.starts_with("END_FINDINGS="))
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_line_contract_extracts_first_line_json() {
        let raw = "{\"decision\": \"no\"}\nFINDINGS=[]";
        let extracted = extract(raw);
        assert_eq!(extracted.strategy, "first_line");
        assert_eq!(extracted.value["decision"], "no");
        assert_eq!(extracted.findings_marker.as_deref(), Some("FINDINGS=[]"));
        assert!(!extracted.is_total_failure);
    }

    #[test]
    fn three_line_contract_extracts_end_findings_marker() {
        let raw = "{\"vulnerability_found\": true}\n{\"decision\": \"yes\"}\nEND_FINDINGS=[]";
        let extracted = extract(raw);
        assert_eq!(extracted.findings_marker.as_deref(), Some("END_FINDINGS=[]"));
    }

    #[test]
    fn extracts_from_fenced_code_block() {
        let raw = "Here is my answer:\n```json\n{\"decision\": \"yes\"}\n```\nFINDINGS=[]";
        let extracted = extract(raw);
        assert_eq!(extracted.strategy, "fenced_block");
        assert_eq!(extracted.value["decision"], "yes");
    }

    #[test]
    fn extracts_via_brace_scan_when_surrounded_by_prose() {
        let raw = "I believe the answer is {\"decision\": \"no\"} based on the code.";
        let extracted = extract(raw);
        assert_eq!(extracted.strategy, "brace_scan");
        assert_eq!(extracted.value["decision"], "no");
    }

    #[test]
    fn falls_back_to_repair_for_trailing_comma() {
        let raw = "prose before {\"decision\": \"no\",} trailing text";
        let extracted = extract(raw);
        assert_eq!(extracted.strategy, "rule_repair");
        assert_eq!(extracted.value["decision"], "no");
    }

    #[test]
    fn total_failure_never_panics_and_flags_itself() {
        let extracted = extract("not json at all, just rambling prose");
        assert!(extracted.is_total_failure);
        assert_eq!(extracted.value["error"], "error_parse");
    }

    #[test]
    fn empty_response_is_a_total_failure_not_a_panic() {
        let extracted = extract("");
        assert!(extracted.is_total_failure);
        assert_eq!(extracted.findings_marker, None);
    }
}
