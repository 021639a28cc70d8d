use crate::model::{Finding, FindingId, Phase};

/// One per-chain analysis result, ready to be folded into the global
/// findings set.
pub struct ChainResult {
    /// Candidate flow this result came from, identified for `refs`.
    pub flow_ref: String,
    /// Vulnerability produced by [`super::reconcile::reconcile`].
    pub vulnerability: crate::model::Vulnerability,
    pub file: std::path::PathBuf,
    pub line: u32,
    pub function: String,
    pub sink_function: String,
    /// Which turn produced the authoritative copy of this result.
    pub phase: Phase,
}

/// Merges every chain's result into the deduplicated global findings
/// list (spec.md §5).
///
/// Findings are grouped by `(file, line within ±2, function,
/// sink_function, primary rule id)`; within a group, `End` results
/// take precedence over `Middle`, which takes precedence over `Start`,
/// and every contributing chain's reference is retained in `refs`.
#[must_use]
pub fn merge(results: Vec<ChainResult>) -> Vec<Finding> {
    let mut findings: Vec<Finding> = Vec::new();

    for result in results {
        if let Some(existing) = findings.iter_mut().find(|f| same_group(f, &result)) {
            existing.refs.push(result.flow_ref.clone());
            if result.phase > existing.source_phase {
                existing.source_phase = result.phase;
                existing.vulnerability = result.vulnerability.clone();
                existing.line = result.line;
            }
            continue;
        }

        let id = FindingId::derive(&result.file, result.line, &result.function, &result.vulnerability.rule_id);
        findings.push(Finding {
            id,
            file: result.file.clone(),
            line: result.line,
            function: result.function.clone(),
            sink_function: result.sink_function.clone(),
            vulnerability: result.vulnerability.clone(),
            source_phase: result.phase,
            refs: vec![result.flow_ref.clone()],
        });
    }

    findings
}

fn same_group(finding: &Finding, result: &ChainResult) -> bool {
    finding.file == result.file
        && finding.function == result.function
        && finding.sink_function == result.sink_function
        && finding.vulnerability.rule_id == result.vulnerability.rule_id
        && finding.line.abs_diff(result.line) <= 2
}
