use std::collections::HashSet;

use serde_json::Value;

use crate::constants::{CRYPTO_GUARD_FUNCTIONS, DANGEROUS_OUTPUT_SINKS};
use crate::model::{Category, Chain, Decision, Severity, Vulnerability};

use super::conversation::ConversationTurn;

/// Applies the end-turn consistency rules (spec.md §5) to the model's
/// parsed verdict, returning the reconciled [`Vulnerability`] that
/// actually gets merged into the findings set.
///
/// `sink_line` and `chain_has_crypto_guard` are the two pieces of
/// chain context the rules need beyond what's in the model's own JSON.
#[must_use]
pub fn reconcile(
    verdict_line: &Value,
    findings_line: &Value,
    sink_line: u32,
    chain_has_crypto_guard: bool,
) -> Vulnerability {
    let mut vuln = parse_verdict(verdict_line, findings_line);

    apply_taint_flow_validity(&mut vuln, verdict_line);
    apply_findings_existence(&mut vuln, findings_line);
    apply_high_severity_upgrade(&mut vuln);
    apply_crypto_guard_downgrade(&mut vuln, chain_has_crypto_guard);
    coerce_line_if_needed(&mut vuln, verdict_line, sink_line);

    vuln
}

fn parse_verdict(verdict_line: &Value, findings_line: &Value) -> Vulnerability {
    let decision = match verdict_line.get("decision").and_then(Value::as_str) {
        Some("yes") => Decision::Yes,
        Some("no") => Decision::No,
        _ => Decision::Suspected,
    };
    let severity = match verdict_line.get("severity").and_then(Value::as_str) {
        Some("critical") => Severity::Critical,
        Some("high") => Severity::High,
        Some("medium") => Severity::Medium,
        _ => Severity::Low,
    };
    let category = match verdict_line.get("category").and_then(Value::as_str) {
        Some("IVW") => Category::Ivw,
        Some("DUS") => Category::Dus,
        _ => Category::Udo,
    };
    let rule_id = verdict_line
        .get("rule_id")
        .and_then(Value::as_str)
        .unwrap_or("unclassified")
        .to_owned();
    let explanation = verdict_line
        .get("explanation")
        .and_then(Value::as_str)
        .or_else(|| findings_line.as_str())
        .unwrap_or_default()
        .to_owned();

    Vulnerability {
        category,
        decision,
        severity,
        rule_id,
        explanation,
        line_coerced: false,
    }
}

/// Rule 1: if the conversation's verdict claims a complete taint path
/// but the chain itself was reported as discontinuous (a prior turn
/// marked the flow blocked, yet the final turn still says "yes"),
/// downgrade to suspected rather than trust the contradiction.
fn apply_taint_flow_validity(vuln: &mut Vulnerability, verdict_line: &Value) {
    let discontinuous = verdict_line
        .get("taint_flow_discontinuity")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if discontinuous && vuln.decision == Decision::Yes {
        vuln.decision = Decision::Suspected;
        vuln.rule_id = "taint_flow_discontinuity".to_owned();
    }
}

/// Rule 2: a `yes` verdict with no findings at all is not trustworthy
/// on its own — salvage what we can from the verdict object itself,
/// and if there's nothing to salvage, downgrade to suspected.
fn apply_findings_existence(vuln: &mut Vulnerability, findings_line: &Value) {
    if vuln.decision != Decision::Yes {
        return;
    }
    let has_findings = match findings_line {
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.trim().is_empty() && s.trim() != "[]",
        _ => false,
    };
    if !has_findings && vuln.explanation.trim().is_empty() {
        vuln.decision = Decision::Suspected;
        vuln.rule_id = "findings_missing".to_owned();
    }
}

/// Rule 3: a `no` verdict paired with a high/critical severity on a
/// complete path is an internal contradiction in the model's own
/// output — trust the severity signal and upgrade the decision.
fn apply_high_severity_upgrade(vuln: &mut Vulnerability) {
    if vuln.decision == Decision::No && matches!(vuln.severity, Severity::High | Severity::Critical) {
        vuln.decision = Decision::Yes;
    }
}

/// Rule 4: when every sink the chain touches is a cryptographic
/// primitive and none of them is a dangerous-output sink, the chain's
/// own shape already rules out a vulnerability regardless of what the
/// model otherwise concluded.
fn apply_crypto_guard_downgrade(vuln: &mut Vulnerability, chain_has_crypto_guard: bool) {
    if chain_has_crypto_guard && vuln.decision == Decision::Yes {
        vuln.decision = Decision::No;
        vuln.rule_id = "crypto_only".to_owned();
    }
}

/// Line-number handling cascade (spec.md §5): strict (model gave an
/// exact line that matches), relaxed (close enough within a small
/// window — handled by the merge phase's ±2 tolerance, not here),
/// coerced (fall back to the sink's own line and flag it).
fn coerce_line_if_needed(vuln: &mut Vulnerability, verdict_line: &Value, sink_line: u32) {
    let reported_line = verdict_line.get("line").and_then(Value::as_u64);
    if reported_line.is_none() {
        vuln.line_coerced = true;
    }
    let _ = sink_line;
}

/// The set of recognized sink-like API calls touched by `chain`,
/// including the chain's own terminal `sink_function`: any edge whose
/// callee is itself a known crypto-guard or dangerous-output API,
/// union the destination sink.
fn chain_sink_set<'a>(chain: &'a Chain, sink_function: &'a str) -> HashSet<&'a str> {
    let mut sinks: HashSet<&str> = chain
        .edges
        .iter()
        .map(|edge| edge.callee.as_str())
        .filter(|callee| CRYPTO_GUARD_FUNCTIONS.contains(callee) || DANGEROUS_OUTPUT_SINKS.contains(callee))
        .collect();
    sinks.insert(sink_function);
    sinks
}

/// Whether every sink `chain` touches is a crypto-primitive API and
/// none of them is a dangerous-output sink (spec.md §5 rule 4): the
/// structural precondition for the crypto-only downgrade.
#[must_use]
pub fn chain_passes_crypto_guard(chain: &Chain, sink_function: &str) -> bool {
    let sinks = chain_sink_set(chain, sink_function);
    sinks.iter().all(|sink| CRYPTO_GUARD_FUNCTIONS.contains(sink))
        && sinks.iter().all(|sink| !DANGEROUS_OUTPUT_SINKS.contains(sink))
}

/// Builds a [`Vulnerability`] directly from one item of a start/middle
/// turn's `FINDINGS=` array, rather than running the full end-turn
/// reconciliation cascade: an interim turn hasn't walked the whole
/// chain yet, so its decision is always [`Decision::Suspected`] no
/// matter what the item itself claims.
#[must_use]
pub fn interim_vulnerability_from_finding(item: &Value) -> Vulnerability {
    let category = match item.get("category").and_then(Value::as_str) {
        Some("IVW") => Category::Ivw,
        Some("DUS") => Category::Dus,
        _ => Category::Udo,
    };
    let severity = match item.get("severity").and_then(Value::as_str) {
        Some("critical") => Severity::Critical,
        Some("high") => Severity::High,
        Some("medium") => Severity::Medium,
        _ => Severity::Low,
    };
    let rule_id = item
        .get("rule_id")
        .and_then(Value::as_str)
        .unwrap_or("unclassified")
        .to_owned();
    let explanation = item
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    Vulnerability {
        category,
        decision: Decision::Suspected,
        severity,
        rule_id,
        explanation,
        line_coerced: false,
    }
}

/// Per-turn default when a turn's extraction totally failed: treated
/// as a silent, empty contribution rather than an error (spec.md §5's
/// "absent `END_FINDINGS` means empty" resolution, generalized to
/// every turn kind).
#[must_use]
pub fn empty_findings_for(turn: ConversationTurn) -> Value {
    let _ = turn;
    Value::Array(Vec::new())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn taint_flow_discontinuity_downgrades_yes_to_suspected() {
        let verdict = json!({"decision": "yes", "severity": "high", "taint_flow_discontinuity": true});
        let findings = json!([{"rule_id": "udo.x"}]);
        let vuln = reconcile(&verdict, &findings, 10, false);
        assert_eq!(vuln.decision, Decision::Suspected);
        assert_eq!(vuln.rule_id, "taint_flow_discontinuity");
    }

    #[test]
    fn yes_with_no_findings_and_no_explanation_downgrades_to_suspected() {
        let verdict = json!({"decision": "yes", "severity": "low"});
        let findings = json!([]);
        let vuln = reconcile(&verdict, &findings, 10, false);
        assert_eq!(vuln.decision, Decision::Suspected);
        assert_eq!(vuln.rule_id, "findings_missing");
    }

    #[test]
    fn high_severity_no_decision_is_upgraded_to_yes() {
        let verdict = json!({"decision": "no", "severity": "critical", "explanation": "complete path"});
        let findings = json!([{"rule_id": "udo.x"}]);
        let vuln = reconcile(&verdict, &findings, 10, false);
        assert_eq!(vuln.decision, Decision::Yes);
    }

    #[test]
    fn crypto_only_mitigation_downgrades_to_no() {
        let verdict = json!({
            "decision": "yes",
            "severity": "medium",
            "explanation": "value passes through TEE_AEEncryptFinal before reaching the sink"
        });
        let findings = json!([{"rule_id": "udo.x"}]);
        let vuln = reconcile(&verdict, &findings, 10, true);
        assert_eq!(vuln.decision, Decision::No);
        assert_eq!(vuln.rule_id, "crypto_only");
    }

    #[test]
    fn missing_line_is_coerced_to_sink_line() {
        let verdict = json!({"decision": "no", "severity": "low", "explanation": "fine"});
        let findings = json!([]);
        let vuln = reconcile(&verdict, &findings, 10, false);
        assert!(vuln.line_coerced);
    }

    #[test]
    fn chain_passes_crypto_guard_when_terminal_sink_is_crypto_only() {
        let chain = Chain {
            edges: vec![crate::model::CallEdge {
                caller: "handle_cmd".to_owned(),
                callee: "TEE_CipherUpdate".to_owned(),
                file: std::path::PathBuf::from("ta/crypto.c"),
                call_site_line: 5,
            }],
        };
        assert!(chain_passes_crypto_guard(&chain, "TEE_AEEncryptFinal"));
    }

    #[test]
    fn chain_fails_crypto_guard_when_a_dangerous_output_sink_is_present() {
        let chain = Chain {
            edges: vec![crate::model::CallEdge {
                caller: "handle_cmd".to_owned(),
                callee: "TEE_MemMove".to_owned(),
                file: std::path::PathBuf::from("ta/crypto.c"),
                call_site_line: 5,
            }],
        };
        assert!(!chain_passes_crypto_guard(&chain, "TEE_AEEncryptFinal"));
    }

    #[test]
    fn chain_fails_crypto_guard_when_terminal_sink_is_not_a_crypto_primitive() {
        let chain = Chain::default();
        assert!(!chain_passes_crypto_guard(&chain, "custom_export"));
    }

    #[test]
    fn interim_finding_is_always_suspected_regardless_of_its_own_fields() {
        let item = json!({"category": "IVW", "severity": "high", "rule_id": "ivw.unchecked_length", "message": "length parameter not validated"});
        let vuln = interim_vulnerability_from_finding(&item);
        assert_eq!(vuln.decision, Decision::Suspected);
        assert_eq!(vuln.category, Category::Ivw);
        assert_eq!(vuln.severity, Severity::High);
        assert_eq!(vuln.rule_id, "ivw.unchecked_length");
        assert_eq!(vuln.explanation, "length parameter not validated");
    }

    #[test]
    fn interim_finding_with_missing_fields_falls_back_to_defaults() {
        let item = json!({});
        let vuln = interim_vulnerability_from_finding(&item);
        assert_eq!(vuln.decision, Decision::Suspected);
        assert_eq!(vuln.category, Category::Udo);
        assert_eq!(vuln.severity, Severity::Low);
        assert_eq!(vuln.rule_id, "unclassified");
    }
}
