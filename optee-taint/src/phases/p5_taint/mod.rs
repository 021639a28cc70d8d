//! P5: taint analyzer.
//!
//! Drives one multi-turn conversation per candidate flow, reconciles
//! each conversation's final verdict against the four consistency
//! rules, and merges every chain's result into the global findings set.

mod conversation;
mod merge;
mod prefix_cache;
mod reconcile;

pub use conversation::{ChainConversation, ConversationTurn};
pub use merge::{merge, ChainResult};
pub use prefix_cache::PrefixCache;

use tracing::info;

use crate::extract;
use crate::llm::LlmClient;
use crate::model::{CandidateFlow, Finding, Phase};
use crate::rag::VectorStore;
use crate::ratelimit::RateLimiter;
use crate::retry::call_with_contract_retry;

/// Runs the taint analyzer over every candidate flow, returning the
/// merged global findings set.
pub async fn analyze(
    flows: &[CandidateFlow],
    client: &dyn LlmClient,
    limiter: &RateLimiter,
    cache: &PrefixCache,
    rag: Option<&dyn VectorStore>,
) -> Vec<Finding> {
    let bar = crate::output::taint_progress_bar(flows.len() as u64);
    let mut results = Vec::with_capacity(flows.len());
    for (index, flow) in flows.iter().enumerate() {
        let flow_ref = format!("flow-{index}");
        results.extend(analyze_flow(flow, &flow_ref, client, limiter, cache, rag).await);
        bar.inc(1);
    }
    bar.finish_and_clear();
    info!(hit_rate = cache.hit_rate(), flows = flows.len(), "taint analysis complete");
    merge(results)
}

/// Walks one candidate flow's whole conversation, returning one
/// [`ChainResult`] for every turn that actually contributed a finding
/// plus, always, a final `End`-phase result carrying the reconciled
/// verdict (spec.md §5's merge precedence needs start/middle findings
/// present to have anything to prefer the end turn over).
async fn analyze_flow(
    flow: &CandidateFlow,
    flow_ref: &str,
    client: &dyn LlmClient,
    limiter: &RateLimiter,
    cache: &PrefixCache,
    rag: Option<&dyn VectorStore>,
) -> Vec<ChainResult> {
    let rag_context = ChainConversation::fetch_rag_context(flow, rag).await;
    let mut conversation = ChainConversation::with_rag_context(flow, rag_context);
    let turns = conversation.turn_plan();
    let mut results = Vec::new();
    let mut last_verdict_turn_text = String::new();
    let mut last_findings_text = serde_json::Value::Array(Vec::new());

    for turn in turns {
        let messages = conversation.messages_for(turn);
        let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let key = conversation.prefix_key(turn);

        let response = if let Some(cached) = cache.get(&key) {
            cached
        } else {
            let validate = |raw: &str| contract_ok(turn, raw);
            match call_with_contract_retry(client, limiter, &messages, validate, &correction_prompt(turn)).await {
                Ok(text) => {
                    cache.insert(key, text.clone());
                    text
                }
                Err(err) => {
                    tracing::warn!(%err, flow_ref, "llm call failed for chain, aborting flow");
                    return results;
                }
            }
        };

        let extracted = extract::extract(&response);
        if turn.uses_two_line_contract() {
            let findings = extracted.value.get("findings").cloned().unwrap_or(reconcile::empty_findings_for(turn));
            if let serde_json::Value::Array(items) = &findings {
                for item in items {
                    results.push(interim_chain_result(flow, flow_ref, turn, item));
                }
            }
            last_findings_text = findings;
        } else {
            last_verdict_turn_text = response.clone();
            last_findings_text = parse_end_findings(&extracted);
        }

        conversation.record_response(turn, prompt, response);
    }

    let verdict_value: serde_json::Value = extract::extract(&last_verdict_turn_text).value;
    let crypto_guard = reconcile::chain_passes_crypto_guard(&flow.chain, &flow.destination.sink.sink_function);
    let vulnerability = reconcile::reconcile(&verdict_value, &last_findings_text, flow.destination.sink.line, crypto_guard);

    results.push(ChainResult {
        flow_ref: flow_ref.to_owned(),
        vulnerability,
        file: flow.destination.sink.file.clone(),
        line: flow.destination.sink.line,
        function: flow.chain.entry_point().unwrap_or("<sink>").to_owned(),
        sink_function: flow.destination.sink.sink_function.clone(),
        phase: Phase::End,
    });
    results
}

fn interim_chain_result(flow: &CandidateFlow, flow_ref: &str, turn: ConversationTurn, item: &serde_json::Value) -> ChainResult {
    let phase = match turn {
        ConversationTurn::Start => Phase::Start,
        ConversationTurn::Middle { .. } | ConversationTurn::End => Phase::Middle,
    };
    let line = item
        .get("line")
        .and_then(serde_json::Value::as_u64)
        .map_or(flow.destination.sink.line, |line| u32::try_from(line).unwrap_or(flow.destination.sink.line));
    ChainResult {
        flow_ref: flow_ref.to_owned(),
        vulnerability: reconcile::interim_vulnerability_from_finding(item),
        file: flow.destination.sink.file.clone(),
        line,
        function: flow.chain.entry_point().unwrap_or("<sink>").to_owned(),
        sink_function: flow.destination.sink.sink_function.clone(),
        phase,
    }
}

/// Validates a raw response against spec.md §6's contract for `turn`:
/// start/middle turns need an object on the first line and a
/// `FINDINGS=` marker; the end turn needs an `END_FINDINGS=` marker.
/// Total extraction failure always fails the contract.
fn contract_ok(turn: ConversationTurn, raw: &str) -> bool {
    let extracted = extract::extract(raw);
    if extracted.is_total_failure || !extracted.value.is_object() {
        return false;
    }
    let Some(marker) = &extracted.findings_marker else {
        return false;
    };
    if turn.uses_two_line_contract() {
        marker.starts_with("FINDINGS=")
    } else {
        marker.starts_with("END_FINDINGS=")
    }
}

fn correction_prompt(turn: ConversationTurn) -> String {
    if turn.uses_two_line_contract() {
        "Your previous response did not follow the required two-line format: a JSON object on \
         the first line, then a `FINDINGS=` line. Resend your answer in exactly that shape."
            .to_owned()
    } else {
        "Your previous response did not follow the required three-line format. Resend your \
         answer as: line 1 the vulnerability_found object, line 2 the verdict object, line 3 \
         the `END_FINDINGS=` line."
            .to_owned()
    }
}

/// Parses the `END_FINDINGS=...` marker line into a JSON array,
/// treating a missing marker as an empty array rather than falling
/// back to the last-seen `FINDINGS=` value from an earlier turn
/// (spec.md §9's stricter resolution of that open question).
fn parse_end_findings(extracted: &extract::ExtractedResponse) -> serde_json::Value {
    let Some(marker) = &extracted.findings_marker else {
        return serde_json::Value::Array(Vec::new());
    };
    let Some(payload) = marker.strip_prefix("END_FINDINGS=") else {
        return serde_json::Value::Array(Vec::new());
    };
    serde_json::from_str(payload.trim()).unwrap_or(serde_json::Value::Array(Vec::new()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::llm::MockLlmClient;
    use crate::model::{Category, CallEdge, CandidateFlow, Chain, Decision, Sink, VulnerableDestination};

    use super::*;

    fn flow_with_one_hop() -> CandidateFlow {
        CandidateFlow {
            chain: Chain {
                edges: vec![CallEdge {
                    caller: "TA_InvokeCommandEntryPoint".to_owned(),
                    callee: "handle_cmd".to_owned(),
                    file: PathBuf::from("ta/session.c"),
                    call_site_line: 20,
                }],
            },
            destination: VulnerableDestination {
                sink: Sink {
                    file: PathBuf::from("ta/session.c"),
                    line: 40,
                    function: "handle_cmd".to_owned(),
                    sink_function: "TEE_MemMove".to_owned(),
                    param_indices: vec![0],
                    category: "UDO".to_owned(),
                    reason: "destination buffer crosses the trust boundary".to_owned(),
                    decision_method: crate::model::DecisionMethod::Rule,
                },
                param_index: 0,
            },
        }
    }

    #[tokio::test]
    async fn start_turn_finding_survives_as_its_own_chain_result() {
        let flow = flow_with_one_hop();
        let responses = vec![
            "{\"note\": \"reviewing entry\"}\nFINDINGS=[{\"category\": \"UDO\", \"severity\": \"medium\", \"rule_id\": \"udo.early\", \"message\": \"possible early leak\"}]".to_owned(),
            "{\"vulnerability_found\": false}\n{\"decision\": \"no\", \"severity\": \"low\", \"rule_id\": \"udo.x\", \"explanation\": \"sanitized\"}\nEND_FINDINGS=[]".to_owned(),
        ];
        let client = MockLlmClient::new(responses);
        let limiter = RateLimiter::new(std::time::Duration::from_secs(0));
        let cache = PrefixCache::new(8);

        let results = analyze_flow(&flow, "flow-0", &client, &limiter, &cache, None).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].phase, Phase::Start);
        assert_eq!(results[0].vulnerability.decision, Decision::Suspected);
        assert_eq!(results[0].vulnerability.rule_id, "udo.early");
        assert_eq!(results[1].phase, Phase::End);
    }

    #[tokio::test]
    async fn malformed_start_turn_triggers_a_correction_retry() {
        let flow = flow_with_one_hop();
        let responses = vec![
            "this is not the expected shape at all".to_owned(),
            "{\"note\": \"ok now\"}\nFINDINGS=[]".to_owned(),
            "{\"vulnerability_found\": false}\n{\"decision\": \"no\", \"severity\": \"low\", \"rule_id\": \"udo.x\", \"explanation\": \"sanitized\"}\nEND_FINDINGS=[]".to_owned(),
        ];
        let client = MockLlmClient::new(responses);
        let limiter = RateLimiter::new(std::time::Duration::from_secs(0));
        let cache = PrefixCache::new(8);

        let results = analyze_flow(&flow, "flow-0", &client, &limiter, &cache, None).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].phase, Phase::End);
        assert_eq!(results[0].vulnerability.decision, Decision::No);
    }

    #[test]
    fn contract_ok_rejects_a_two_line_turn_missing_the_findings_marker() {
        assert!(!contract_ok(ConversationTurn::Start, "{\"note\": \"x\"}\nno marker here"));
        assert!(contract_ok(ConversationTurn::Start, "{\"note\": \"x\"}\nFINDINGS=[]"));
    }

    #[test]
    fn contract_ok_rejects_an_end_turn_missing_its_marker() {
        assert!(!contract_ok(ConversationTurn::End, "{\"vulnerability_found\": true}\nFINDINGS=[]"));
        assert!(contract_ok(ConversationTurn::End, "{\"vulnerability_found\": true}\nEND_FINDINGS=[]"));
    }

    #[test]
    fn category_is_carried_through_interim_result() {
        let flow = flow_with_one_hop();
        let item = serde_json::json!({"category": "DUS", "severity": "high", "rule_id": "dus.reuse", "message": "shared buffer reused"});
        let result = interim_chain_result(&flow, "flow-0", ConversationTurn::Start, &item);
        assert_eq!(result.vulnerability.category, Category::Dus);
        assert_eq!(result.phase, Phase::Start);
    }
}
