//! P3: sink identifier.
//!
//! Reduces every call to an external function down to the candidates
//! worth interrogating, then decides each one either by the additive
//! rule-table short-circuit or by asking the model directly. Per
//! spec.md §4.3, the model is the authority on which parameter
//! position is dangerous — this phase never infers a position on its
//! own; a candidate the model doesn't flag and that isn't in the rule
//! table simply isn't a sink.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::constants::{find_sink_rule, infer_category_from_reason, DEBUG_MACRO_NAMES};
use crate::llm::{ChatMessage, LlmClient};
use crate::model::{Declaration, DecisionMethod, Sink};
use crate::rag::VectorStore;
use crate::ratelimit::RateLimiter;
use crate::retry::call_with_retry;

/// Per-run toggles affecting candidate reduction and rule usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct P3Options {
    /// When set, the rule table is never consulted: every candidate
    /// goes through the model, even well-known APIs like `TEE_MemMove`.
    pub llm_only: bool,
    /// When unset (the default), calls to the fixed diagnostic-macro
    /// names are dropped out of candidate reduction entirely.
    pub include_debug_macros: bool,
}

struct CandidateDecision {
    param_indices: Vec<usize>,
    reason: String,
    category: String,
    decision_method: DecisionMethod,
}

/// Identifies every sink call-site across `declarations`.
///
/// A candidate is any name called by a user-defined, non-entry-point
/// function that is not itself defined among `declarations` — i.e. an
/// external declaration, per spec.md §4.2's partition. Each unique
/// candidate is decided once and the result applied to every call-site
/// that names it.
pub async fn identify_sinks(
    declarations: &[Declaration],
    client: &dyn LlmClient,
    limiter: &RateLimiter,
    rag: Option<&dyn VectorStore>,
    options: P3Options,
) -> Vec<Sink> {
    let defined_names: HashSet<&str> = declarations
        .iter()
        .filter(|decl| decl.is_definition)
        .map(|decl| decl.name.as_str())
        .collect();

    let mut candidates: HashSet<String> = HashSet::new();
    for decl in declarations {
        if !decl.is_definition || decl.is_entry_point() {
            continue;
        }
        for called in &decl.calls {
            if defined_names.contains(called.as_str()) {
                continue;
            }
            if !options.include_debug_macros && DEBUG_MACRO_NAMES.contains(&called.as_str()) {
                continue;
            }
            candidates.insert(called.clone());
        }
    }

    let mut decisions: HashMap<String, CandidateDecision> = HashMap::new();
    for candidate in candidates {
        if let Some(decision) = decide_candidate(&candidate, client, limiter, rag, options).await {
            decisions.insert(candidate, decision);
        }
    }

    let mut sinks = Vec::new();
    for decl in declarations {
        if !decl.is_definition || decl.is_entry_point() {
            continue;
        }
        for called in &decl.calls {
            if let Some(decision) = decisions.get(called) {
                sinks.push(Sink {
                    file: decl.file.clone(),
                    line: decl.line,
                    function: decl.name.clone(),
                    sink_function: called.clone(),
                    param_indices: decision.param_indices.clone(),
                    category: decision.category.clone(),
                    reason: decision.reason.clone(),
                    decision_method: decision.decision_method,
                });
            }
        }
    }
    sinks
}

async fn decide_candidate(
    candidate: &str,
    client: &dyn LlmClient,
    limiter: &RateLimiter,
    rag: Option<&dyn VectorStore>,
    options: P3Options,
) -> Option<CandidateDecision> {
    if !options.llm_only {
        if let Some(rule) = find_sink_rule(candidate) {
            return Some(CandidateDecision {
                param_indices: rule.tainted_params.to_vec(),
                reason: format!("matches the known-dangerous rule table entry for {candidate}"),
                category: rule.category.to_owned(),
                decision_method: DecisionMethod::Rule,
            });
        }
    }

    let prompt = render_prompt(candidate, rag).await;
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
    let response = match call_with_retry(client, limiter, &messages).await {
        Ok(text) => text,
        Err(err) => {
            warn!(candidate, ?err.kind, "llm sink interrogation failed, skipping candidate");
            return None;
        }
    };

    let findings = parse_tainted_params(&response);
    if findings.is_empty() {
        return None;
    }

    let param_indices: Vec<usize> = findings.iter().map(|(index, _)| *index).collect();
    let reason = findings
        .iter()
        .map(|(_, reason)| reason.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    let category = infer_category_from_reason(&reason).to_owned();
    Some(CandidateDecision {
        param_indices,
        reason,
        category,
        decision_method: DecisionMethod::Llm,
    })
}

const SYSTEM_PROMPT: &str = "You are a security reviewer auditing an OP-TEE Trusted \
Application's use of one external API function. Decide which, if any, of its parameters \
can carry data that crosses the trust boundary unsafely if left unchecked.";

async fn render_prompt(candidate: &str, rag: Option<&dyn VectorStore>) -> String {
    let mut prompt = format!(
        "Function under review: {candidate}\n\
         For every parameter position that is a dangerous destination for untrusted data \
         (an output buffer, a length, a key handle, or similar), respond with one line:\n\
         param_index: <N>; reason: <short reason>\n\
         List one line per dangerous parameter. If none of its parameters are dangerous, \
         respond with the single line: none"
    );
    if let Some(store) = rag {
        for doc in store.search_by_api(candidate).await {
            prompt.push_str(&format!("\n\nReference ({}):\n{}", doc.source, doc.text));
        }
    }
    prompt
}

fn param_index_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)param_index\s*[:=]\s*(\d+)").expect("static pattern is valid"))
}

fn reason_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)reason\s*[:=]\s*([^;\n]+)").expect("static pattern is valid"))
}

/// Parses the model's one-line-per-parameter response, tolerating
/// field reordering and a missing reason: each line is scanned
/// independently for a `param_index` and, if present, a `reason`.
fn parse_tainted_params(response: &str) -> Vec<(usize, String)> {
    let mut found = Vec::new();
    for line in response.lines() {
        let Some(index_match) = param_index_pattern().captures(line) else {
            continue;
        };
        let Ok(index) = index_match[1].parse::<usize>() else {
            continue;
        };
        let reason = reason_pattern()
            .captures(line)
            .map(|captures| captures[1].trim().to_owned())
            .unwrap_or_else(|| "flagged by the model with no further explanation".to_owned());
        found.push((index, reason));
    }
    found
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::llm::MockLlmClient;
    use crate::model::DeclarationKind;

    fn decl(name: &str, is_entry: bool, calls: &[&str]) -> Declaration {
        Declaration {
            name: name.to_owned(),
            kind: if is_entry { DeclarationKind::EntryPoint } else { DeclarationKind::Function },
            file: PathBuf::from("ta/session.c"),
            line: 10,
            params: Vec::new(),
            calls: calls.iter().map(|s| (*s).to_owned()).collect(),
            is_definition: true,
            is_static: false,
        }
    }

    #[tokio::test]
    async fn rule_table_short_circuits_without_needing_a_response() {
        let declarations = vec![decl("invoke", false, &["TEE_MemMove"])];
        let client = MockLlmClient::new(vec![]);
        let limiter = RateLimiter::new(Duration::from_millis(0));
        let sinks = identify_sinks(&declarations, &client, &limiter, None, P3Options::default()).await;
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].decision_method, DecisionMethod::Rule);
        assert_eq!(sinks[0].sink_function, "TEE_MemMove");
        assert!(client.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn llm_identifies_an_unknown_candidate() {
        let declarations = vec![decl("invoke", false, &["custom_export"])];
        let client = MockLlmClient::new(vec![
            "param_index: 1; reason: writes caller-controlled length to shared memory".to_owned(),
        ]);
        let limiter = RateLimiter::new(Duration::from_millis(0));
        let sinks = identify_sinks(&declarations, &client, &limiter, None, P3Options::default()).await;
        assert_eq!(sinks.len(), 1);
        assert_eq!(sinks[0].decision_method, DecisionMethod::Llm);
        assert_eq!(sinks[0].param_indices, vec![1]);
    }

    #[tokio::test]
    async fn llm_only_bypasses_the_rule_table() {
        let declarations = vec![decl("invoke", false, &["TEE_MemMove"])];
        let client = MockLlmClient::new(vec!["param_index: 0; reason: destination buffer".to_owned()]);
        let limiter = RateLimiter::new(Duration::from_millis(0));
        let options = P3Options { llm_only: true, include_debug_macros: false };
        let sinks = identify_sinks(&declarations, &client, &limiter, None, options).await;
        assert_eq!(sinks[0].decision_method, DecisionMethod::Llm);
        assert_eq!(client.recorded_calls().len(), 1);
    }

    #[tokio::test]
    async fn entry_point_calls_are_not_candidates() {
        let declarations = vec![decl("TA_InvokeCommandEntryPoint", true, &["custom_export"])];
        let client = MockLlmClient::new(vec![]);
        let limiter = RateLimiter::new(Duration::from_millis(0));
        let sinks = identify_sinks(&declarations, &client, &limiter, None, P3Options::default()).await;
        assert!(sinks.is_empty());
    }

    #[tokio::test]
    async fn debug_macros_excluded_by_default() {
        let declarations = vec![decl("invoke", false, &["DMSG"])];
        let client = MockLlmClient::new(vec![]);
        let limiter = RateLimiter::new(Duration::from_millis(0));
        let sinks = identify_sinks(&declarations, &client, &limiter, None, P3Options::default()).await;
        assert!(sinks.is_empty());
    }

    #[tokio::test]
    async fn candidate_the_model_clears_is_not_a_sink() {
        let declarations = vec![decl("invoke", false, &["custom_harmless"])];
        let client = MockLlmClient::new(vec!["none".to_owned()]);
        let limiter = RateLimiter::new(Duration::from_millis(0));
        let sinks = identify_sinks(&declarations, &client, &limiter, None, P3Options::default()).await;
        assert!(sinks.is_empty());
    }
}
