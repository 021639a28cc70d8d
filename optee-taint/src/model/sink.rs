use std::path::PathBuf;

/// A known-dangerous TEE/GP API, matched by name against call-sites (P3).
///
/// The rule table (`constants.rs`) is a fixed list of these; `Sink`
/// below is the runtime match against a specific call-site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkRule {
    /// Exact function name this rule matches (e.g. `TEE_MemMove`).
    pub function: &'static str,
    /// Zero-based indices of parameters that carry the vulnerable data
    /// flow, in the spec's UDO/IVW/DUS sense.
    pub tainted_params: &'static [usize],
    /// Short machine-readable category tag used in the final report.
    pub category: &'static str,
}

/// How a [`Sink`] was identified: by the fixed rule table, or by
/// asking the model.
///
/// Per P3's "the model is the authority" principle, `Rule` is only
/// ever an additive short-circuit over a small set of well-known
/// names — it never overrides a model decision, it just skips asking
/// for names already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    /// Matched the static rule table.
    Rule,
    /// Decided by an LLM interrogation of the candidate function.
    Llm,
}

/// A sink call-site identified in a TA's source tree (P3 output).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Sink {
    /// File containing the call-site.
    pub file: PathBuf,
    /// 1-based line of the call-site.
    pub line: u32,
    /// Name of the enclosing function.
    pub function: String,
    /// Name of the sink API being called.
    pub sink_function: String,
    /// Indices of the parameters flagged as vulnerable destinations.
    pub param_indices: Vec<usize>,
    /// Category tag: either copied from the matching rule, or inferred
    /// from the model's reason text when no rule matched.
    pub category: String,
    /// Why this parameter position is dangerous, per the rule's own
    /// description or the model's own words. Concatenated on
    /// dedup collision across multiple parameter positions.
    pub reason: String,
    /// Which mechanism decided this call-site was a sink.
    pub decision_method: DecisionMethod,
}
