use std::path::PathBuf;

use super::Sink;

/// A vulnerable destination: one parameter of one sink call, the unit
/// that P4's flow generator walks backward from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VulnerableDestination {
    /// The sink call-site this destination belongs to.
    pub sink: Sink,
    /// The single parameter index within `sink.param_indices` this VD
    /// represents.
    pub param_index: usize,
}

impl VulnerableDestination {
    /// Grouping key used to detect "same VD" for subchain elimination
    /// (spec.md §4): file, line, sink name, and the full set of
    /// parameter indices flagged on that sink, not just this VD's own
    /// index. Kept exactly as specified even though it means two VDs on
    /// the same call with different `param_index` still collapse to one
    /// key — see `SPEC_FULL.md` §9 for why that is intentional.
    #[must_use]
    pub fn same_vd_key(&self) -> (PathBuf, u32, String, Vec<usize>) {
        let mut params = self.sink.param_indices.clone();
        params.sort_unstable();
        (
            self.sink.file.clone(),
            self.sink.line,
            self.sink.sink_function.clone(),
            params,
        )
    }
}

/// One directed edge of the reverse call graph: `callee` is called by
/// `caller` at `call_site_line` within `caller`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CallEdge {
    /// Name of the calling function.
    pub caller: String,
    /// Name of the called function.
    pub callee: String,
    /// File containing the call-site.
    pub file: PathBuf,
    /// 1-based line of the call-site.
    pub call_site_line: u32,
}

/// A path through the reverse call graph from an entry point down to
/// a sink, expressed as the ordered sequence of edges traversed
/// (entry-point first, sink call last).
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chain {
    /// Edges from entry point to sink, in traversal order.
    pub edges: Vec<CallEdge>,
}

impl Chain {
    /// Name of the entry-point function this chain originates from,
    /// or `None` for an empty chain (the sink function is itself an
    /// entry point).
    #[must_use]
    pub fn entry_point(&self) -> Option<&str> {
        self.edges.first().map(|edge| edge.caller.as_str())
    }

    /// Number of hops in this chain.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.edges.len()
    }
}

/// A candidate flow: one [`Chain`] paired with the [`VulnerableDestination`]
/// it terminates at, ready to be handed to the taint analyzer (P5).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CandidateFlow {
    /// Path from entry point to the sink call.
    pub chain: Chain,
    /// The sink parameter this flow is checking.
    pub destination: VulnerableDestination,
}

impl CandidateFlow {
    /// Grouping key for subchain elimination: delegates to
    /// [`VulnerableDestination::same_vd_key`].
    #[must_use]
    pub fn same_vd_key(&self) -> (PathBuf, u32, String, Vec<usize>) {
        self.destination.same_vd_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sink;

    fn sink(params: Vec<usize>) -> Sink {
        Sink {
            file: PathBuf::from("ta/session.c"),
            line: 10,
            function: "invoke".to_owned(),
            sink_function: "TEE_MemMove".to_owned(),
            param_indices: params,
            category: "UDO".to_owned(),
            reason: "destination buffer crosses the trust boundary".to_owned(),
            decision_method: crate::model::DecisionMethod::Rule,
        }
    }

    #[test]
    fn same_vd_key_ignores_own_param_index() {
        let a = VulnerableDestination { sink: sink(vec![0, 1]), param_index: 0 };
        let b = VulnerableDestination { sink: sink(vec![1, 0]), param_index: 1 };
        assert_eq!(a.same_vd_key(), b.same_vd_key());
    }

    #[test]
    fn chain_entry_point_is_none_when_empty() {
        let chain = Chain::default();
        assert_eq!(chain.entry_point(), None);
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn chain_entry_point_is_first_caller() {
        let chain = Chain {
            edges: vec![CallEdge {
                caller: "TA_InvokeCommandEntryPoint".to_owned(),
                callee: "handle_cmd".to_owned(),
                file: PathBuf::from("ta/session.c"),
                call_site_line: 5,
            }],
        };
        assert_eq!(chain.entry_point(), Some("TA_InvokeCommandEntryPoint"));
        assert_eq!(chain.depth(), 1);
    }
}
