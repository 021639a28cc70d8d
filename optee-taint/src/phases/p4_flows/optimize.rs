use std::collections::HashMap;

use crate::model::CandidateFlow;

/// Four-stage optimization pass reducing the raw per-parameter,
/// per-chain flow set down to what P5 actually needs to price through
/// an LLM call (spec.md §4):
///
/// 1. parameter merging — flows sharing a chain and sink collapse to
///    one flow carrying every tainted parameter index together;
/// 2. exact dedup — byte-identical flows collapse to one;
/// 3. subchain elimination — when flow A's chain is a strict prefix of
///    flow B's chain and they share a "same VD" key, the shorter A is
///    dropped in favor of the more complete B;
/// 4. same-line sink merging — flows landing on the same file/line
///    sink collapse together regardless of chain, since the model
///    only needs to see one representative path per sink line.
#[must_use]
pub(super) fn optimize(flows: Vec<CandidateFlow>) -> Vec<CandidateFlow> {
    let flows = merge_parameters(flows);
    let flows = dedup_exact(flows);
    let flows = eliminate_subchains(flows);
    merge_same_line_sinks(flows)
}

fn merge_parameters(flows: Vec<CandidateFlow>) -> Vec<CandidateFlow> {
    // Parameters are already grouped per-sink in `Sink::param_indices`;
    // at this stage "merging" means collapsing flows that differ only
    // in `destination.param_index` but share chain + sink location,
    // since the sink already carries the full parameter set.
    let mut seen: HashMap<(String, u32, String, Vec<usize>, usize), CandidateFlow> = HashMap::new();
    for flow in flows {
        let key = chain_signature(&flow);
        seen.entry(key).or_insert(flow);
    }
    seen.into_values().collect()
}

fn chain_signature(flow: &CandidateFlow) -> (String, u32, String, Vec<usize>, usize) {
    let sig: String = flow
        .chain
        .edges
        .iter()
        .map(|edge| format!("{}>{}", edge.caller, edge.callee))
        .collect::<Vec<_>>()
        .join(";");
    (
        sig,
        flow.destination.sink.line,
        flow.destination.sink.sink_function.clone(),
        flow.destination.sink.param_indices.clone(),
        flow.destination.param_index,
    )
}

fn dedup_exact(flows: Vec<CandidateFlow>) -> Vec<CandidateFlow> {
    let mut out: Vec<CandidateFlow> = Vec::with_capacity(flows.len());
    for flow in flows {
        if !out.iter().any(|existing| existing == &flow) {
            out.push(flow);
        }
    }
    out
}

/// Drops flows whose chain is a strict prefix of another flow's chain
/// when both target the "same VD" (spec.md §4, §9): the shorter path
/// is redundant information once the longer path covering the same
/// destination is known.
fn eliminate_subchains(flows: Vec<CandidateFlow>) -> Vec<CandidateFlow> {
    let mut keep = vec![true; flows.len()];
    for i in 0..flows.len() {
        if !keep[i] {
            continue;
        }
        for j in 0..flows.len() {
            if i == j || !keep[j] {
                continue;
            }
            if flows[i].same_vd_key() == flows[j].same_vd_key()
                && is_strict_prefix(&flows[i].chain.edges, &flows[j].chain.edges)
            {
                keep[i] = false;
                break;
            }
        }
    }
    flows
        .into_iter()
        .zip(keep)
        .filter_map(|(flow, keep)| keep.then_some(flow))
        .collect()
}

fn is_strict_prefix(a: &[crate::model::CallEdge], b: &[crate::model::CallEdge]) -> bool {
    a.len() < b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Collapses any remaining flows that land on the same sink
/// file/line, keeping the first (shortest, by construction order)
/// representative chain per line.
fn merge_same_line_sinks(flows: Vec<CandidateFlow>) -> Vec<CandidateFlow> {
    let mut seen = std::collections::HashSet::new();
    flows
        .into_iter()
        .filter(|flow| {
            let key = (flow.destination.sink.file.clone(), flow.destination.sink.line);
            seen.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::{CallEdge, Chain, Sink, VulnerableDestination};

    fn sink(line: u32) -> Sink {
        Sink {
            file: PathBuf::from("ta/session.c"),
            line,
            function: "invoke".to_owned(),
            sink_function: "TEE_MemMove".to_owned(),
            param_indices: vec![0],
            category: "UDO".to_owned(),
            reason: "destination buffer crosses the trust boundary".to_owned(),
            decision_method: crate::model::DecisionMethod::Rule,
        }
    }

    fn edge(caller: &str, callee: &str) -> CallEdge {
        CallEdge {
            caller: caller.to_owned(),
            callee: callee.to_owned(),
            file: PathBuf::from("ta/session.c"),
            call_site_line: 1,
        }
    }

    fn flow(edges: Vec<CallEdge>, line: u32) -> CandidateFlow {
        CandidateFlow {
            chain: Chain { edges },
            destination: VulnerableDestination { sink: sink(line), param_index: 0 },
        }
    }

    #[test]
    fn exact_duplicates_collapse_to_one() {
        let a = flow(vec![edge("entry", "TEE_MemMove")], 10);
        let b = a.clone();
        let out = dedup_exact(vec![a, b]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn shorter_subchain_is_dropped_for_same_vd() {
        let short = flow(vec![edge("entry", "TEE_MemMove")], 10);
        let long = flow(vec![edge("entry", "mid"), edge("mid", "TEE_MemMove")], 10);
        let out = eliminate_subchains(vec![short, long.clone()]);
        assert_eq!(out, vec![long]);
    }

    #[test]
    fn distinct_sink_lines_are_not_merged() {
        let a = flow(vec![edge("entry", "TEE_MemMove")], 10);
        let b = flow(vec![edge("entry", "TEE_MemMove")], 20);
        let out = merge_same_line_sinks(vec![a, b]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn same_line_sinks_collapse_regardless_of_chain() {
        let a = flow(vec![edge("entry_a", "TEE_MemMove")], 10);
        let b = flow(vec![edge("entry_b", "TEE_MemMove")], 10);
        let out = merge_same_line_sinks(vec![a, b]);
        assert_eq!(out.len(), 1);
    }
}
