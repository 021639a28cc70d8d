//! P4: candidate-flow generator.
//!
//! The heaviest phase in the pipeline: builds the reverse call graph
//! from declarations, walks it backward from every sink to every
//! reachable entry point, then optimizes the raw chain set down to
//! the minimal set of candidate flows P5 actually needs to examine.

mod call_graph;
mod optimize;
mod traverse;

pub use call_graph::CallGraph;

use crate::model::{CandidateFlow, Declaration, Sink, VulnerableDestination};

/// Runs the full P4 pipeline: graph construction, backward traversal,
/// and the four-stage optimization pass (spec.md §4).
#[must_use]
pub fn generate_candidate_flows(
    declarations: &[Declaration],
    sinks: &[Sink],
    max_depth: usize,
) -> Vec<CandidateFlow> {
    let graph = CallGraph::build(declarations);

    let mut raw_flows = Vec::new();
    for sink in sinks {
        let chains = traverse::backward_chains(&graph, &sink.function, max_depth);
        for param_index in &sink.param_indices {
            let destination = VulnerableDestination {
                sink: sink.clone(),
                param_index: *param_index,
            };
            for chain in &chains {
                raw_flows.push(CandidateFlow {
                    chain: chain.clone(),
                    destination: destination.clone(),
                });
            }
        }
    }

    optimize::optimize(raw_flows)
}
