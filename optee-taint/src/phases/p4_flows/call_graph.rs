use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashSet;

use crate::model::Declaration;

/// Reverse-indexable call graph: one node per function name seen
/// either as a caller or a callee, one edge per direct call-site.
///
/// Built once per run and shared read-only across every sink's
/// backward traversal in P4.
pub struct CallGraph {
    graph: DiGraph<String, CallEdgeData>,
    index: HashMap<String, NodeIndex>,
    /// Function names that are themselves TA entry points, i.e. valid
    /// traversal roots.
    entry_points: FxHashSet<String>,
}

#[derive(Clone)]
struct CallEdgeData {
    file: PathBuf,
    line: u32,
}

impl CallGraph {
    /// Builds the graph from a flat declaration list.
    #[must_use]
    pub fn build(declarations: &[Declaration]) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut entry_points = FxHashSet::default();

        let mut node_for = |graph: &mut DiGraph<String, CallEdgeData>,
                             index: &mut HashMap<String, NodeIndex>,
                             name: &str| {
            *index
                .entry(name.to_owned())
                .or_insert_with(|| graph.add_node(name.to_owned()))
        };

        for decl in declarations {
            let caller = node_for(&mut graph, &mut index, &decl.name);
            if decl.is_entry_point() {
                entry_points.insert(decl.name.clone());
            }
            for callee_name in &decl.calls {
                let callee = node_for(&mut graph, &mut index, callee_name);
                graph.add_edge(
                    caller,
                    callee,
                    CallEdgeData {
                        file: decl.file.clone(),
                        line: decl.line,
                    },
                );
            }
        }

        Self {
            graph,
            index,
            entry_points,
        }
    }

    pub(super) fn node(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub(super) fn name(&self, node: NodeIndex) -> &str {
        &self.graph[node]
    }

    pub(super) fn is_entry_point(&self, name: &str) -> bool {
        self.entry_points.contains(name)
    }

    /// Callers of `node`, paired with the call-site location recorded
    /// on that edge.
    pub(super) fn callers(&self, node: NodeIndex) -> Vec<(NodeIndex, PathBuf, u32)> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| {
                let data = edge.weight();
                (edge.source(), data.file.clone(), data.line)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeclarationKind;

    fn decl(name: &str, kind: DeclarationKind, calls: &[&str]) -> Declaration {
        Declaration {
            name: name.to_owned(),
            kind,
            file: PathBuf::from("ta/session.c"),
            line: 1,
            params: Vec::new(),
            calls: calls.iter().map(|s| (*s).to_owned()).collect(),
            is_definition: true,
            is_static: false,
        }
    }

    #[test]
    fn every_declared_call_becomes_a_reverse_edge() {
        let declarations = vec![
            decl("TA_InvokeCommandEntryPoint", DeclarationKind::EntryPoint, &["handle_cmd"]),
            decl("handle_cmd", DeclarationKind::Function, &["TEE_MemMove"]),
        ];
        let graph = CallGraph::build(&declarations);

        let sink_node = graph.node("TEE_MemMove").expect("sink node present");
        let callers = graph.callers(sink_node);
        assert_eq!(callers.len(), 1);
        assert_eq!(graph.name(callers[0].0), "handle_cmd");

        let handle_node = graph.node("handle_cmd").expect("handle_cmd node present");
        let callers_of_handle = graph.callers(handle_node);
        assert_eq!(callers_of_handle.len(), 1);
        assert_eq!(graph.name(callers_of_handle[0].0), "TA_InvokeCommandEntryPoint");
    }

    #[test]
    fn entry_points_are_flagged() {
        let declarations = vec![decl("TA_InvokeCommandEntryPoint", DeclarationKind::EntryPoint, &[])];
        let graph = CallGraph::build(&declarations);
        assert!(graph.is_entry_point("TA_InvokeCommandEntryPoint"));
        assert!(!graph.is_entry_point("handle_cmd"));
    }
}
