use petgraph::graph::NodeIndex;

use crate::model::{CallEdge, Chain};

use super::call_graph::CallGraph;

/// Walks `graph` backward from `sink_function` to every entry point
/// reachable within `max_depth` hops, returning one [`Chain`] per
/// distinct entry-point-to-sink path found.
///
/// Visited-node tracking is per-path (a `Vec` pushed/popped along the
/// recursion), not global, so the same function can appear on two
/// different branches of the search without one branch poisoning the
/// other — global visited tracking would silently drop legitimate
/// diamond-shaped call paths. Cycles are still broken because a
/// function already on the *current* path is never re-entered.
#[must_use]
pub(super) fn backward_chains(graph: &CallGraph, sink_function: &str, max_depth: usize) -> Vec<Chain> {
    let Some(start) = graph.node(sink_function) else {
        return Vec::new();
    };

    let mut chains = Vec::new();
    let mut path = Vec::new();
    let mut on_path = vec![start];
    walk(graph, start, max_depth, &mut path, &mut on_path, &mut chains);
    chains
}

fn walk(
    graph: &CallGraph,
    node: NodeIndex,
    remaining_depth: usize,
    path: &mut Vec<CallEdge>,
    on_path: &mut Vec<NodeIndex>,
    chains: &mut Vec<Chain>,
) {
    let name = graph.name(node);
    if graph.is_entry_point(name) {
        chains.push(Chain {
            edges: path.iter().rev().cloned().collect(),
        });
    }

    if remaining_depth == 0 {
        return;
    }

    for (caller, file, line) in graph.callers(node) {
        if on_path.contains(&caller) {
            continue;
        }
        let callee_name = graph.name(node).to_owned();
        let caller_name = graph.name(caller).to_owned();
        path.push(CallEdge {
            caller: caller_name,
            callee: callee_name,
            file,
            call_site_line: line,
        });
        on_path.push(caller);

        walk(graph, caller, remaining_depth - 1, path, on_path, chains);

        on_path.pop();
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::{Declaration, DeclarationKind};

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
    fn chain_runs_entry_point_first_sink_last() {
        let declarations = vec![
            decl("TA_InvokeCommandEntryPoint", DeclarationKind::EntryPoint, &["dispatch"]),
            decl("dispatch", DeclarationKind::Function, &["TEE_MemMove"]),
        ];
        let graph = CallGraph::build(&declarations);
        let chains = backward_chains(&graph, "TEE_MemMove", 8);

        assert_eq!(chains.len(), 1);
        let chain = &chains[0];
        assert_eq!(chain.edges[0].caller, "TA_InvokeCommandEntryPoint");
        assert_eq!(chain.edges[0].callee, "dispatch");
        assert_eq!(chain.edges[1].caller, "dispatch");
        assert_eq!(chain.edges[1].callee, "TEE_MemMove");
    }

    #[test]
    fn cycles_do_not_hang_the_walk() {
        let declarations = vec![
            decl("TA_InvokeCommandEntryPoint", DeclarationKind::EntryPoint, &["a"]),
            decl("a", DeclarationKind::Function, &["b"]),
            decl("b", DeclarationKind::Function, &["a", "TEE_MemMove"]),
        ];
        let graph = CallGraph::build(&declarations);
        let chains = backward_chains(&graph, "TEE_MemMove", 8);
        assert!(!chains.is_empty());
        assert!(chains[0].edges.len() <= 8);
    }

    #[test]
    fn depth_bound_is_respected() {
        let declarations = vec![
            decl("TA_InvokeCommandEntryPoint", DeclarationKind::EntryPoint, &["a"]),
            decl("a", DeclarationKind::Function, &["b"]),
            decl("b", DeclarationKind::Function, &["TEE_MemMove"]),
        ];
        let graph = CallGraph::build(&declarations);
        let chains = backward_chains(&graph, "TEE_MemMove", 1);
        assert!(chains.is_empty());
    }

    #[test]
    fn unknown_sink_yields_no_chains() {
        let graph = CallGraph::build(&[]);
        assert!(backward_chains(&graph, "nonexistent", 8).is_empty());
    }
}
