use std::path::Path;

use tree_sitter::{Node, Tree};

use crate::constants::TA_ENTRY_POINTS;
use crate::model::{Declaration, DeclarationKind};
use crate::utils::LineIndex;

/// Walks a parsed translation unit and extracts every function
/// declaration — both definitions and bare prototypes — as a
/// [`Declaration`], along with the names of every function a
/// definition calls directly.
///
/// Parse errors in unrelated parts of the file do not stop extraction:
/// nodes under a tree-sitter `ERROR` node are simply skipped, mirroring
/// the teacher's best-effort CST walk.
#[must_use]
pub fn extract_declarations(file: &Path, source: &str, tree: &Tree) -> Vec<Declaration> {
    let lines = LineIndex::new(source);
    let mut declarations = Vec::new();
    walk_node(tree.root_node(), source, file, &lines, &mut declarations);
    declarations
}

fn walk_node(
    node: Node,
    source: &str,
    file: &Path,
    lines: &LineIndex,
    out: &mut Vec<Declaration>,
) {
    if node.is_error() {
        return;
    }
    match node.kind() {
        "function_definition" => {
            if let Some(decl) = extract_function(node, source, file, lines, true) {
                out.push(decl);
            }
            // Don't recurse into the body looking for nested
            // function_definitions — C has none — but do keep walking
            // siblings via the caller's loop below.
            return;
        }
        "declaration" => {
            if let Some(decl) = extract_function(node, source, file, lines, false) {
                out.push(decl);
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_node(child, source, file, lines, out);
    }
}

fn extract_function(
    node: Node,
    source: &str,
    file: &Path,
    lines: &LineIndex,
    is_definition: bool,
) -> Option<Declaration> {
    let declarator = find_function_declarator(node)?;
    let name_node = declarator.child_by_field_name("declarator")?;
    let name = node_text(name_node, source).to_owned();
    let params = declarator
        .child_by_field_name("parameters")
        .map(|params_node| collect_param_names(params_node, source))
        .unwrap_or_default();
    let calls = if is_definition {
        let body = node.child_by_field_name("body")?;
        collect_calls(body, source)
    } else {
        Vec::new()
    };
    let line = lines.line_at(node.start_byte());
    let kind = if TA_ENTRY_POINTS.contains(&name.as_str()) {
        DeclarationKind::EntryPoint
    } else {
        DeclarationKind::Function
    };
    Some(Declaration {
        name,
        kind,
        file: file.to_path_buf(),
        line,
        params,
        calls,
        is_definition,
        is_static: has_static_specifier(node, source),
    })
}

/// Whether `node` (a `function_definition` or `declaration`) carries a
/// `static` storage-class specifier among its direct children.
fn has_static_specifier(node: Node, source: &str) -> bool {
    let mut cursor = node.walk();
    let result = node.children(&mut cursor)
        .any(|child| child.kind() == "storage_class_specifier" && node_text(child, source) == "static");
    result
}

/// Finds the innermost `function_declarator` under a `function_definition`
/// or a prototype `declaration`, skipping through pointer declarators
/// (`char *foo(...)`).
fn find_function_declarator(node: Node) -> Option<Node> {
    let mut declarator = node.child_by_field_name("declarator")?;
    loop {
        match declarator.kind() {
            "function_declarator" => return Some(declarator),
            "pointer_declarator" => {
                declarator = declarator.child_by_field_name("declarator")?;
            }
            _ => return None,
        }
    }
}

fn collect_param_names(params_node: Node, source: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = params_node.walk();
    for child in params_node.children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            if let Some(declarator) = child.child_by_field_name("declarator") {
                names.push(node_text(declarator, source).to_owned());
            }
        }
    }
    names
}

fn collect_calls(body: Node, source: &str) -> Vec<String> {
    let mut calls = Vec::new();
    collect_calls_rec(body, source, &mut calls);
    calls
}

fn collect_calls_rec(node: Node, source: &str, out: &mut Vec<String>) {
    if node.kind() == "call_expression" {
        if let Some(function_node) = node.child_by_field_name("function") {
            if function_node.kind() == "identifier" {
                out.push(node_text(function_node, source).to_owned());
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_calls_rec(child, source, out);
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}
