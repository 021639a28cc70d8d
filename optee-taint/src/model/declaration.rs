use std::path::PathBuf;

/// Kind of top-level declaration recorded by the classifier (P1-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    /// A TA entry point (`TA_InvokeCommandEntryPoint` and friends).
    EntryPoint,
    /// A plain function, defined or declared, inside or outside the TA.
    Function,
}

/// A single top-level function declaration extracted from the C AST,
/// keyed by its source location.
///
/// `is_definition` is the partition spec.md §4.2 keys on: a
/// `is_definition=true` declaration under the project root is a
/// *user-defined function*; everything else is an *external
/// declaration* (a prototype, or any definition outside the project,
/// e.g. a GlobalPlatform API header).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Declaration {
    /// Function name as written in the source.
    pub name: String,
    /// Kind of declaration this represents.
    pub kind: DeclarationKind,
    /// File this declaration was found in.
    pub file: PathBuf,
    /// 1-based line number of the declaration.
    pub line: u32,
    /// Names of the function's formal parameters, in order.
    pub params: Vec<String>,
    /// Names of every function called directly from this declaration's
    /// body, in the order they first appear. Empty for a prototype.
    pub calls: Vec<String>,
    /// Whether this declaration has a body (`function_definition`)
    /// rather than being a bare prototype (`declaration`).
    pub is_definition: bool,
    /// Whether the declaration carries a `static` storage-class
    /// specifier, giving it internal linkage.
    pub is_static: bool,
}

impl Declaration {
    /// Whether this declaration is one of the four standard TA
    /// entry points a REE client can invoke.
    #[must_use]
    pub fn is_entry_point(&self) -> bool {
        matches!(self.kind, DeclarationKind::EntryPoint)
    }
}
