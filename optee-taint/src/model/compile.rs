use std::path::PathBuf;

/// One entry of a `compile_commands.json`-shaped build database.
///
/// Produced by P0's fallback cascade regardless of which build system
/// actually ran; every later phase only ever sees this normalized shape.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CompileEntry {
    /// Directory the compiler was invoked from.
    pub directory: PathBuf,
    /// Source file this entry compiles.
    pub file: PathBuf,
    /// Tokenized argv of the compile command, with the driver itself
    /// as element 0 (`arguments`, not `command`, so no shell re-splitting
    /// is needed downstream).
    pub arguments: Vec<String>,
    /// True when this entry was synthesized from an orphaned `.c` file
    /// rather than recorded from a real compiler invocation.
    #[serde(default)]
    pub synthesized: bool,
}

impl CompileEntry {
    /// Include directories (`-I...`) extracted from `arguments`.
    pub fn include_dirs(&self) -> impl Iterator<Item = &str> {
        self.arguments
            .iter()
            .filter_map(|arg| arg.strip_prefix("-I"))
    }

    /// Preprocessor defines (`-D...`) extracted from `arguments`.
    pub fn defines(&self) -> impl Iterator<Item = &str> {
        self.arguments
            .iter()
            .filter_map(|arg| arg.strip_prefix("-D"))
    }
}
