//! Small filesystem and text helpers shared across phases.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::constants::DEFAULT_EXCLUDE_DIRS;

/// Maps byte offsets in a source buffer to 1-based line numbers.
///
/// tree-sitter reports nodes by byte range; every phase that needs a
/// human-facing line number goes through this rather than re-counting
/// newlines on every lookup.
pub struct LineIndex {
    /// Byte offset of the start of each line.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Builds an index over `source`.
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        Self { line_starts }
    }

    /// Converts a byte offset to its 1-based line number.
    #[must_use]
    pub fn line_at(&self, byte_offset: usize) -> u32 {
        match self.line_starts.binary_search(&byte_offset) {
            Ok(line) => line as u32 + 1,
            Err(insertion) => insertion as u32,
        }
    }
}

/// Discovers every file under `root` whose extension is `ext`,
/// honoring `.gitignore` and the fixed exclude-dir list (spec.md §2).
pub fn discover_files_with_ext(root: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(root);
    builder.hidden(false);
    for dir in DEFAULT_EXCLUDE_DIRS {
        builder.filter_entry({
            let dir = (*dir).to_owned();
            move |entry| entry.file_name().to_string_lossy() != dir
        });
    }
    for entry in builder.build().flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|found| found == ext) {
            files.push(path.to_path_buf());
        }
    }
    files
}

/// Discovers every `.c` file under `root`.
pub fn discover_c_files(root: &Path) -> Vec<PathBuf> {
    discover_files_with_ext(root, "c")
}

/// Resolves the `ta/` subdirectory of a TA project root, if present.
#[must_use]
pub fn ta_dir(project_root: &Path) -> Option<PathBuf> {
    let candidate = project_root.join("ta");
    candidate.is_dir().then_some(candidate)
}

/// Serializes `value` as pretty-printed JSON and writes it to `path`,
/// creating parent directories as needed.
///
/// # Errors
/// Propagates the underlying I/O or serialization error.
pub fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
    std::fs::write(path, json)
}

/// Resolves the eight files a run persists per TA (spec.md §6), all
/// living under `<project>/ta/results/` and named after the TA
/// (the project directory's own name).
///
/// Grounded on the teacher's `utils::validate_output_path`: one type
/// owns every path a run can produce so no phase hand-rolls its own
/// `join()` chain.
pub struct RunPaths {
    dir: PathBuf,
    ta_name: String,
}

impl RunPaths {
    /// Resolves run paths for `project_root`.
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        let ta_name = project_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ta".to_owned());
        Self {
            dir: project_root.join("ta").join("results"),
            ta_name,
        }
    }

    /// Creates the results directory if it doesn't already exist.
    ///
    /// # Errors
    /// Propagates the underlying I/O error.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// The results directory itself, for report artifacts that don't
    /// follow the `<ta>_<name>` naming convention.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn named(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{suffix}", self.ta_name))
    }

    /// P1-2 classifier output: every extracted [`crate::model::Declaration`].
    #[must_use]
    pub fn phase12_json(&self) -> PathBuf {
        self.named("phase12.json")
    }

    /// P3 sink identifier output.
    #[must_use]
    pub fn sinks_json(&self) -> PathBuf {
        self.named("sinks.json")
    }

    /// P4 candidate-flow generator output.
    #[must_use]
    pub fn candidate_flows_json(&self) -> PathBuf {
        self.named("candidate_flows.json")
    }

    /// P5 taint analyzer output: the merged global findings set.
    #[must_use]
    pub fn vulnerabilities_json(&self) -> PathBuf {
        self.named("vulnerabilities.json")
    }

    /// P6 HTML report.
    #[must_use]
    pub fn vulnerability_report_html(&self) -> PathBuf {
        self.named("vulnerability_report.html")
    }

    /// Human-readable conversation log, appended to by P5.
    #[must_use]
    pub fn log_txt(&self) -> PathBuf {
        self.dir.join("taint_analysis_log.txt")
    }

    /// Wall-clock timing summary, written by the pipeline after a run.
    #[must_use]
    pub fn time_txt(&self) -> PathBuf {
        self.dir.join("time.txt")
    }
}
