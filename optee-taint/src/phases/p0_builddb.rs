//! P0: build-database provisioner.
//!
//! Produces a normalized [`CompileEntry`] list for a TA project by
//! trying, in order: the project's own `build.sh` wrapped in a
//! recording shim, `ndk_build.sh`, a top-level `make`, `make -C ta`,
//! and finally a CMake-export attempt. Any `.c` file left unreferenced
//! by every attempt gets a synthesized entry so P1-2 still sees it.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::warn;

use crate::config::DevKitConfig;
use crate::error::BuildDbError;
use crate::model::CompileEntry;
use crate::utils::{discover_c_files, discover_files_with_ext, ta_dir};

/// One fallback strategy in the cascade, tried in declaration order.
enum Strategy {
    /// Run `<ta_dir>/build.sh` under a `bear`-style recording wrapper.
    RecordedBuildSh,
    /// Run `<ta_dir>/ndk_build.sh` under the same wrapper.
    RecordedNdkBuildSh,
    /// Run `make` at the project root under the wrapper.
    TopLevelMake,
    /// Run `make` inside `ta/` under the wrapper.
    TaMake,
    /// Ask CMake to export a compilation database directly.
    CMakeExport,
}

const CASCADE: &[Strategy] = &[
    Strategy::RecordedBuildSh,
    Strategy::RecordedNdkBuildSh,
    Strategy::TopLevelMake,
    Strategy::TaMake,
    Strategy::CMakeExport,
];

/// Runs the build-database provisioner against `project_root`.
///
/// # Errors
/// Returns [`BuildDbError::MissingTaDir`] only when there is no `ta/`
/// directory at all; every other failure mode in the cascade is
/// swallowed and the next strategy is tried, per spec.md §7.
pub fn provision(project_root: &Path, devkit: &DevKitConfig, skip_clean: bool) -> Result<Vec<CompileEntry>, BuildDbError> {
    let ta = ta_dir(project_root).ok_or_else(|| BuildDbError::MissingTaDir(project_root.to_path_buf()))?;

    if !skip_clean {
        clean_stale_dep_files(&ta);
    }

    for strategy in CASCADE {
        if let Some(entries) = try_strategy(strategy, project_root, &ta) {
            let filtered = filter_to_ta_tree(entries, &ta);
            if !filtered.is_empty() {
                return Ok(synthesize_orphans(filtered, &ta, devkit));
            }
        }
    }

    Ok(synthesize_orphans(Vec::new(), &ta, devkit))
}

/// Removes every `*.d` dependency file under `ta` whose recorded
/// prerequisites reference a toolchain path that no longer exists on
/// disk, so a stale path baked in by a previous build doesn't poison
/// this run's recording wrapper (spec.md §4.1).
fn clean_stale_dep_files(ta: &Path) {
    for dep_file in discover_files_with_ext(ta, "d") {
        let Ok(contents) = std::fs::read_to_string(&dep_file) else {
            continue;
        };
        let stale = contents
            .split_whitespace()
            .filter(|token| token.starts_with('/'))
            .any(|token| !Path::new(token).exists());
        if stale {
            if let Err(err) = std::fs::remove_file(&dep_file) {
                warn!(file = %dep_file.display(), %err, "failed to remove stale dependency file");
            }
        }
    }
}

/// Retains only entries whose file lies under the TA source tree,
/// dropping anything a build system recorded from outside it (devkit
/// headers compiled as part of a shared build, host-side tooling, and
/// similar) per spec.md §4.1's filtering rule.
fn filter_to_ta_tree(entries: Vec<CompileEntry>, ta: &Path) -> Vec<CompileEntry> {
    entries.into_iter().filter(|entry| entry.file.starts_with(ta)).collect()
}

fn try_strategy(strategy: &Strategy, project_root: &Path, ta: &Path) -> Option<Vec<CompileEntry>> {
    let database_path = ta.join("compile_commands.json");
    match strategy {
        Strategy::RecordedBuildSh => run_recorded(ta, "build.sh", &database_path),
        Strategy::RecordedNdkBuildSh => run_recorded(ta, "ndk_build.sh", &database_path),
        Strategy::TopLevelMake => run_recorded_make(project_root, &database_path),
        Strategy::TaMake => run_recorded_make(ta, &database_path),
        Strategy::CMakeExport => run_cmake_export(ta, &database_path),
    }
}

/// Invokes `bear -- ./<script>` inside `dir`, then parses the compile
/// database it records, if the script exists and the recorder succeeds.
fn run_recorded(dir: &Path, script: &str, database_path: &Path) -> Option<Vec<CompileEntry>> {
    let script_path = dir.join(script);
    if !script_path.is_file() {
        return None;
    }
    let status = Command::new("bear")
        .arg("--")
        .arg("sh")
        .arg(script)
        .current_dir(dir)
        .status()
        .ok()?;
    if !status.success() {
        return None;
    }
    read_database(database_path).ok()
}

fn run_recorded_make(dir: &Path, database_path: &Path) -> Option<Vec<CompileEntry>> {
    if !dir.join("Makefile").is_file() {
        return None;
    }
    let status = Command::new("bear")
        .arg("--")
        .arg("make")
        .current_dir(dir)
        .status()
        .ok()?;
    if !status.success() {
        return None;
    }
    read_database(database_path).ok()
}

fn run_cmake_export(dir: &Path, database_path: &Path) -> Option<Vec<CompileEntry>> {
    if !dir.join("CMakeLists.txt").is_file() {
        return None;
    }
    let status = Command::new("cmake")
        .args(["-DCMAKE_EXPORT_COMPILE_COMMANDS=ON", "-B", "build", "."])
        .current_dir(dir)
        .status()
        .ok()?;
    if !status.success() {
        return None;
    }
    read_database(&dir.join("build").join("compile_commands.json")).ok()
}

fn read_database(path: &Path) -> Result<Vec<CompileEntry>, BuildDbError> {
    let raw = std::fs::read(path).map_err(|source| BuildDbError::SpawnFailed {
        command: format!("read {}", path.display()),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| BuildDbError::MalformedDatabase {
        path: path.to_path_buf(),
        source,
    })
}

/// Adds a synthesized [`CompileEntry`] for every `.c` file under `ta`
/// not already covered by an entry from the build, so P1-2 still gets
/// a best-effort parse even when no build system ran at all.
///
/// Synthesized arguments mirror what a real OP-TEE TA build invokes
/// with: the TA's own `include/` and root directories first (so a
/// local header shadows the devkit's), then the devkit's `include/`.
fn synthesize_orphans(mut entries: Vec<CompileEntry>, ta: &Path, devkit: &DevKitConfig) -> Vec<CompileEntry> {
    let covered: std::collections::HashSet<PathBuf> =
        entries.iter().map(|entry| entry.file.clone()).collect();
    for file in discover_c_files(ta) {
        if covered.contains(&file) {
            continue;
        }
        let output = file.with_extension("o");
        let mut arguments = vec![
            "cc".to_owned(),
            format!("-I{}", ta.join("include").display()),
            format!("-I{}", ta.display()),
            format!("-I{}", devkit.ta_dev_kit_dir.join("include").display()),
        ];
        for dir in &devkit.extra_include_dirs {
            arguments.push(format!("-I{}", dir.display()));
        }
        arguments.push("-c".to_owned());
        arguments.push(file.to_string_lossy().into_owned());
        arguments.push("-o".to_owned());
        arguments.push(output.to_string_lossy().into_owned());
        entries.push(CompileEntry {
            directory: ta.to_path_buf(),
            file,
            arguments,
            synthesized: true,
        });
    }
    entries
}
