//! Drives the compiled `optee-taint` binary end-to-end.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn bin() -> Command {
    Command::cargo_bin("optee-taint").expect("binary builds")
}

#[test]
fn configure_set_writes_a_toml_file_with_the_given_overrides() {
    let project = TempDir::new().expect("create temp dir");

    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "set",
            "--llm-endpoint",
            "https://example.test/v1/chat/completions",
            "--llm-model",
            "test-model",
            "--llm-api-key-env",
            "TEST_API_KEY",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    let config_path = project.path().join("optee-taint.toml");
    assert!(config_path.is_file());
    let contents = std::fs::read_to_string(&config_path).expect("read config");
    assert!(contents.contains("https://example.test/v1/chat/completions"));
    assert!(contents.contains("test-model"));
    assert!(contents.contains("TEST_API_KEY"));
}

#[test]
fn configure_set_is_idempotent_and_preserves_unset_fields_on_rerun() {
    let project = TempDir::new().expect("create temp dir");

    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "set",
            "--llm-model",
            "first-model",
        ])
        .assert()
        .success();

    // Re-running with a different single override must not clobber the
    // endpoint/model set by the first run.
    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "set",
            "--llm-api-key-env",
            "SECOND_RUN_KEY",
        ])
        .assert()
        .success();

    let contents = std::fs::read_to_string(project.path().join("optee-taint.toml")).expect("read config");
    assert!(contents.contains("first-model"));
    assert!(contents.contains("SECOND_RUN_KEY"));
}

#[test]
fn configure_set_with_a_provider_preset_applies_its_defaults() {
    let project = TempDir::new().expect("create temp dir");

    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "set",
            "openai",
        ])
        .assert()
        .success();

    let contents = std::fs::read_to_string(project.path().join("optee-taint.toml")).expect("read config");
    assert!(contents.contains("api.openai.com"));
    assert!(contents.contains("OPENAI_API_KEY"));
}

#[test]
fn configure_status_reports_whether_the_api_key_is_set() {
    let project = TempDir::new().expect("create temp dir");

    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "set",
            "--llm-api-key-env",
            "OPTEE_TAINT_CLI_TEST_UNSET_KEY",
        ])
        .assert()
        .success();

    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "status",
        ])
        .env_remove("OPTEE_TAINT_CLI_TEST_UNSET_KEY")
        .assert()
        .success()
        .stdout(predicate::str::contains("set: false"));
}

#[test]
fn configure_export_prints_toml_to_stdout() {
    let project = TempDir::new().expect("create temp dir");

    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "set",
            "--llm-model",
            "exported-model",
        ])
        .assert()
        .success();

    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "export",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("exported-model"));
}

#[test]
fn analyze_fails_gracefully_without_a_configured_api_key() {
    let project = TempDir::new().expect("create temp dir");
    std::fs::create_dir_all(project.path().join("ta")).expect("create ta dir");

    // Point at an env var that is certainly unset rather than relying
    // on the ambient environment not defining the default one.
    bin()
        .args([
            "configure",
            "--project-root",
            project.path().to_str().expect("utf8 path"),
            "set",
            "--llm-api-key-env",
            "OPTEE_TAINT_CLI_TEST_UNSET_KEY",
        ])
        .assert()
        .success();

    bin()
        .args(["analyze", "-p", project.path().to_str().expect("utf8 path")])
        .env_remove("OPTEE_TAINT_CLI_TEST_UNSET_KEY")
        .assert()
        .failure();
}

#[test]
fn analyze_accepts_repeated_project_flags_and_fails_gracefully_on_a_missing_path() {
    // Project roots that don't even exist are still just an argument
    // parse success followed by a runtime failure, not a panic.
    bin()
        .args([
            "analyze",
            "-p",
            "/nonexistent/path/for/optee-taint-tests-a",
            "-p",
            "/nonexistent/path/for/optee-taint-tests-b",
        ])
        .env_remove("OPTEE_TAINT_API_KEY")
        .assert()
        .failure();
}
