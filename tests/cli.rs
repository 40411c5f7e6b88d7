//! End-to-end tests driving the `ragbox` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ragbox_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ragbox"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha\n\nThe alpha document describes the Rust build system, cargo and crates.",
    )
    .unwrap();
    fs::write(
        files_dir.join("beta.txt"),
        "The beta document covers deployment: containers, health checks and rollbacks.",
    )
    .unwrap();
    fs::write(files_dir.join("empty.pdf"), b"").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("ragbox.toml");
    fs::write(
        &config_path,
        format!(
            r#"[store]
path = "{}"

[uploads]
dir = "{}"

[embedding]
providers = ["hash"]

[retrieval]
default_collection = "docs"
default_k = 3
"#,
            root.join("index").display(),
            root.join("uploads").display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run_ragbox(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ragbox_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ragbox binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file_arg(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ragbox(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("index").join("index.sqlite").exists());
    assert!(tmp.path().join("uploads").is_dir());

    let (_, stderr, success) = run_ragbox(&config_path, &["init"]);
    assert!(success, "second init failed: {}", stderr);
}

#[test]
fn test_ingest_then_query() {
    let (tmp, config_path) = setup_test_env();
    let alpha = file_arg(&tmp, "alpha.md");
    let beta = file_arg(&tmp, "beta.txt");

    let (stdout, stderr, success) = run_ragbox(&config_path, &["ingest", &alpha, &beta]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ingest alpha.md"));
    assert!(stdout.contains("ingest beta.txt"));
    assert!(stdout.contains("collection: docs"));
    assert!(stdout.contains("chunks: 1"));
    assert!(stdout.trim_end().ends_with("ok"));

    let (stdout, stderr, success) = run_ragbox(
        &config_path,
        &["query", "deployment containers health checks", "-k", "1"],
    );
    assert!(success, "query failed: {}", stderr);
    assert!(stdout.contains("1. ["));
    assert!(stdout.contains("beta.txt #0"));
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_recent_shows_last_document() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_ragbox(&config_path, &["recent"]);
    assert!(success);
    assert!(stdout.contains("No documents."));

    run_ragbox(&config_path, &["ingest", &file_arg(&tmp, "alpha.md")]);
    run_ragbox(&config_path, &["ingest", &file_arg(&tmp, "beta.txt")]);

    let (stdout, stderr, success) = run_ragbox(&config_path, &["recent"]);
    assert!(success, "recent failed: {}", stderr);
    assert!(stdout.contains("[beta.txt #0]"));
    assert!(!stdout.contains("alpha.md"));
}

#[test]
fn test_declared_name_and_collection() {
    let (tmp, config_path) = setup_test_env();
    let beta = file_arg(&tmp, "beta.txt");

    let (stdout, stderr, success) = run_ragbox(
        &config_path,
        &["ingest", &beta, "--name", "ops notes.md", "--collection", "ops"],
    );
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("ingest ops notes.md"));
    assert!(stdout.contains("collection: ops"));

    let (stdout, _, _) = run_ragbox(&config_path, &["recent", "--collection", "ops"]);
    assert!(stdout.contains("ops notes.md #0"));

    let (stdout, _, _) = run_ragbox(&config_path, &["recent"]);
    assert!(stdout.contains("No documents."));
}

#[test]
fn test_name_with_multiple_files_fails() {
    let (tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_ragbox(
        &config_path,
        &[
            "ingest",
            &file_arg(&tmp, "alpha.md"),
            &file_arg(&tmp, "beta.txt"),
            "--name",
            "x.md",
        ],
    );
    assert!(!success);
    assert!(stderr.contains("--name"));
}

#[test]
fn test_empty_file_is_rejected() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) =
        run_ragbox(&config_path, &["ingest", &file_arg(&tmp, "empty.pdf")]);
    assert!(!success, "empty file should fail: stdout={}", stdout);
    assert!(stderr.contains("empty"), "stderr: {}", stderr);

    let (stdout, _, _) = run_ragbox(&config_path, &["uploads"]);
    assert!(stdout.contains("No uploads."));
}

#[test]
fn test_uploads_lists_staged_files() {
    let (tmp, config_path) = setup_test_env();
    run_ragbox(&config_path, &["ingest", &file_arg(&tmp, "alpha.md")]);

    let (stdout, stderr, success) = run_ragbox(&config_path, &["uploads"]);
    assert!(success, "uploads failed: {}", stderr);
    assert!(stdout.contains("_alpha.md"));
}

fn saved_as(ingest_stdout: &str) -> String {
    ingest_stdout
        .lines()
        .find_map(|line| line.trim().strip_prefix("saved as: "))
        .expect("ingest report has a saved-as line")
        .to_string()
}

#[test]
fn test_uploads_get_returns_staged_bytes() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, _, success) =
        run_ragbox(&config_path, &["ingest", &file_arg(&tmp, "beta.txt")]);
    assert!(success);
    let name = saved_as(&stdout);

    let (stdout, stderr, success) = run_ragbox(&config_path, &["uploads", "get", &name]);
    assert!(success, "uploads get failed: {}", stderr);
    assert_eq!(
        stdout,
        fs::read_to_string(tmp.path().join("files").join("beta.txt")).unwrap()
    );

    let out = tmp.path().join("copy.txt");
    let out_arg = out.display().to_string();
    let (stdout, _, success) =
        run_ragbox(&config_path, &["uploads", "get", &name, "--output", &out_arg]);
    assert!(success);
    assert!(stdout.contains("wrote"));
    assert_eq!(
        fs::read(&out).unwrap(),
        fs::read(tmp.path().join("files").join("beta.txt")).unwrap()
    );
}

#[test]
fn test_uploads_get_cannot_leave_sandbox() {
    let (tmp, config_path) = setup_test_env();
    run_ragbox(&config_path, &["ingest", &file_arg(&tmp, "alpha.md")]);
    fs::write(tmp.path().join("secret.txt"), "outside the sandbox").unwrap();

    let (stdout, stderr, success) =
        run_ragbox(&config_path, &["uploads", "get", "../secret.txt"]);
    assert!(!success);
    assert!(!stdout.contains("outside the sandbox"));
    assert!(stderr.contains("upload not found"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_without_chunks_is_not_ok() {
    let (tmp, config_path) = setup_test_env();
    fs::write(tmp.path().join("files").join("tiny.txt"), "too short").unwrap();

    let (stdout, stderr, success) =
        run_ragbox(&config_path, &["ingest", &file_arg(&tmp, "tiny.txt")]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("chunks: 0"));
    assert!(stdout.contains("diagnostic:"));
    assert!(stdout.contains("total chunks: 0"));
    assert!(stdout.trim_end().ends_with("nothing indexed"));

    let (stdout, _, _) = run_ragbox(
        &config_path,
        &["ingest", &file_arg(&tmp, "tiny.txt"), &file_arg(&tmp, "alpha.md")],
    );
    assert!(stdout.contains("total chunks: 1"));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_query_blank_text_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_ragbox(&config_path, &["query", "   "]);
    assert!(!success);
}

#[test]
fn test_diag_reports_engines_and_provider() {
    let (tmp, config_path) = setup_test_env();
    run_ragbox(&config_path, &["ingest", &file_arg(&tmp, "alpha.md")]);

    let (stdout, stderr, success) = run_ragbox(&config_path, &["diag"]);
    assert!(success, "diag failed: {}", stderr);
    assert!(stdout.contains("extraction engines:"));
    assert!(stdout.contains("docx-xml"));
    assert!(stdout.contains("active: hash"));
    assert!(stdout.contains("docs (1 records"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_ragbox(&tmp.path().join("nope.toml"), &["diag"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
