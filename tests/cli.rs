mod common;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

use common::docx_bytes;

fn docqa_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docqa"))
}

/// A temp dir with a `docs/` root holding one Word file and one text file,
/// and a config using offline embeddings and no language model.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    fs::write(
        docs_dir.join("policy.docx"),
        docx_bytes(&["Member handbook", "The deductible is $500 per claim."]),
    )
    .unwrap();
    fs::write(docs_dir.join("notes.txt"), "not indexed").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("docqa.toml");
    fs::write(
        &config_path,
        format!(
            r#"[embedding]
provider = "hash"
dims = 256

[llm]
provider = "disabled"

[documents]
root = "{}"
include_globs = ["**/*.docx", "**/*.txt"]
"#,
            docs_dir.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    run_docqa_with_input(config_path, args, "")
}

fn run_docqa_with_input(config_path: &Path, args: &[&str], input: &str) -> (String, String, bool) {
    let mut child = Command::new(docqa_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run docqa binary");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_index_skips_unsupported_files() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_docqa(&config, &["index"]);
    assert!(success, "index failed: {}", stderr);
    assert!(stdout.contains("Pages loaded: 1"), "{}", stdout);
    assert!(stdout.contains("Chunks indexed: 1"), "{}", stdout);
    assert!(stdout.contains("Embedding model: hash"), "{}", stdout);
    assert!(stderr.contains("Unsupported file type"), "{}", stderr);
}

#[test]
fn test_index_counts_are_stable() {
    let (_tmp, config) = setup_test_env();
    let (first, _, _) = run_docqa(&config, &["index"]);
    let (second, _, _) = run_docqa(&config, &["index"]);
    assert_eq!(first, second);
}

#[test]
fn test_search_finds_deductible() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_docqa(&config, &["search", "deductible", "--k", "1"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.starts_with("1. ["), "{}", stdout);
    assert!(stdout.contains("policy.docx (page 1)"));
    assert!(stdout.contains("$500"));
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_docqa(&config, &["search", "  "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_batch_empty_questions() {
    let (tmp, config) = setup_test_env();
    let request = tmp.path().join("batch.json");
    fs::write(&request, r#"{"questions": []}"#).unwrap();

    let (stdout, stderr, success) = run_docqa(&config, &["batch", request.to_str().unwrap()]);
    assert!(success, "batch failed: {}", stderr);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result, serde_json::json!({ "responses": [] }));
}

#[test]
fn test_batch_from_stdin_reports_errors() {
    let (_tmp, config) = setup_test_env();

    let (stdout, _, success) =
        run_docqa_with_input(&config, &["batch"], r#"{"questions": "one"}"#);
    assert!(success);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["error"], "'questions' must be a list");

    let (stdout, _, _) = run_docqa_with_input(
        &config,
        &["batch"],
        r#"{"documents": "policy.pdf", "questions": ["q"]}"#,
    );
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["error"], "Document link must be a valid URL");

    let (stdout, _, _) = run_docqa_with_input(&config, &["batch"], "{oops");
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(result["error"].as_str().unwrap().starts_with("Invalid JSON: "));
}

#[test]
fn test_batch_question_failure_is_per_question() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) =
        run_docqa_with_input(&config, &["batch"], r#"{"questions": ["What is the deductible?"]}"#);
    assert!(success);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let answer = result["responses"][0].as_str().unwrap();
    assert!(answer.starts_with("Error: "), "{}", answer);
}

#[test]
fn test_ask_fails_when_model_disabled() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_docqa(&config, &["ask", "What is the deductible?"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "{}", stderr);
}

#[test]
fn test_chat_reports_errors_and_exits() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) =
        run_docqa_with_input(&config, &["chat"], "What is the deductible?\nexit\n");
    assert!(success);
    assert!(stdout.contains("type 'exit' or 'quit'"));
    assert!(stdout.contains("You: Error occurred: "), "{}", stdout);
}

#[test]
fn test_extra_doc_flag() {
    let (tmp, config) = setup_test_env();
    let extra = tmp.path().join("extra.docx");
    fs::write(&extra, docx_bytes(&["Dental coverage starts after six months."])).unwrap();

    let (stdout, _, success) = run_docqa(&config, &["index", "--doc", extra.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("Pages loaded: 2"), "{}", stdout);
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(&config, "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap();
    let (_, stderr, success) = run_docqa(&config, &["index"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "{}", stderr);
}
