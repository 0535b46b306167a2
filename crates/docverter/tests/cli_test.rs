//! End-to-end tests running the docverter binary.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn docverter(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_docverter"))
        .env("DOCVERTER_CONFIG_DIR", config_dir)
        .args(args)
        .output()
        .expect("failed to run docverter")
}

#[test]
fn test_convert_text_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("hello.txt");
    std::fs::write(&file, "Hello from the command line").unwrap();

    let output = docverter(dir.path(), &["convert", file.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "Hello from the command line");
}

#[test]
fn test_convert_json_output() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("hello.txt");
    std::fs::write(&file, "one two three").unwrap();

    let output = docverter(
        dir.path(),
        &["--format", "json", "convert", file.to_str().unwrap()],
    );
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["provider"], "standard");
    assert_eq!(json["text"], "one two three");
    assert_eq!(json["metadata"]["word_count"], 3);
}

#[test]
fn test_convert_writes_output_file() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("page.html");
    std::fs::write(&file, "<html><body><p>Body text</p></body></html>").unwrap();
    let target = dir.path().join("page.txt");

    let output = docverter(
        dir.path(),
        &[
            "convert",
            file.to_str().unwrap(),
            "--output",
            target.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());
    assert!(std::fs::read_to_string(&target).unwrap().contains("Body text"));
}

#[test]
fn test_convert_missing_file_fails() {
    let dir = tempdir().unwrap();
    let output = docverter(dir.path(), &["convert", "/definitely/missing.pdf"]);
    assert!(!output.status.success());
}

#[test]
fn test_unsupported_file_fails() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("blob.bin");
    std::fs::write(&file, [0u8, 1, 2]).unwrap();

    let output = docverter(dir.path(), &["convert", file.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported file type"));
}

#[test]
fn test_providers_json() {
    let dir = tempdir().unwrap();
    let output = docverter(dir.path(), &["--format", "json", "providers"]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["advanced", "standard"]);
}

#[test]
fn test_config_uses_config_dir() {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[converter]\ndefault_provider = \"advanced\"\n",
    )
    .unwrap();

    let output = docverter(dir.path(), &["config", "path"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("config.toml"));

    let output = docverter(dir.path(), &["--format", "json", "config", "show"]);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["converter"]["default_provider"], "advanced");
    assert_eq!(json["logging"]["level"], "info");
}

#[test]
fn test_config_init_is_valid_toml() {
    let dir = tempdir().unwrap();
    let output = docverter(dir.path(), &["config", "init"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[converter]"));
    assert!(stdout.contains("[logging]"));
}
