//! CLI tests driving the compiled `gloss` binary. These stay off the
//! network: only the oracle-free paths (`segments`, `--dry-run`) and the
//! pre-flight failure paths run here.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gloss_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gloss");
    path
}

fn setup_input() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("sample.py");
    fs::write(
        &input,
        "\"\"\"Module docstring mentioning def fake(x): in prose.\"\"\"\nimport os\n\ndef add(a, b):\n    return a + b\n\ndef sub(a, b):\n    return a - b\n",
    )
    .unwrap();
    (tmp, input)
}

fn run_gloss(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(gloss_binary())
        .current_dir(dir)
        .env_remove("GPT_API_KEY")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gloss binary: {}", e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_segments_lists_functions() {
    let (tmp, input) = setup_input();
    let (stdout, stderr, success) = run_gloss(tmp.path(), &["segments", input.to_str().unwrap()]);

    assert!(success, "segments failed: {}{}", stdout, stderr);
    assert!(stdout.contains("functions: 2"));
    assert!(stdout.contains("def add(a, b):"));
    assert!(stdout.contains("def sub(a, b):"));
    // The def inside the module docstring must not be a boundary.
    assert!(!stdout.contains("def fake"));
}

#[test]
fn test_annotate_dry_run_needs_no_credential() {
    let (tmp, input) = setup_input();
    let (stdout, stderr, success) = run_gloss(
        tmp.path(),
        &["annotate", "--dry-run", input.to_str().unwrap()],
    );

    assert!(success, "dry-run failed: {}{}", stdout, stderr);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("functions: 2"));
    assert!(
        !input.with_extension("py.new").exists(),
        "dry-run must not write output"
    );
}

#[test]
fn test_annotate_without_credential_fails_preflight() {
    let (tmp, input) = setup_input();
    let (stdout, stderr, success) = run_gloss(tmp.path(), &["annotate", input.to_str().unwrap()]);

    assert!(!success);
    assert!(
        stderr.contains("GPT_API_KEY"),
        "expected credential error, got: {}{}",
        stdout,
        stderr
    );
    // Pre-flight failure means nothing was written.
    let sibling = PathBuf::from(format!("{}.new", input.display()));
    assert!(!sibling.exists());
}

#[test]
fn test_custom_credential_variable_from_config() {
    let (tmp, input) = setup_input();
    let config_path = tmp.path().join("gloss.toml");
    fs::write(
        &config_path,
        "[oracle]\napi_key_env = \"GLOSS_KEY\"\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_gloss(
        tmp.path(),
        &[
            "--config",
            config_path.to_str().unwrap(),
            "annotate",
            input.to_str().unwrap(),
        ],
    );

    assert!(!success);
    assert!(
        stderr.contains("GLOSS_KEY"),
        "expected GLOSS_KEY error, got: {}{}",
        stdout,
        stderr
    );
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, input) = setup_input();
    let config_path = tmp.path().join("gloss.toml");
    fs::write(&config_path, "[annotate]\nstyle = \"prose\"\n").unwrap();

    let (_, stderr, success) = run_gloss(
        tmp.path(),
        &[
            "--config",
            config_path.to_str().unwrap(),
            "segments",
            input.to_str().unwrap(),
        ],
    );

    assert!(!success);
    assert!(stderr.contains("style"));
}

#[test]
fn test_invalid_style_flag_rejected() {
    let (tmp, input) = setup_input();
    let (_, stderr, success) = run_gloss(
        tmp.path(),
        &["annotate", "--style", "prose", input.to_str().unwrap()],
    );

    assert!(!success);
    assert!(stderr.contains("style"));
}

#[test]
fn test_top_level_only_folds_methods() {
    let (tmp, _) = setup_input();
    let input = tmp.path().join("klass.py");
    fs::write(
        &input,
        "class Greeter:\n    def hello(self):\n        return \"hi\"\n\ndef main():\n    print(Greeter().hello())\n",
    )
    .unwrap();
    let config_path = tmp.path().join("gloss.toml");
    fs::write(&config_path, "[annotate]\ntop_level_only = true\n").unwrap();

    let (stdout, stderr, success) = run_gloss(
        tmp.path(),
        &[
            "--config",
            config_path.to_str().unwrap(),
            "segments",
            input.to_str().unwrap(),
        ],
    );

    assert!(success, "segments failed: {}{}", stdout, stderr);
    assert!(stdout.contains("functions: 1"));
    assert!(stdout.contains("def main():"));
    assert!(!stdout.contains("def hello"));
}
