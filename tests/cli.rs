use std::path::{Path, PathBuf};
use std::process::Output;

use assert_cmd::Command;

const DATA: &str = "./tests/data/";

/// Expectations embedded in a script as trailing comments.
#[derive(Default)]
struct Expects {
    stdout: Vec<String>,
    error: Option<String>,
    runtime_error: Option<String>,
}

fn find_expects(filename: &Path) -> Expects {
    let content = std::fs::read_to_string(filename)
        .unwrap_or_else(|_| panic!("failed to read {}", filename.display()));

    let mut expects = Expects::default();

    for line in content.lines() {
        if let Some((_, rest)) = line.split_once("// expect: ") {
            expects.stdout.push(rest.to_string());
        } else if let Some((_, rest)) = line.split_once("// expect runtime error: ") {
            expects.runtime_error = Some(rest.to_string());
        } else if let Some((_, rest)) = line.split_once("// expect error: ") {
            expects.error = Some(rest.to_string());
        }
    }

    expects
}

fn treelox() -> Command {
    Command::cargo_bin("treelox").unwrap()
}

fn run_file(filename: &Path) -> Output {
    treelox().arg("run").arg(filename).output().unwrap()
}

fn scripts() -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(DATA)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "lox"))
        .collect();

    files.sort();
    files
}

#[test]
fn run_all_files() {
    let files = scripts();
    assert!(!files.is_empty(), "no scripts under {}", DATA);

    for filename in files {
        print!("{} ... ", filename.display());

        let expects = find_expects(&filename);
        let output = run_file(&filename);

        let stdout = String::from_utf8(output.stdout).unwrap();
        let stdout = stdout.trim_end();

        let stderr = String::from_utf8(output.stderr).unwrap();
        let stderr = stderr.trim_end();

        assert_eq!(
            expects.stdout.join("\n"),
            stdout,
            "stdout={}, stderr={}",
            stdout,
            stderr
        );

        let expected_code = match (&expects.error, &expects.runtime_error) {
            (Some(message), _) => {
                assert!(stderr.contains(message.as_str()), "stderr={}", stderr);
                65
            }
            (None, Some(message)) => {
                assert!(stderr.contains(message.as_str()), "stderr={}", stderr);
                70
            }
            (None, None) => {
                assert!(stderr.is_empty(), "stderr={}", stderr);
                0
            }
        };

        assert_eq!(output.status.code(), Some(expected_code));

        println!("OK");
    }
}

#[test]
fn runtime_error_reports_its_line() {
    let output = run_file(Path::new("./tests/data/divide_by_zero.lox"));
    let stderr = String::from_utf8(output.stderr).unwrap();

    assert_eq!(
        stderr.trim_end(),
        "[line 2] Error: Attempted to divide by zero."
    );
}

#[test]
fn tokenize_prints_one_token_per_line() {
    let output = treelox()
        .args(["tokenize", "./tests/data/values.lox"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut lines = stdout.lines();

    assert_eq!(lines.next(), Some("PRINT print null"));
    assert_eq!(lines.next(), Some("STRING \"1\" 1"));
    assert_eq!(lines.next(), Some("PLUS + null"));
    assert_eq!(lines.next(), Some("NUMBER 1 1.0"));
    assert_eq!(stdout.lines().last(), Some("EOF  null"));
}

#[test]
fn tokenize_json_is_an_array() {
    let output = treelox()
        .args(["tokenize", "--json", "./tests/data/loops.lox"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let tokens: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let tokens = tokens.as_array().unwrap();

    assert_eq!(tokens[0]["token_type"], "FOR");
    assert_eq!(tokens.last().unwrap()["token_type"], "EOF");
}

#[test]
fn parse_prints_the_tree() {
    let output = treelox()
        .args(["parse", "./tests/data/closures.lox"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("(fun counter () (var i 0.0) (fun inc ()"));
}

#[test]
fn parse_json_includes_resolved_depths() {
    let output = treelox()
        .args(["parse", "--json", "./tests/data/closures.lox"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let tree: serde_json::Value = serde_json::from_str(&stdout).unwrap();

    assert!(tree.is_array());
    assert!(stdout.contains("\"Local\": 1"));
    assert!(stdout.contains("\"Global\""));
}

#[test]
fn parse_rejects_resolver_errors() {
    let output = treelox()
        .args(["parse", "./tests/data/own_initializer.lox"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(65));
}

#[test]
fn repl_keeps_state_and_survives_errors() {
    let output = treelox()
        .arg("run")
        .write_stdin("var a = 1;\nprint a + ;\nvar a = a + 1;\nprint a;\nexit\nprint 99;\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let stderr = String::from_utf8(output.stderr).unwrap();

    assert!(stdout.contains("2"));
    assert!(!stdout.contains("99"));
    assert!(stderr.contains("Expected expression."));
}

#[test]
fn missing_file_fails() {
    treelox()
        .args(["run", "./tests/data/does_not_exist.lox"])
        .assert()
        .failure();
}
