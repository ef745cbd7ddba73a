use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn treelox() -> Command {
    Command::new(env!("CARGO_BIN_EXE_treelox"))
}

fn write_script(dir: &TempDir, name: &str, source: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, source).expect("write script");
    path.to_string_lossy().into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_cli_runs_a_script() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "ok.lox", "var a = 20; print a + 22;");

    let output = treelox().arg(&script).output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout(&output), "42\n");
    assert_eq!(stderr(&output), "");
}

#[test]
fn test_cli_too_many_arguments_prints_usage() {
    let output = treelox().args(["a.lox", "b.lox"]).output().unwrap();

    assert_eq!(output.status.code(), Some(64));
    assert_eq!(stdout(&output), "Usage: treelox [script]\n");
}

#[test]
fn test_cli_static_error_exits_65() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "bad.lox", "print \"never\";\nvar = 1;");

    let output = treelox().arg(&script).output().unwrap();

    assert_eq!(output.status.code(), Some(65));
    assert_eq!(stdout(&output), "");
    assert_eq!(stderr(&output), "[line 2] Error at '=': Expect variable name.\n");
}

#[test]
fn test_cli_runtime_error_exits_70() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "boom.lox", "print \"before\";\nprint 1 / 0;\nprint \"after\";");

    let output = treelox().arg(&script).output().unwrap();

    assert_eq!(output.status.code(), Some(70));
    assert_eq!(stdout(&output), "before\n");
    assert_eq!(stderr(&output), "Division by zero\n[line 2]\n");
}

#[test]
fn test_cli_missing_file_is_an_io_failure() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.lox");

    let output = treelox().arg(&missing).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("absent.lox"));
}

#[test]
fn test_cli_token_dump() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "tokens.lox", "var x = \"s\";");

    let output = treelox().arg("--tokens").arg(&script).output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout(&output),
        "VAR var null\n\
         IDENTIFIER x null\n\
         EQUAL = null\n\
         STRING \"s\" s\n\
         SEMICOLON ; null\n\
         EOF  null\n"
    );
}

#[test]
fn test_cli_token_dump_with_lex_error_exits_65() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "lex.lox", "1 # 2");

    let output = treelox().arg("--tokens").arg(&script).output().unwrap();

    assert_eq!(output.status.code(), Some(65));
    assert_eq!(stdout(&output), "NUMBER 1 1.0\nNUMBER 2 2.0\nEOF  null\n");
    assert_eq!(stderr(&output), "[line 1] Error: Unexpected character.\n");
}

#[test]
fn test_cli_token_dump_as_json() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "json.lox", "print 1.5;");

    let output = treelox()
        .args(["--tokens", "--json"])
        .arg(&script)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));

    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["token_type"], "PRINT");
    assert_eq!(lines[1]["token_type"]["NUMBER"], 1.5);
    assert_eq!(lines[1]["lexeme"], "1.5");
    assert_eq!(lines[3]["token_type"], "EOF");
    assert_eq!(lines[3]["line"], 1);
}

#[test]
fn test_cli_json_requires_tokens() {
    let output = treelox().args(["--json", "x.lox"]).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_ast_dump() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "ast.lox", "print (1 + 2) * 3;\nif (a) b();");

    let output = treelox().arg("--ast").arg(&script).output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(
        stdout(&output),
        "(print (* (group (+ 1.0 2.0)) 3.0))\n(if a (; (call b)))\n"
    );

    let broken = write_script(&dir, "broken.lox", "print (1;");
    let output = treelox().arg("--ast").arg(&broken).output().unwrap();

    assert_eq!(output.status.code(), Some(65));
    assert_eq!(stderr(&output), "[line 1] Error at ';': Expect ')' after expression.\n");
}

fn run_repl(dir: &Path, input: &str) -> Output {
    let mut child = treelox()
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();

    child.wait_with_output().unwrap()
}

#[test]
fn test_cli_repl_over_stdin() {
    let dir = TempDir::new().unwrap();

    let output = run_repl(dir.path(), "var a = 2;\na * 21;\n");

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).ends_with("> > 42\n> "));
}

#[test]
fn test_cli_repl_runs_file_from_lox_dir() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("lox")).unwrap();
    fs::write(dir.path().join("lox").join("demo.lox"), "print \"from file\";").unwrap();

    let output = run_repl(dir.path(), "-f demo\nprint \"unreached\";\n");

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).ends_with("> from file\n"));
}
