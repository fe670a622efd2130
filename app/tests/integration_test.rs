use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use corvid_lang_ast::{ExprKind, Program, ProgramBuilder, StmtKind};
use tempfile::TempDir;

fn cvc_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("cvc");
    cmd.env("CORVID_COLORIZE", "never").env("NO_COLOR", "1");
    cmd
}

fn write_program(dir: &TempDir, name: &str, prg: &Program) -> PathBuf {
    let path = dir.path().join(name);
    let json = serde_json::to_string_pretty(prg).unwrap();
    fs::write(&path, json).unwrap();
    path
}

/// `function greet() {}` called once from the top level.
fn greeting_program() -> Program {
    let mut b = ProgramBuilder::new();
    let greet = b.function("greet", None);
    b.body(greet, vec![]);
    b.top_level(StmtKind::Function { decl: greet });
    let call = b.call_fn(greet, vec![], vec![]);
    let stmt = b.expr_stmt(call);
    b.push_top_level(stmt);
    b.finish()
}

fn unsupported_program() -> Program {
    let mut b = ProgramBuilder::new();
    let string = b.string();
    let one = b.num(1.0);
    let bad = b.expr(ExprKind::TypeOf { expr: one }, string);
    let stmt = b.expr_stmt(bad);
    b.push_top_level(stmt);
    b.finish()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Check that "cvc --version" works correctly
#[test]
fn version_command() {
    let assert = cvc_cmd().arg("--version").assert();
    assert.success().stdout("corvid 0.1.0\n");
}

/// Check that "cvc check" accepts a valid program
#[test]
fn check_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, "greet.json", &greeting_program());
    let output = cvc_cmd().args(["check", &path_arg(&path)]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, format!("{} compiled successfully!\n", path.display()));
}

/// Check that "cvc check" fails with the diagnostic code on stderr
#[test]
fn check_command_reports_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, "bad.json", &unsupported_program());
    let output = cvc_cmd().args(["check", &path_arg(&path)]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E9202"), "{stderr}");
    assert!(stderr.contains("typeof not supported"), "{stderr}");
}

/// Check that "cvc compile" prints the IR of the reachable procedures
#[test]
fn compile_command() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, "greet.json", &greeting_program());
    let output = cvc_cmd().args(["compile", &path_arg(&path)]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("proc _main"), "{stdout}");
    assert!(stdout.contains("proc _greet__P"), "{stdout}");
}

/// Check that "cvc compile --output" writes the IR to a file
#[test]
fn compile_command_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, "greet.json", &greeting_program());
    let out = dir.path().join("greet.ir");
    cvc_cmd().args(["compile", &path_arg(&path), "--output", &path_arg(&out)]).assert().success();
    let ir = fs::read_to_string(&out).unwrap();
    assert!(ir.contains("call _greet__P"), "{ir}");
}

/// Check that "cvc compile --used-symbols" lists the reached declarations
#[test]
fn compile_command_used_symbols() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, "greet.json", &greeting_program());
    let output = cvc_cmd().args(["compile", &path_arg(&path), "--used-symbols"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("; used greet"), "{stdout}");
}

/// Check that a target description is read from TOML
#[test]
fn compile_command_with_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, "greet.json", &greeting_program());
    let target = dir.path().join("target.toml");
    fs::write(&target, "tagged_ints = false\nref_counting = false\nis_native = false\n").unwrap();
    cvc_cmd().args(["compile", &path_arg(&path), "--target", &path_arg(&target)]).assert().success();
}

/// Check that an inconsistent target description is rejected
#[test]
fn compile_command_with_invalid_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_program(&dir, "greet.json", &greeting_program());
    let target = dir.path().join("target.toml");
    fs::write(&target, "tagged_ints = false\nbox_debug = true\n").unwrap();
    let output =
        cvc_cmd().args(["compile", &path_arg(&path), "--target", &path_arg(&target)]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("box_debug requires tagged_ints"), "{stderr}");
}

/// Check that a missing program is reported
#[test]
fn compile_command_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let output = cvc_cmd().args(["compile", &path_arg(&missing)]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Could not read"), "{stderr}");
}
