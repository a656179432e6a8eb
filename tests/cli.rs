use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn nscript_eval_prints_the_result() {
    let mut cmd = Command::cargo_bin("nscript").expect("binary exists");
    cmd.arg("eval").arg("1 + 2");
    cmd.assert().success().stdout(predicate::str::contains("3"));
}

#[test]
fn nscript_eval_of_empty_result_prints_nothing() {
    let mut cmd = Command::cargo_bin("nscript").expect("binary exists");
    cmd.arg("eval").arg("x = empty");
    cmd.assert().success().stdout(predicate::str::is_empty());
}

#[test]
fn nscript_run_executes_a_script_file() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("sum.ns");
    fs::write(&script, "s = 0; for (i = 1; i <= 4; i++) s = s + i; s").expect("write script");

    let mut cmd = Command::cargo_bin("nscript").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert().success().stdout(predicate::str::contains("10"));
}

#[test]
fn nscript_reports_diagnostics_with_a_caret() {
    let mut cmd = Command::cargo_bin("nscript").expect("binary exists");
    cmd.arg("eval").arg("(1, 2");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("missing character"))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn nscript_loop_limit_flag_is_enforced() {
    let mut cmd = Command::cargo_bin("nscript").expect("binary exists");
    cmd.arg("--loop-limit").arg("100").arg("eval").arg("for (; 1;) 1");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("too many iterations"));
}
