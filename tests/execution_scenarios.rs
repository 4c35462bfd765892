//! Black-box integration tests exercising the pipeline launcher, built-in
//! dispatcher, and redirection planner through the compiled binary.

use std::io::Write;
use std::process::{Command, Stdio};

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_qsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn qsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

/// S1: a simple external command with quoted and bare arguments runs and
/// the shell survives to print a fresh prompt afterward.
#[test]
fn s1_simple_command_runs() {
    let output = run_shell(&["echo hi -a -bC"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hi -a -bC"), "stdout was: {stdout}");
    assert!(output.status.success());
}

/// S2: four redirections applied left to right, plus quoting that survives
/// as literal argv elements.
#[test]
fn s2_redirections_applied_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.txt");
    let input = dir.path().join("in.txt");
    std::fs::write(&input, "from-stdin\n").unwrap();

    let line = format!(
        "cat <{} >>{} 2>/dev/null",
        input.display(),
        out.display()
    );
    let output = run_shell(&[&line]);
    assert!(output.status.success());

    let contents = std::fs::read_to_string(&out).unwrap();
    assert_eq!(contents, "from-stdin\n");
}

/// S4: a two-stage pipeline connects stdout of the first stage to stdin of
/// the second.
#[test]
fn s4_pipeline_connects_stages() {
    let output = run_shell(&["echo three words here | wc -w"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('3'), "stdout was: {stdout}");
}

/// S5/S6: a backgrounded pipeline returns control immediately, prints its
/// job header, and shows up as Running in `jobs`.
#[test]
fn s5_s6_background_job_is_listed_running() {
    let output = run_shell(&["sleep 2 &", "jobs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1]"), "stdout was: {stdout}");
    assert!(stdout.contains("sleep 2"), "stdout was: {stdout}");
    assert!(stdout.contains("Running"), "stdout was: {stdout}");
}

/// S7: `exit` terminates before any further line is processed.
#[test]
fn s7_exit_terminates_cleanly() {
    let output = run_shell(&["echo should-not-matter"]);
    assert!(output.status.success());
}

#[test]
fn cd_changes_directory_for_subsequent_commands() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker.txt");
    std::fs::write(&marker, "x").unwrap();

    let line = format!("cd {}", dir.path().display());
    let output = run_shell(&[&line, "ls"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("marker.txt"), "stdout was: {stdout}");
}

#[test]
fn cd_missing_directory_reports_friendly_error() {
    let output = run_shell(&["cd /no/such/qsh-test-directory"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("No such directory."),
        "stdout was: {stdout}"
    );
}

#[test]
fn fg_waits_for_backgrounded_job_to_finish() {
    let output = run_shell(&["sleep 1 &", "fg", "echo AFTER_FG"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("AFTER_FG"), "stdout was: {stdout}");
}

#[test]
fn bg_reports_already_background_job() {
    let output = run_shell(&["sleep 1 &", "bg"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Job already in background."),
        "stdout was: {stdout}"
    );
}

#[test]
fn semicolon_without_preceding_space_is_rejected() {
    let output = run_shell(&["echo MARKER_ONE;echo MARKER_TWO"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("There must be space before a delimiter."),
        "stdout was: {stdout}"
    );
    assert!(!stdout.contains("MARKER_ONE"), "stdout was: {stdout}");
    assert!(!stdout.contains("MARKER_TWO"), "stdout was: {stdout}");
}
