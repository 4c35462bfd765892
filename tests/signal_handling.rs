//! Signal discipline: the shell itself must stay responsive through
//! signals that would otherwise disrupt an interactive session.
#[cfg(unix)]
use std::io::Write;
#[cfg(unix)]
use std::process::{Command, Stdio};

#[cfg(unix)]
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

#[cfg(unix)]
#[test]
fn pipeline_broken_pipe_does_not_abort_shell() {
    // `yes` writes indefinitely; `head -1` exits after one line, closing the
    // read end. `yes` receives SIGPIPE and terminates; the shell must still
    // be alive and responsive to run the next command afterward.
    let output = run_shell(&["yes | head -1", "echo ALIVE"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ALIVE"), "stdout was: {stdout}");
    assert!(output.status.success(), "shell did not exit cleanly");
}

#[cfg(unix)]
#[test]
fn shell_ignores_sigtstp_at_its_own_prompt() {
    // `sh -c 'kill -TSTP $$'` runs in its own process, so this targets the
    // external child rather than the shell; what matters is that the shell
    // keeps responding to the next line regardless.
    let output = run_shell(&["sh -c 'kill -TSTP $$' &", "echo ALIVE"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ALIVE"), "stdout was: {stdout}");
}
