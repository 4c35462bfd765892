//! Pipeline launcher: forks the processes of one [`Pipeline`], wires
//! their descriptors through pipes, assigns a process group, transfers the
//! controlling terminal, and registers the result with the job table.

use std::os::unix::process::CommandExt;
use std::process::{Child, Command};

use crate::builtins;
use crate::job_control::{self, ForegroundTerminalGuard};
use crate::jobs::{JobState, JobTable};
use crate::redirect::{self, IoResolution};
use crate::types::Pipeline;

/// Run one parsed pipeline to completion (if foreground) or register it as a
/// background job and return immediately. Returns the exit code used as the
/// REPL's running "last status" (not otherwise observable, since variable
/// substitution including `$?` is out of scope).
pub fn launch(pipeline: &Pipeline, job_table: &mut JobTable) -> i32 {
    if pipeline.commands.len() == 1 && builtins::is_builtin(pipeline.commands[0].program()) {
        return run_builtin_pipeline(pipeline, job_table);
    }

    run_external_pipeline(pipeline, job_table)
}

fn run_builtin_pipeline(pipeline: &Pipeline, job_table: &mut JobTable) -> i32 {
    let cmd = &pipeline.commands[0];
    let guard = match redirect::apply_to_current_process(&cmd.redirections) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    let code = builtins::execute(cmd.program(), &cmd.argv[1..], job_table);
    drop(guard);
    code
}

/// One stage's fully-resolved pipe endpoints, before redirections are layered
/// on top in `redirect::resolve`.
struct StageIo {
    stdin: IoResolution,
    stdout: IoResolution,
}

fn base_stage_io(n: usize, pipes: &mut Vec<(os_pipe::PipeReader, os_pipe::PipeWriter)>) -> Vec<StageIo> {
    // pipes[i] connects stage i's stdout to stage i+1's stdin.
    let mut readers: Vec<Option<os_pipe::PipeReader>> = Vec::with_capacity(n.saturating_sub(1));
    let mut writers: Vec<Option<os_pipe::PipeWriter>> = Vec::with_capacity(n.saturating_sub(1));
    for (r, w) in pipes.drain(..) {
        readers.push(Some(r));
        writers.push(Some(w));
    }

    let mut stages = Vec::with_capacity(n);
    for i in 0..n {
        let stdin = if i > 0 {
            IoResolution::PipeReader(readers[i - 1].take().expect("reader taken once"))
        } else {
            IoResolution::Inherit
        };
        let stdout = if i < n.saturating_sub(1) {
            IoResolution::PipeWriter(writers[i].take().expect("writer taken once"))
        } else {
            IoResolution::Inherit
        };
        stages.push(StageIo { stdin, stdout });
    }
    stages
}

fn run_external_pipeline(pipeline: &Pipeline, job_table: &mut JobTable) -> i32 {
    let n = pipeline.commands.len();

    let mut pipes = Vec::with_capacity(n.saturating_sub(1));
    for _ in 0..n.saturating_sub(1) {
        match os_pipe::pipe() {
            Ok(pair) => pipes.push(pair),
            Err(e) => {
                eprintln!("qsh: pipe: {e}");
                return 1;
            }
        }
    }

    let stages = base_stage_io(n, &mut pipes);
    let mut children: Vec<Child> = Vec::with_capacity(n);
    let mut leader_pid: Option<i32> = None;

    for (cmd, stage) in pipeline.commands.iter().zip(stages) {
        let resolved = match redirect::resolve(
            &cmd.redirections,
            stage.stdin,
            stage.stdout,
            IoResolution::Inherit,
        ) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("{e}");
                kill_all(&mut children);
                return 1;
            }
        };

        let mut command = Command::new(cmd.program());
        command.args(&cmd.argv[1..]);
        let to_close = resolved.apply(&mut command);

        // Step 6/7: every child joins the same process group (first child
        // becomes its own leader); SIGTTIN/SIGTTOU reset to default; the
        // group is set from both sides to defeat the fork/setpgid race.
        let target_pgid = leader_pid.unwrap_or(0);
        unsafe {
            command.pre_exec(move || {
                let pid = libc::getpid();
                job_control::set_process_group(pid, if target_pgid == 0 { pid } else { target_pgid })?;
                libc::signal(libc::SIGTTIN, libc::SIG_DFL);
                libc::signal(libc::SIGTTOU, libc::SIG_DFL);
                for &fd in &to_close {
                    libc::close(fd);
                }
                Ok(())
            });
        }

        match command.spawn() {
            Ok(child) => {
                let pid = child.id() as i32;
                let pgid_target = leader_pid.unwrap_or(pid);
                let _ = job_control::set_process_group(pid, pgid_target);
                if leader_pid.is_none() {
                    leader_pid = Some(pid);
                }
                children.push(child);
            }
            Err(_) => {
                // main.c:382 reports this with printf, i.e. stdout, not perror.
                println!("{}: Command not found.", cmd.program());
                kill_all(&mut children);
                return 3;
            }
        }
    }

    let leader_pid = match leader_pid {
        Some(pid) => pid,
        None => return 0,
    };

    let member_pids: Vec<i32> = children.iter().map(|c| c.id() as i32).collect();
    // `Child` does not wait() on drop in Rust; once registered with the job
    // table the reaper becomes the sole authority reaping these pids,
    // so the `Child` handles themselves are simply discarded here.
    drop(children);

    let state = if pipeline.background {
        JobState::Background
    } else {
        JobState::Foreground
    };

    let jid = job_table
        .add(leader_pid, &member_pids, state, pipeline.text.clone())
        .unwrap_or(0);

    if pipeline.background {
        println!("[{jid}] {leader_pid} {}", pipeline.text);
        return 0;
    }

    wait_foreground_job(leader_pid, job_table);
    0
}

/// Transfer the controlling terminal to `leader_pid`'s process group, wait
/// for the job to leave the foreground (by exit, signal, or stop), and
/// transfer the terminal back. Shared by the launcher's own foreground path
/// and the `fg` built-in.
pub fn wait_foreground_job(leader_pid: i32, job_table: &mut JobTable) {
    let guard = ForegroundTerminalGuard::new(leader_pid).ok();
    crate::signals::wait_while_foreground_job_exists(job_table);
    drop(guard);
}

fn kill_all(children: &mut [Child]) {
    for child in children.iter_mut() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Every currently-open pipe fd's symlink target (e.g. `pipe:[12345]`),
    /// read from this process's own fd table.
    fn pipe_fd_targets() -> HashSet<String> {
        let mut targets = HashSet::new();
        let Ok(entries) = std::fs::read_dir("/proc/self/fd") else {
            return targets;
        };
        for entry in entries.flatten() {
            if let Ok(target) = std::fs::read_link(entry.path()) {
                let target = target.to_string_lossy().into_owned();
                if target.starts_with("pipe:") {
                    targets.insert(target);
                }
            }
        }
        targets
    }

    /// spec.md §8's property test #6: after a pipeline launch, the parent
    /// holds no pipe fds. `launch` runs in this test process directly, so
    /// it plays the shell's own "parent" role here -- every pipe end not
    /// consumed by a forked child must be closed by the time it returns.
    #[cfg(target_os = "linux")]
    #[test]
    fn parent_holds_no_pipe_fds_after_pipeline_launch() {
        let before = pipe_fd_targets();

        let pipeline = Pipeline {
            commands: vec![
                crate::types::Command {
                    argv: vec!["true".to_string()],
                    redirections: Vec::new(),
                },
                crate::types::Command {
                    argv: vec!["true".to_string()],
                    redirections: Vec::new(),
                },
            ],
            text: "true | true".to_string(),
            background: true,
        };

        let mut job_table = JobTable::new();
        launch(&pipeline, &mut job_table);

        let after = pipe_fd_targets();
        let leaked: Vec<&String> = after.difference(&before).collect();
        assert!(leaked.is_empty(), "pipeline launch leaked pipe fds: {leaked:?}");
    }
}
