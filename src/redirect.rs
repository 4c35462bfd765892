//! Redirection planner: resolves a command's ordered [`Redirection`]
//! list into concrete I/O handles.
//!
//! The naive approach runs this after fork, before exec, in the child. This
//! implementation instead resolves everything in the parent, before
//! forking, building the `Stdio` handles `std::process::Command`
//! installs in the child -- see DESIGN.md for why (`Command::pre_exec`
//! closures run *before* the library's own stdio wiring, so a `dup2` issued
//! from `pre_exec` for `DUP_TO_STDOUT`/`DUP_TO_STDERR` would observe the
//! pre-redirection descriptor). Doing the resolution here, left to right,
//! with explicit tracking of the "current" stdin/stdout/stderr handle,
//! reproduces the same left-to-right semantics without that hazard.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::IntoRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::process::Stdio;

use crate::error::ShellError;
use crate::types::{Direction, RedirMode, Redirection};

const CREATE_MODE: u32 = 0o664; // rw-rw-r--

/// One descriptor slot's resolved state, before being handed to
/// `std::process::Command`.
pub enum IoResolution {
    Inherit,
    File(File),
    PipeReader(os_pipe::PipeReader),
    PipeWriter(os_pipe::PipeWriter),
    /// The descriptor must be closed in the child rather than configured;
    /// `std::process::Command` has no "closed" `Stdio` variant, so this is
    /// applied via a small `pre_exec` closure the launcher builds.
    Closed,
}

impl IoResolution {
    fn try_clone(&self) -> io::Result<IoResolution> {
        Ok(match self {
            IoResolution::Inherit => IoResolution::Inherit,
            IoResolution::File(f) => IoResolution::File(f.try_clone()?),
            IoResolution::PipeReader(r) => IoResolution::PipeReader(r.try_clone()?),
            IoResolution::PipeWriter(w) => IoResolution::PipeWriter(w.try_clone()?),
            IoResolution::Closed => IoResolution::Closed,
        })
    }

    /// Consumes the resolution, returning the `Stdio` to install, or `None`
    /// if this slot must instead be closed via `pre_exec`.
    fn into_stdio(self) -> Option<Stdio> {
        match self {
            IoResolution::Inherit => Some(Stdio::inherit()),
            IoResolution::File(f) => Some(Stdio::from(f)),
            IoResolution::PipeReader(r) => Some(Stdio::from(r)),
            IoResolution::PipeWriter(w) => Some(Stdio::from(w)),
            IoResolution::Closed => None,
        }
    }
}

/// The three descriptor slots of one command, fully resolved.
pub struct ResolvedStdio {
    pub stdin: IoResolution,
    pub stdout: IoResolution,
    pub stderr: IoResolution,
}

impl ResolvedStdio {
    /// Installs the resolved stdio onto `command` and returns the list of
    /// fixed fds (0/1/2) that must be closed via `pre_exec` because they
    /// were resolved to `Closed`.
    pub fn apply(self, command: &mut std::process::Command) -> Vec<i32> {
        let mut to_close = Vec::new();

        match self.stdin.into_stdio() {
            Some(stdio) => {
                command.stdin(stdio);
            }
            None => to_close.push(Direction::Stdin.fd()),
        }
        match self.stdout.into_stdio() {
            Some(stdio) => {
                command.stdout(stdio);
            }
            None => to_close.push(Direction::Stdout.fd()),
        }
        match self.stderr.into_stdio() {
            Some(stdio) => {
                command.stderr(stdio);
            }
            None => to_close.push(Direction::Stderr.fd()),
        }

        to_close
    }
}

fn open_target(direction: Direction, mode: RedirMode, target: &str) -> io::Result<File> {
    match direction {
        Direction::Stdin => File::open(target),
        Direction::Stdout | Direction::Stderr => OpenOptions::new()
            .write(true)
            .create(true)
            .append(mode == RedirMode::OpenAppend)
            .truncate(mode == RedirMode::OpenTruncate)
            .mode(CREATE_MODE)
            .open(target),
    }
}

/// Wraps an I/O failure in `ShellError::Io`, folding `context` into the
/// error's own message so the offending filename/operation survives past
/// the `Display` impl's plain `{e}` formatting.
fn io_failure(context: &str, e: io::Error) -> ShellError {
    ShellError::Io(io::Error::new(e.kind(), format!("qsh: {context}: {e}")))
}

/// Apply `redirections` in order, starting from the base stdin/stdout/stderr
/// a pipeline stage already has (inherited from the shell, or connected to a
/// neighboring stage's pipe). Returns a descriptive error naming the
/// offending target on the first failure: any open/dup2/close failure
/// aborts the pipeline after reporting the offending filename.
pub fn resolve(
    redirections: &[Redirection],
    mut stdin: IoResolution,
    mut stdout: IoResolution,
    mut stderr: IoResolution,
) -> Result<ResolvedStdio, ShellError> {
    for redir in redirections {
        match redir.mode {
            RedirMode::Close => match redir.direction {
                Direction::Stdin => stdin = IoResolution::Closed,
                Direction::Stdout => stdout = IoResolution::Closed,
                Direction::Stderr => stderr = IoResolution::Closed,
            },
            RedirMode::OpenTruncate | RedirMode::OpenAppend => {
                let target = redir.target.as_deref().unwrap_or("");
                let file = open_target(redir.direction, redir.mode, target)
                    .map_err(|e| io_failure(target, e))?;
                match redir.direction {
                    Direction::Stdin => stdin = IoResolution::File(file),
                    Direction::Stdout => stdout = IoResolution::File(file),
                    Direction::Stderr => stderr = IoResolution::File(file),
                }
            }
            RedirMode::DupToStdout => {
                let cloned = stdout.try_clone().map_err(|e| io_failure("dup2", e))?;
                match redir.direction {
                    Direction::Stdout => stdout = cloned,
                    Direction::Stderr => stderr = cloned,
                    Direction::Stdin => {}
                }
            }
            RedirMode::DupToStderr => {
                let cloned = stderr.try_clone().map_err(|e| io_failure("dup2", e))?;
                match redir.direction {
                    Direction::Stdout => stdout = cloned,
                    Direction::Stderr => stderr = cloned,
                    Direction::Stdin => {}
                }
            }
        }
    }

    Ok(ResolvedStdio { stdin, stdout, stderr })
}

/// Snapshot of a single fixed descriptor (0/1/2), saved via `dup` so it can
/// be restored once a built-in finishes running with redirected I/O.
struct SavedFd {
    fd: i32,
    saved: i32,
}

impl Drop for SavedFd {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.saved, self.fd);
            libc::close(self.saved);
        }
    }
}

/// RAII guard restoring the shell's own stdin/stdout/stderr on drop. Built-ins
/// run in the shell's own address space, so redirecting their I/O means
/// temporarily `dup2`-ing the shell's own fixed descriptors rather than
/// building a child's `Stdio` set -- redirections apply to a single-command
/// pipeline whether or not it dispatches to a built-in.
pub struct CurrentProcessRedirectGuard {
    _saved: Vec<SavedFd>,
}

fn dup2_onto(direction: Direction, resolution: IoResolution) -> io::Result<()> {
    let fd = direction.fd();
    match resolution {
        IoResolution::Inherit => Ok(()),
        IoResolution::Closed => {
            unsafe { libc::close(fd) };
            Ok(())
        }
        IoResolution::File(f) => {
            let src = f.into_raw_fd();
            let rc = unsafe { libc::dup2(src, fd) };
            unsafe { libc::close(src) };
            if rc < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }
        IoResolution::PipeReader(_) | IoResolution::PipeWriter(_) => {
            // Built-ins never run as one stage of a multi-command pipeline:
            // this resolution never reaches a built-in.
            Ok(())
        }
    }
}

/// Apply `redirections` directly to the shell's own stdin/stdout/stderr,
/// returning a guard that restores the originals on drop.
pub fn apply_to_current_process(
    redirections: &[Redirection],
) -> Result<CurrentProcessRedirectGuard, ShellError> {
    let resolved = resolve(
        redirections,
        IoResolution::Inherit,
        IoResolution::Inherit,
        IoResolution::Inherit,
    )?;

    let mut saved = Vec::new();
    for fd in [
        Direction::Stdin.fd(),
        Direction::Stdout.fd(),
        Direction::Stderr.fd(),
    ] {
        let dup = unsafe { libc::dup(fd) };
        if dup < 0 {
            return Err(io_failure("dup", io::Error::last_os_error()));
        }
        saved.push(SavedFd { fd, saved: dup });
    }

    dup2_onto(Direction::Stdin, resolved.stdin).map_err(|e| io_failure("dup2", e))?;
    dup2_onto(Direction::Stdout, resolved.stdout).map_err(|e| io_failure("dup2", e))?;
    dup2_onto(Direction::Stderr, resolved.stderr).map_err(|e| io_failure("dup2", e))?;

    Ok(CurrentProcessRedirectGuard { _saved: saved })
}
