//! Low-level POSIX process-group, terminal, and wait primitives used by the
//! pipeline launcher and the reaper. Kept as thin, retrying wrappers around
//! `libc` calls.

use std::io;

use crate::jobs::ChildEvent;

pub(crate) enum WaitOutcome {
    Exited(i32),
    Stopped,
}

pub(crate) fn set_process_group(pid: libc::pid_t, pgid: libc::pid_t) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid, pgid) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            // Already exec'd or gone; caller can proceed with best-effort behavior.
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

pub(crate) fn send_continue_to_group(pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    loop {
        let rc = unsafe { libc::kill(-pgid, libc::SIGCONT) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// RAII guard: transfers the controlling terminal to `target_pgid` on
/// construction, restores the shell's own pgid on drop. This transfer could
/// equally be assigned to the forked child; it is done here in the parent
/// instead (see DESIGN.md) since `tcsetpgrp`'s effect depends only on the
/// process group, not on which process issues the call.
pub(crate) struct ForegroundTerminalGuard {
    tty_fd: Option<libc::c_int>,
    shell_pgid: libc::pid_t,
}

impl ForegroundTerminalGuard {
    pub(crate) fn new(target_pgid: libc::pid_t) -> io::Result<Self> {
        // spec.md §5: the transfer must tolerate a redirected stdin (or
        // stdout/stderr) -- try stdin, then stdout, then stderr, and use
        // the first of the three that is actually the controlling tty.
        let tty_fd = [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO]
            .into_iter()
            .find(|&fd| unsafe { libc::isatty(fd) } == 1);

        let shell_pgid = unsafe { libc::getpgrp() };
        let guard = Self { tty_fd, shell_pgid };

        if let Some(fd) = guard.tty_fd {
            set_terminal_foreground(fd, target_pgid)?;
        }

        Ok(guard)
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.tty_fd {
            let _ = set_terminal_foreground(fd, self.shell_pgid);
        }
    }
}

pub(crate) fn wait_for_pid(pid: libc::pid_t) -> io::Result<WaitOutcome> {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, libc::WUNTRACED) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }

        if unsafe { libc::WIFSTOPPED(raw_status) } {
            return Ok(WaitOutcome::Stopped);
        }

        if let Some(code) = crate::status::exit_code_from_wait_status(raw_status) {
            return Ok(WaitOutcome::Exited(code));
        }
    }
}

/// One non-blocking reap attempt across all of the shell's children, used by
/// the reaper. Returns `None` once there is nothing left to report.
pub(crate) fn try_reap_any() -> Option<(libc::pid_t, ChildEvent)> {
    let mut raw_status: libc::c_int = 0;
    loop {
        let pid = unsafe {
            libc::waitpid(
                -1,
                &mut raw_status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };

        if pid == 0 || (pid < 0 && io::Error::last_os_error().raw_os_error() == Some(libc::ECHILD))
        {
            return None;
        }
        if pid < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return None;
        }

        if unsafe { libc::WIFSTOPPED(raw_status) } {
            return Some((pid, ChildEvent::Stopped));
        }
        if unsafe { libc::WIFCONTINUED(raw_status) } {
            return Some((pid, ChildEvent::Continued));
        }
        if unsafe { libc::WIFEXITED(raw_status) } {
            return Some((pid, ChildEvent::Exited(unsafe { libc::WEXITSTATUS(raw_status) })));
        }
        if unsafe { libc::WIFSIGNALED(raw_status) } {
            return Some((pid, ChildEvent::Signaled(unsafe { libc::WTERMSIG(raw_status) })));
        }
        // Shouldn't happen, but don't spin forever on an unrecognized status.
        return None;
    }
}

struct SignalIgnoreGuard {
    signal: libc::c_int,
    previous: libc::sighandler_t,
}

impl SignalIgnoreGuard {
    fn ignore(signal: libc::c_int) -> io::Result<Self> {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { signal, previous })
    }
}

impl Drop for SignalIgnoreGuard {
    fn drop(&mut self) {
        unsafe {
            libc::signal(self.signal, self.previous);
        }
    }
}

fn set_terminal_foreground(fd: libc::c_int, pgid: libc::pid_t) -> io::Result<()> {
    if pgid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    let _sigttou = SignalIgnoreGuard::ignore(libc::SIGTTOU)?;
    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}
