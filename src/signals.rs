//! Signal handling and the asynchronous child reaper.
//!
//! The SIGCHLD handler itself does no more than flip an atomic flag --
//! `waitpid` and job-table mutation are not async-signal-safe operations
//! (they allocate), so the real reaping work runs on the main thread at the
//! shell's two suspension points: just before printing a prompt, and inside
//! the foreground wait's pause loop. This keeps the reaper the only
//! authoritative source of job-state transitions without doing unsafe work
//! inside the handler.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::editor::EDITOR_ACTIVE;
use crate::job_control;
use crate::jobs::JobTable;

static SIGCHLD_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigchld(_signum: libc::c_int) {
    SIGCHLD_RECEIVED.store(true, Ordering::SeqCst);
}

extern "C" fn on_sigint(_signum: libc::c_int) {
    // While the line editor holds the terminal in raw mode, ISIG is off and
    // Ctrl-C arrives there as a key event, not this signal -- it already
    // redraws the prompt itself. This handler only needs to act when SIGINT
    // arrives outside that window: the prompt line is aborted and redrawn.
    if EDITOR_ACTIVE.load(Ordering::Relaxed) {
        return;
    }
    unsafe {
        libc::write(libc::STDOUT_FILENO, b"\n".as_ptr().cast(), 1);
    }
}

extern "C" fn on_sigtstp(_signum: libc::c_int) {
    // Deliberately does nothing: installing a handler (rather than leaving
    // the default disposition) is what stops `kill -TSTP` from suspending
    // the shell itself.
}

/// Reliable wrapper over `sigaction`, named distinctly from the standard
/// library's `signal` to avoid the name collision the original program's
/// own wrapper of the same name had with the C library function.
fn install_reliable_handler(signum: libc::c_int, handler: libc::sighandler_t) -> io::Result<()> {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    action.sa_sigaction = handler;
    unsafe { libc::sigemptyset(&mut action.sa_mask) };
    action.sa_flags = if signum == libc::SIGALRM {
        0
    } else {
        libc::SA_RESTART
    };

    let rc = unsafe { libc::sigaction(signum, &action, std::ptr::null_mut()) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Install the shell's signal discipline at startup.
pub fn install() -> io::Result<()> {
    install_reliable_handler(libc::SIGINT, on_sigint as usize)?;
    install_reliable_handler(libc::SIGTSTP, on_sigtstp as usize)?;
    install_reliable_handler(libc::SIGCHLD, on_sigchld as usize)?;

    unsafe {
        libc::signal(libc::SIGTTIN, libc::SIG_IGN);
        libc::signal(libc::SIGTTOU, libc::SIG_IGN);
    }

    Ok(())
}

/// Drain every pending child-status change and apply it to the job table.
/// Safe to call unconditionally; it is a no-op when no SIGCHLD is pending.
pub fn reap(job_table: &mut JobTable) {
    if !SIGCHLD_RECEIVED.swap(false, Ordering::SeqCst) {
        return;
    }
    while let Some((pid, event)) = job_control::try_reap_any() {
        job_table.on_child_event(pid, event);
    }
}

/// Block the calling thread until `job_table.find_foreground()` is `None`,
/// reaping as events arrive. This waits on a predicate rather than calling
/// a blocking `wait()` directly, so a stop (not just an exit) also transitions
/// state correctly.
pub fn wait_while_foreground_job_exists(job_table: &mut JobTable) {
    loop {
        reap(job_table);
        if job_table.find_foreground().is_none() {
            return;
        }
        unsafe {
            libc::pause();
        }
    }
}
