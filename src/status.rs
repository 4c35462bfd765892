//! Converts a reaped wait status into the process's observable exit code.

/// Maps a raw `waitpid` status to an exit code, `128 + signal` when the
/// process was terminated by a signal rather than exiting normally, or
/// `None` for a status that is neither (e.g. `WIFSTOPPED`/`WIFCONTINUED`,
/// which the reaper classifies separately before reaching this function).
pub fn exit_code_from_wait_status(raw_status: libc::c_int) -> Option<i32> {
    if unsafe { libc::WIFEXITED(raw_status) } {
        return Some(unsafe { libc::WEXITSTATUS(raw_status) });
    }

    if unsafe { libc::WIFSIGNALED(raw_status) } {
        let signal = unsafe { libc::WTERMSIG(raw_status) };
        return Some(128 + signal);
    }

    None
}
