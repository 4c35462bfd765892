//! Prompt assembly: an external collaborator, not part of the execution
//! engine core. Format is `<LOGNAME>:<cwd>:<HH:MM:SS>> `; missing
//! environment variables render as the empty string.

/// Build the current prompt string. Time is rendered in UTC rather than
/// local time, avoiding a dependency on the host's tzdata being readable
/// (see DESIGN.md).
pub fn render() -> String {
    let login = std::env::var("LOGNAME").unwrap_or_default();
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let time = current_time_hms();
    format!("{login}:{cwd}:{time}> ")
}

fn current_time_hms() -> String {
    let mut tv: libc::time_t = 0;
    unsafe {
        libc::time(&mut tv);
    }
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe {
        libc::gmtime_r(&tv, &mut tm);
    }
    format!("{:02}:{:02}:{:02}", tm.tm_hour, tm.tm_min, tm.tm_sec)
}
