//! Built-in dispatcher: commands that must run in the shell's own address
//! space because they mutate shell state. This list is closed to exactly
//! `{exit, cd, jobs, fg, bg}` -- anything else with one of these names runs
//! as an ordinary external program.

use crate::error::ShellError;
use crate::job_control;
use crate::jobs::{JobState, JobTable};
use crate::launcher;

const BUILTINS: &[&str] = &["exit", "cd", "jobs", "fg", "bg"];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Dispatch one built-in by name. `args` excludes the program name itself.
pub fn execute(program: &str, args: &[String], job_table: &mut JobTable) -> i32 {
    match program {
        "exit" => builtin_exit(),
        "cd" => builtin_cd(args),
        "jobs" => builtin_jobs(job_table),
        "fg" => builtin_fg(args, job_table),
        "bg" => builtin_bg(args, job_table),
        _ => unreachable!("execute called with non-builtin {program:?}"),
    }
}

fn builtin_exit() -> ! {
    std::process::exit(0)
}

/// `cd [path]`: missing argument uses `$HOME` (empty `$HOME` is treated as
/// the empty string). Errors map to the exact messages the original program
/// printed.
fn builtin_cd(args: &[String]) -> i32 {
    let target = match args.first() {
        Some(path) => path.clone(),
        None => std::env::var("HOME").unwrap_or_default(),
    };

    match std::env::set_current_dir(&target) {
        Ok(()) => 0,
        Err(e) => {
            match e.raw_os_error() {
                Some(code) if code == libc::EACCES => {
                    println!("{}", ShellError::Builtin("cd: Permission denied.".to_string()))
                }
                Some(code) if code == libc::ENOENT => println!(
                    "{}",
                    ShellError::Builtin("cd: No such directory.".to_string())
                ),
                _ => crate::error::unix_error("chdir", &e),
            }
            1
        }
    }
}

fn builtin_jobs(job_table: &JobTable) -> i32 {
    for job in job_table.jobs_sorted() {
        println!("{}", job.format_line());
    }
    0
}

/// Parse a `%jid` argument; defaults to jid 1 when absent.
/// Returns `Err` with a user-facing job-id syntax error for a malformed
/// argument (spec.md §7's "unknown job id" user syntax error).
fn parse_target_jid(args: &[String]) -> Result<u32, ShellError> {
    match args.first() {
        None => Ok(1),
        Some(arg) => {
            let digits = arg.strip_prefix('%').ok_or_else(|| {
                ShellError::Syntax(format!(
                    "qsh: {arg}: argument must be a job id of the form %N"
                ))
            })?;
            digits
                .parse::<u32>()
                .map_err(|_| ShellError::Syntax(format!("qsh: {arg}: no such job")))
        }
    }
}

fn builtin_fg(args: &[String], job_table: &mut JobTable) -> i32 {
    let jid = match parse_target_jid(args) {
        Ok(jid) => jid,
        Err(e) => {
            println!("{e}");
            return 1;
        }
    };

    let Some(job) = job_table.find_by_jid(jid) else {
        println!("qsh: fg: no such job");
        return 1;
    };
    let leader_pid = job.leader_pid;

    job_table.set_state(jid, JobState::Foreground);
    if let Err(e) = job_control::send_continue_to_group(leader_pid) {
        crate::error::unix_error("kill", &e);
    }
    launcher::wait_foreground_job(leader_pid, job_table);
    0
}

fn builtin_bg(args: &[String], job_table: &mut JobTable) -> i32 {
    let jid = match parse_target_jid(args) {
        Ok(jid) => jid,
        Err(e) => {
            println!("{e}");
            return 1;
        }
    };

    let Some(job) = job_table.find_by_jid(jid) else {
        println!("qsh: bg: no such job");
        return 1;
    };

    if job.state == JobState::Background {
        println!("Job already in background.");
        return 0;
    }

    let leader_pid = job.leader_pid;
    println!("{}", job.format_line_with("Continued"));
    job_table.set_state(jid, JobState::Background);
    if let Err(e) = job_control::send_continue_to_group(leader_pid) {
        crate::error::unix_error("kill", &e);
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_list_is_closed_set() {
        assert!(is_builtin("cd"));
        assert!(is_builtin("fg"));
        assert!(!is_builtin("pwd"));
        assert!(!is_builtin("echo"));
    }

    #[test]
    fn fg_defaults_to_job_one() {
        assert_eq!(parse_target_jid(&[]).unwrap(), 1);
    }

    #[test]
    fn fg_parses_percent_jid() {
        assert_eq!(parse_target_jid(&["%3".to_string()]).unwrap(), 3);
    }

    #[test]
    fn fg_rejects_jid_without_percent() {
        assert!(parse_target_jid(&["3".to_string()]).is_err());
    }

    #[test]
    fn jobs_prints_nothing_when_empty() {
        let table = JobTable::new();
        assert_eq!(builtin_jobs(&table), 0);
    }

    #[test]
    fn bg_reports_already_background() {
        let mut table = JobTable::new();
        table.add(123, &[123], JobState::Background, "sleep 5".into());
        // Can't actually signal pid 123 in a unit test; exercise the
        // already-background short-circuit which returns before signaling.
        assert_eq!(builtin_bg(&[], &mut table), 0);
    }
}
