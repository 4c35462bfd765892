//! Diagnostic plumbing, ported from `error.c`'s four-function taxonomy.
//!
//! The shell has no logging framework; everything is reported by writing
//! directly to stdout or stderr, matching the source program's convention
//! (`app_fatal`/`app_error` write to stdout, `unix_error`/`unix_fatal` behave
//! like `perror`). Using one small set of helpers everywhere keeps that
//! convention consistent instead of scattering ad hoc `eprintln!` calls.

use std::io;

/// An error a caller can recover from: print it and keep the REPL running.
#[derive(Debug)]
pub enum ShellError {
    /// A parse-time or job-id syntax error; printed to stdout.
    Syntax(String),
    /// A built-in command failed in a user-facing way (e.g. `cd`).
    Builtin(String),
    /// An I/O error from a syscall the shell itself issued.
    Io(io::Error),
}

impl From<io::Error> for ShellError {
    fn from(e: io::Error) -> Self {
        ShellError::Io(e)
    }
}

impl From<String> for ShellError {
    fn from(msg: String) -> Self {
        ShellError::Syntax(msg)
    }
}

impl std::fmt::Display for ShellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShellError::Syntax(msg) | ShellError::Builtin(msg) => write!(f, "{msg}"),
            ShellError::Io(e) => write!(f, "{e}"),
        }
    }
}

/// Print `msg` to stdout and terminate with status 2 (application-fatal path).
pub fn app_fatal(msg: &str) -> ! {
    println!("{msg}");
    std::process::exit(2);
}

/// Print `msg` to stdout; the caller continues.
pub fn app_error(msg: &str) {
    println!("{msg}");
}

/// `perror`-style report to stderr; the caller continues.
pub fn unix_error(context: &str, err: &io::Error) {
    eprintln!("{context}: {err}");
}

/// `perror`-style report to stderr, then terminate with status 1.
pub fn unix_fatal(context: &str, err: &io::Error) -> ! {
    eprintln!("{context}: {err}");
    std::process::exit(1);
}
