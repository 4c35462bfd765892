//! Core data model: parsed commands, redirections, and pipelines.

/// Which standard descriptor a redirection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Stdin,
    Stdout,
    Stderr,
}

impl Direction {
    pub fn fd(self) -> i32 {
        match self {
            Direction::Stdin => 0,
            Direction::Stdout => 1,
            Direction::Stderr => 2,
        }
    }
}

/// How a redirection's descriptor operation should be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirMode {
    OpenTruncate,
    OpenAppend,
    Close,
    DupToStdout,
    DupToStderr,
}

/// A single redirection, as produced by the parser and consumed by the
/// redirection planner. `target` is only meaningful for the `Open*` modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub direction: Direction,
    pub mode: RedirMode,
    pub target: Option<String>,
}

/// One command in a pipeline: a program name plus arguments, and the
/// redirections that apply to it, in the order they were parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub argv: Vec<String>,
    pub redirections: Vec<Redirection>,
}

impl Command {
    pub fn program(&self) -> &str {
        self.argv[0].as_str()
    }
}

/// An ordered sequence of commands connected by pipes, plus its original
/// text (for job display) and whether it runs in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    pub text: String,
    pub background: bool,
}
