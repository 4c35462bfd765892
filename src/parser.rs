//! Lexer/parser: turns one input line into a list of [`Pipeline`]s.
//!
//! Splitting happens in a fixed order: `;` first, then a trailing `&` is
//! stripped off each piece, then `|`, then each resulting segment is
//! tokenized and classified into argv elements and redirections.

use crate::error::ShellError;
use crate::types::{Command, Direction, Pipeline, RedirMode, Redirection};
use std::fs;

/// Parse one line of input into zero or more pipelines, in order.
pub fn parse_line(text: &str) -> Result<Vec<Pipeline>, ShellError> {
    let mut pipelines = Vec::new();

    for raw_segment in split_on(text, ';')? {
        let trimmed = raw_segment.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (body, background) = detect_background(trimmed);

        let mut commands = Vec::new();
        for piece in split_on(body, '|')? {
            let tokens = tokenize(&piece);
            let (argv, redirections) = classify_tokens(tokens)?;
            if argv.is_empty() && redirections.is_empty() {
                continue;
            }
            if argv.is_empty() {
                return Err(ShellError::Syntax(
                    "qsh: syntax error: empty command in pipeline".to_string(),
                ));
            }
            commands.push(Command { argv, redirections });
        }

        if commands.is_empty() {
            continue;
        }

        pipelines.push(Pipeline {
            commands,
            text: trimmed.to_string(),
            background,
        });
    }

    Ok(pipelines)
}

/// Split `text` on `delim`, rejecting a delimiter not preceded by whitespace.
fn split_on(text: &str, delim: char) -> Result<Vec<String>, String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;

    for ch in text.chars() {
        if ch == delim {
            if let Some(p) = prev {
                if !p.is_whitespace() {
                    return Err("There must be space before a delimiter.".to_string());
                }
            }
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
        prev = Some(ch);
    }
    segments.push(current);
    Ok(segments)
}

/// Detect and consume a trailing `&`, returning the remaining body and
/// whether the background flag was set.
fn detect_background(segment: &str) -> (&str, bool) {
    let trimmed = segment.trim_end();
    match trimmed.strip_suffix('&') {
        Some(body) => (body.trim_end(), true),
        None => (trimmed, false),
    }
}

/// A token as produced by the tokenizer. `literal` is true when the token's
/// first character (as typed, before quote stripping) was a quote mark --
/// such tokens are never redirection operators, tildes, or globs. Quoting
/// never escapes a redirection operator.
struct RawToken {
    text: String,
    literal: bool,
}

fn tokenize(segment: &str) -> Vec<RawToken> {
    #[derive(PartialEq)]
    enum State {
        Normal,
        Word,
        Single,
        Double,
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut literal = false;
    let mut in_token = false;
    let mut state = State::Normal;

    for ch in segment.chars() {
        match (&state, ch) {
            (State::Normal, c) if c.is_whitespace() => {}
            (State::Normal, '\'') => {
                state = State::Single;
                literal = true;
                in_token = true;
            }
            (State::Normal, '"') => {
                state = State::Double;
                literal = true;
                in_token = true;
            }
            (State::Normal, c) => {
                current.push(c);
                state = State::Word;
                literal = false;
                in_token = true;
            }

            (State::Word, c) if c.is_whitespace() => {
                tokens.push(RawToken {
                    text: std::mem::take(&mut current),
                    literal,
                });
                state = State::Normal;
                in_token = false;
                literal = false;
            }
            (State::Word, '\'') => state = State::Single,
            (State::Word, '"') => state = State::Double,
            (State::Word, c) => current.push(c),

            (State::Single, '\'') => state = State::Word,
            (State::Single, c) => current.push(c),

            (State::Double, '"') => state = State::Word,
            (State::Double, c) => current.push(c),
        }
    }

    if in_token {
        tokens.push(RawToken { text: current, literal });
    }

    tokens
}

/// Parse a single unquoted token as a redirection, if its first character
/// classifies it as one. Returns `None` for anything that should be treated
/// as a plain argv word.
fn parse_redirect_token(text: &str) -> Option<Redirection> {
    let (direction, rest) = if let Some(rest) = text.strip_prefix('<') {
        (Direction::Stdin, rest)
    } else if let Some(rest) = text.strip_prefix("1>") {
        (Direction::Stdout, rest)
    } else if let Some(rest) = text.strip_prefix("2>") {
        (Direction::Stderr, rest)
    } else if let Some(rest) = text.strip_prefix('>') {
        (Direction::Stdout, rest)
    } else {
        return None;
    };

    if direction == Direction::Stdin {
        return Some(Redirection {
            direction,
            mode: RedirMode::OpenTruncate,
            target: Some(rest.to_string()),
        });
    }

    let (append, rest) = match rest.strip_prefix('>') {
        Some(r) => (true, r),
        None => (false, rest),
    };

    Some(match rest {
        "&-" => Redirection {
            direction,
            mode: RedirMode::Close,
            target: None,
        },
        "&1" => Redirection {
            direction,
            mode: RedirMode::DupToStdout,
            target: None,
        },
        "&2" => Redirection {
            direction,
            mode: RedirMode::DupToStderr,
            target: None,
        },
        target => Redirection {
            direction,
            mode: if append {
                RedirMode::OpenAppend
            } else {
                RedirMode::OpenTruncate
            },
            target: Some(target.to_string()),
        },
    })
}

fn expand_tilde(token: &str) -> String {
    let home = std::env::var("HOME").unwrap_or_default();
    format!("{home}{}", &token[1..])
}

/// List non-dotfile entries of the current directory, in directory-iteration
/// order (not sorted); the original source's only supported glob form.
fn list_non_dotfiles() -> Result<Vec<String>, String> {
    let entries = fs::read_dir(".").map_err(|e| format!("qsh: *: {e}"))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| format!("qsh: *: {e}"))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with('.') {
            names.push(name.into_owned());
        }
    }
    Ok(names)
}

fn classify_tokens(tokens: Vec<RawToken>) -> Result<(Vec<String>, Vec<Redirection>), String> {
    let mut argv = Vec::new();
    let mut redirections = Vec::new();

    for token in tokens {
        if token.literal {
            argv.push(token.text);
            continue;
        }
        if let Some(redir) = parse_redirect_token(&token.text) {
            redirections.push(redir);
            continue;
        }
        if token.text.starts_with('~') {
            argv.push(expand_tilde(&token.text));
            continue;
        }
        if token.text == "*" {
            argv.extend(list_non_dotfiles()?);
            continue;
        }
        argv.push(token.text);
    }

    Ok((argv, redirections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, RedirMode};

    #[test]
    fn simple_command() {
        let pipelines = parse_line("ls -l  \"-a\" -bC").unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].commands.len(), 1);
        assert_eq!(
            pipelines[0].commands[0].argv,
            vec!["ls", "-l", "-a", "-bC"]
        );
        assert!(!pipelines[0].background);
    }

    #[test]
    fn scenario_s2_redirections_in_order() {
        let pipelines =
            parse_line("ls >>out.txt 2>/dev/null <in.txt 2>&- \"-a\" -bC").unwrap();
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.argv, vec!["ls", "-a", "-bC"]);
        assert_eq!(cmd.redirections.len(), 4);

        assert_eq!(cmd.redirections[0].direction, Direction::Stdout);
        assert_eq!(cmd.redirections[0].mode, RedirMode::OpenAppend);
        assert_eq!(cmd.redirections[0].target.as_deref(), Some("out.txt"));

        assert_eq!(cmd.redirections[1].direction, Direction::Stderr);
        assert_eq!(cmd.redirections[1].mode, RedirMode::OpenTruncate);
        assert_eq!(cmd.redirections[1].target.as_deref(), Some("/dev/null"));

        assert_eq!(cmd.redirections[2].direction, Direction::Stdin);
        assert_eq!(cmd.redirections[2].target.as_deref(), Some("in.txt"));

        assert_eq!(cmd.redirections[3].direction, Direction::Stderr);
        assert_eq!(cmd.redirections[3].mode, RedirMode::Close);
    }

    #[test]
    fn quoted_redirection_operator_is_literal_argv() {
        let pipelines = parse_line("echo \">file\"").unwrap();
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.argv, vec!["echo", ">file"]);
        assert!(cmd.redirections.is_empty());
    }

    #[test]
    fn malformed_redirection_has_empty_target() {
        let pipelines = parse_line("ls >").unwrap();
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.redirections[0].target.as_deref(), Some(""));
    }

    #[test]
    fn space_between_operator_and_filename_defeats_redirection() {
        // A well-known trap of this tokenizer: "> out.txt" is a malformed
        // redirection (empty target) plus a literal "out.txt" argv word.
        let pipelines = parse_line("ls > out.txt").unwrap();
        let cmd = &pipelines[0].commands[0];
        assert_eq!(cmd.argv, vec!["ls", "out.txt"]);
        assert_eq!(cmd.redirections[0].target.as_deref(), Some(""));
    }

    #[test]
    fn trailing_ampersand_sets_background() {
        let pipelines = parse_line("sleep 5 &").unwrap();
        assert!(pipelines[0].background);
        assert_eq!(pipelines[0].commands[0].argv, vec!["sleep", "5"]);
    }

    #[test]
    fn pipeline_splits_on_pipe() {
        let pipelines = parse_line("ls | wc -l").unwrap();
        assert_eq!(pipelines[0].commands.len(), 2);
        assert_eq!(pipelines[0].commands[0].argv, vec!["ls"]);
        assert_eq!(pipelines[0].commands[1].argv, vec!["wc", "-l"]);
    }

    #[test]
    fn semicolon_without_preceding_space_is_error() {
        assert!(parse_line("ls;pwd").is_err());
    }

    #[test]
    fn pipe_without_preceding_space_is_error() {
        assert!(parse_line("ls|wc").is_err());
    }

    #[test]
    fn split_function_pipe_preserves_trailing_whitespace() {
        let text = "ls -l  >>test.txt 2>/dev/null <test.txt 2>&- \"-a\" -bC |less <a.txt |sort -b";
        let segments = split_on(text, '|').unwrap();
        assert_eq!(segments.len(), 3);
        assert!(segments[0].ends_with(' '));
        assert!(segments[1].ends_with(' '));
        assert!(!segments[2].ends_with(' '));
    }

    #[test]
    fn split_function_semicolon_single_segment() {
        let segments = split_on("cat", ';').unwrap();
        assert_eq!(segments, vec!["cat".to_string()]);
    }

    #[test]
    fn single_quotes_no_escaping() {
        let pipelines = parse_line("echo 'a\\nb'").unwrap();
        assert_eq!(pipelines[0].commands[0].argv, vec!["echo", "a\\nb"]);
    }

    #[test]
    fn unterminated_quote_terminates_at_end_of_segment() {
        let pipelines = parse_line("echo \"abc").unwrap();
        assert_eq!(pipelines[0].commands[0].argv, vec!["echo", "abc"]);
    }

    #[test]
    fn empty_input_yields_no_pipelines() {
        assert_eq!(parse_line("   ").unwrap().len(), 0);
    }

    #[test]
    fn leading_tilde_expands_home() {
        unsafe { std::env::set_var("HOME", "/home/qsh") };
        let pipelines = parse_line("cd ~/work").unwrap();
        assert_eq!(pipelines[0].commands[0].argv, vec!["cd", "/home/qsh/work"]);
    }

    #[test]
    fn dup_to_stderr_and_stdout_targets() {
        let pipelines = parse_line("cmd 1>&2").unwrap();
        let redir = &pipelines[0].commands[0].redirections[0];
        assert_eq!(redir.direction, Direction::Stdout);
        assert_eq!(redir.mode, RedirMode::DupToStderr);

        let pipelines = parse_line("cmd 2>&1").unwrap();
        let redir = &pipelines[0].commands[0].redirections[0];
        assert_eq!(redir.direction, Direction::Stderr);
        assert_eq!(redir.mode, RedirMode::DupToStdout);
    }
}
