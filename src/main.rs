//! REPL driver: read a line, bound it, hand it to the parser and launcher,
//! repeat. Line editing/history (`editor`) and prompt assembly (`prompt`)
//! are external collaborators kept outside the execution engine core.

mod builtins;
mod editor;
mod error;
mod job_control;
mod jobs;
mod launcher;
mod parser;
mod prompt;
mod redirect;
mod signals;
mod status;
mod types;

use jobs::JobTable;

/// Input lines longer than this are truncated (`MAXLINE` in the original).
const MAX_LINE: usize = 1024;

fn main() {
    if let Err(e) = signals::install() {
        error::unix_fatal("sigaction", &e);
    }

    let mut job_table = JobTable::new();
    let mut editor = editor::LineEditor::new();

    loop {
        // Reap before showing a fresh prompt, one of the two points where
        // pending child-state changes are applied.
        signals::reap(&mut job_table);

        let prompt_str = prompt::render();
        match editor.read_line(&prompt_str) {
            Ok(None) => {
                println!();
                break;
            }
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    editor.add_to_history(&line);
                }
                let bounded = truncate_line(&line, MAX_LINE);
                run_line(&bounded, &mut job_table);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                error::unix_error("read_line", &e);
                continue;
            }
        }
    }

    std::process::exit(0);
}

/// Truncate `line` to at most `max_bytes` bytes, respecting UTF-8 char
/// boundaries (`MAXLINE` is a byte bound on a byte-oriented `fgets` in the
/// original; Rust strings add the boundary constraint on top of it).
fn truncate_line(line: &str, max_bytes: usize) -> String {
    if line.len() <= max_bytes {
        return line.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !line.is_char_boundary(end) {
        end -= 1;
    }
    line[..end].to_string()
}

fn run_line(line: &str, job_table: &mut JobTable) {
    match parser::parse_line(line) {
        Ok(pipelines) => {
            for pipeline in pipelines {
                launcher::launch(&pipeline, job_table);
            }
        }
        Err(e) => error::app_error(&e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_line_is_unchanged() {
        assert_eq!(truncate_line("ls -l", MAX_LINE), "ls -l");
    }

    #[test]
    fn long_line_is_truncated_to_max_bytes() {
        let line = "a".repeat(2000);
        let truncated = truncate_line(&line, MAX_LINE);
        assert_eq!(truncated.len(), MAX_LINE);
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        let line = "é".repeat(600); // 2 bytes each, 1200 bytes total
        let truncated = truncate_line(&line, MAX_LINE);
        assert!(truncated.len() <= MAX_LINE);
        assert!(String::from_utf8(truncated.into_bytes()).is_ok());
    }
}
