//! Terminal rendering for the chatsync client.

use std::io::{self, Stdout, Write};

use crate::types::{ChatEntry, HistoryItem, SessionId, SessionSummary};

/// ANSI escape code for dim text (used for pending answers).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for questions).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the open session).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Output sink for the chat client.
pub trait Renderer: Send {
    /// Print an informational line.
    fn print_info(&mut self, info: &str);

    /// Print an error line.
    fn print_error(&mut self, error: &str);

    /// Print one transcript entry.
    fn render_entry(&mut self, entry: &ChatEntry);

    /// Print the session list, marking the open session.
    fn render_sessions(&mut self, sessions: &[SessionSummary], current: Option<&SessionId>);

    /// Print the flat question history.
    fn render_history(&mut self, items: &[HistoryItem]);

    /// Print a whole transcript.
    fn render_transcript(&mut self, entries: &[ChatEntry]) {
        if entries.is_empty() {
            self.print_info("(no messages yet)");
        }
        for entry in entries {
            self.render_entry(entry);
        }
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_color {
            format!("{color}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn emit(&mut self, text: &str) {
        let _ = writeln!(self.stdout, "{text}");
        let _ = self.stdout.flush();
    }

    fn format_entry(&self, entry: &ChatEntry) -> String {
        let question = self.paint(ANSI_CYAN, &format!("You: {}", entry.question()));
        let answer = match entry.answer() {
            Some(answer) => answer.to_string(),
            None => self.paint(ANSI_DIM, "(waiting for answer...)"),
        };
        format!("{question}\n{answer}\n")
    }

    fn format_sessions(&self, sessions: &[SessionSummary], current: Option<&SessionId>) -> String {
        if sessions.is_empty() {
            return "(no sessions)".to_string();
        }
        let mut out = String::new();
        for session in sessions {
            let is_current = current == Some(&session.id);
            let marker = if is_current { '*' } else { ' ' };
            let line = format!("{marker} {}  {}", session.id, session.display_title());
            if is_current {
                out.push_str(&self.paint(ANSI_GREEN, &line));
            } else {
                out.push_str(&line);
            }
            out.push('\n');
        }
        out.pop();
        out
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_info(&mut self, info: &str) {
        self.emit(info);
    }

    fn print_error(&mut self, error: &str) {
        let line = self.paint(ANSI_RED, &format!("Error: {error}"));
        eprintln!("{line}");
    }

    fn render_entry(&mut self, entry: &ChatEntry) {
        let text = self.format_entry(entry);
        self.emit(&text);
    }

    fn render_sessions(&mut self, sessions: &[SessionSummary], current: Option<&SessionId>) {
        let text = self.format_sessions(sessions, current);
        self.emit(&text);
    }

    fn render_history(&mut self, items: &[HistoryItem]) {
        if items.is_empty() {
            self.emit("(no history)");
            return;
        }
        for item in items {
            let line = format!("[{}] {}", item.created_at.date(), item.question);
            self.emit(&line);
        }
    }
}
