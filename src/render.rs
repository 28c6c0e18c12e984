//! Concrete terminal renderer (SPEC_FULL.md §6): best-effort ANSI-styled
//! stdout/stderr writer, falling back silently to plain `println!`/`eprintln!`
//! if a styled write fails.

use anstyle::{AnsiColor, Color, Style};
use conductor_core::renderer::TerminalRenderer;
use std::io::Write;

pub struct StdoutRenderer;

impl Default for StdoutRenderer {
    fn default() -> Self {
        Self
    }
}

impl StdoutRenderer {
    fn styled(prefix: &str, color: AnsiColor, message: &str) {
        let style = Style::new().fg_color(Some(Color::Ansi(color)));
        let line = format!("{}{prefix}{message}{}", style.render(), style.render_reset());
        if writeln!(std::io::stdout(), "{line}").is_err() {
            println!("{prefix}{message}");
        }
    }
}

impl TerminalRenderer for StdoutRenderer {
    fn write_chunk(&self, text: &str) {
        if write!(std::io::stdout(), "{text}").is_err() {
            print!("{text}");
        }
        let _ = std::io::stdout().flush();
    }

    fn info(&self, message: &str) {
        Self::styled("", AnsiColor::Cyan, message);
    }

    fn success(&self, message: &str) {
        Self::styled("", AnsiColor::Green, message);
    }

    fn warn(&self, message: &str) {
        Self::styled("\u{26a0} ", AnsiColor::Yellow, message);
    }

    fn error(&self, message: &str) {
        Self::styled("", AnsiColor::Red, message);
    }
}
