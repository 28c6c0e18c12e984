//! Terminal rendering boundary: best-effort output, never fatal to the turn
//! loop if the underlying writer blocks or fails (spec.md §5 "Backpressure").

/// Minimal terminal-writer contract the turn loop drives. Concrete
/// implementations (plain stdout, ANSI-colored stdout, a test recorder) live
/// above the core.
pub trait TerminalRenderer: Send + Sync {
    /// Raw streamed text from the model, written without a trailing newline.
    fn write_chunk(&self, text: &str);
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// A renderer that discards everything. Used by non-interactive callers and
/// tests that don't care about terminal output.
pub struct NullRenderer;

impl TerminalRenderer for NullRenderer {
    fn write_chunk(&self, _text: &str) {}
    fn info(&self, _message: &str) {}
    fn success(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_renderer_accepts_everything_without_panicking() {
        let renderer = NullRenderer;
        renderer.write_chunk("hi");
        renderer.info("info");
        renderer.success("ok");
        renderer.warn("careful");
        renderer.error("boom");
    }
}
