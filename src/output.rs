use std::sync::Arc;

use parking_lot::Mutex;

/// Fixed text appended when captured output is cut at the size limit.
pub const TRUNCATION_MARKER: &str = "\n... (output truncated)";

/// Bounded in-memory sink for a snippet's combined stdout/stderr.
///
/// Both streams of one execution write into the same buffer, in arrival
/// order. Once the byte limit is reached the remainder of the write and all
/// later writes are dropped, so the buffer can never grow unbounded no
/// matter how much the snippet prints. Cloning shares the underlying
/// buffer.
#[derive(Clone)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    buf: String,
    limit: usize,
    truncated: bool,
}

impl OutputBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                buf: String::new(),
                limit,
                truncated: false,
            })),
        }
    }

    /// Appends text, cutting at the byte limit on a char boundary.
    pub fn push(&self, text: &str) {
        let mut inner = self.inner.lock();
        if inner.truncated {
            return;
        }
        let remaining = inner.limit.saturating_sub(inner.buf.len());
        if text.len() <= remaining {
            inner.buf.push_str(text);
            return;
        }
        let mut cut = remaining;
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        inner.buf.push_str(&text[..cut]);
        inner.truncated = true;
    }

    pub fn truncated(&self) -> bool {
        self.inner.lock().truncated
    }

    /// Final captured text plus the truncation marker when the limit was
    /// hit: the rendered length is exactly limit + marker for ASCII output.
    pub fn render(&self) -> (String, bool) {
        let inner = self.inner.lock();
        let mut out = inner.buf.clone();
        if inner.truncated {
            out.push_str(TRUNCATION_MARKER);
        }
        (out, inner.truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_within_limit_is_untouched() {
        let buffer = OutputBuffer::new(100);
        buffer.push("hello\n");
        buffer.push("world\n");
        let (text, truncated) = buffer.render();
        assert_eq!(text, "hello\nworld\n");
        assert!(!truncated);
    }

    #[test]
    fn test_output_at_exact_limit_is_not_truncated() {
        let buffer = OutputBuffer::new(5);
        buffer.push("12345");
        let (text, truncated) = buffer.render();
        assert_eq!(text, "12345");
        assert!(!truncated);
    }

    #[test]
    fn test_overflow_is_cut_at_the_limit() {
        let buffer = OutputBuffer::new(8);
        buffer.push("123456");
        buffer.push("7890");
        let (text, truncated) = buffer.render();
        assert!(truncated);
        assert_eq!(text, format!("12345678{TRUNCATION_MARKER}"));
        assert_eq!(text.len(), 8 + TRUNCATION_MARKER.len());
    }

    #[test]
    fn test_writes_after_truncation_are_dropped() {
        let buffer = OutputBuffer::new(4);
        buffer.push("abcdef");
        buffer.push("ghij");
        let (text, _) = buffer.render();
        assert_eq!(text, format!("abcd{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_cut_respects_char_boundaries() {
        // 'é' is two bytes; a limit of 4 falls inside the second 'é'.
        let buffer = OutputBuffer::new(4);
        buffer.push("aéé xyz");
        let (text, truncated) = buffer.render();
        assert!(truncated);
        assert_eq!(text, format!("aé{TRUNCATION_MARKER}"));
    }
}
