//! Line reassembly for the serial stream.
//!
//! The device sends raw text chunks with no framing of its own; a chunk may
//! contain several lines, a fragment of one, or no terminator at all. The
//! buffer holds at most the tail of the last unterminated line.

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and drains every complete line, in arrival order,
    /// with the `\n` terminator stripped. The unterminated remainder stays
    /// buffered for the next call.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.pending.push_str(chunk);

        let mut lines = Vec::new();
        while let Some(idx) = self.pending.find('\n') {
            let rest = self.pending.split_off(idx + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop();
            lines.push(line);
        }
        lines
    }

    /// Tail of the most recent chunk that has not yet seen a terminator.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::LineBuffer;

    #[test]
    fn partial_then_complete() {
        let mut buf = LineBuffer::new();

        assert!(buf.feed("ab").is_empty());
        assert_eq!(buf.pending(), "ab");

        assert_eq!(buf.feed("cd\n"), vec!["abcd"]);
        assert_eq!(buf.pending(), "");

        assert_eq!(buf.feed("ef\n"), vec!["ef"]);
    }

    #[test]
    fn bare_terminators_emit_empty_lines() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.feed("\n\n"), vec!["", ""]);
        assert_eq!(buf.pending(), "");
    }

    #[test]
    fn multiple_lines_in_one_chunk() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.feed("one\ntwo\nthr"), vec!["one", "two"]);
        assert_eq!(buf.pending(), "thr");
        assert_eq!(buf.feed("ee\n"), vec!["three"]);
    }

    #[test]
    fn emits_exactly_one_line_per_terminator() {
        // Same input split at different chunk boundaries must yield the
        // same lines.
        let input = "boot: ok\nwifi: scanning\n\nip: 10.0.0.7\ntail";
        let expected = ["boot: ok", "wifi: scanning", "", "ip: 10.0.0.7"];

        for split in 0..=input.len() {
            let mut buf = LineBuffer::new();
            let mut lines = buf.feed(&input[..split]);
            lines.extend(buf.feed(&input[split..]));

            assert_eq!(lines, expected, "split at {}", split);
            assert_eq!(buf.pending(), "tail", "split at {}", split);
        }
    }

    #[test]
    fn carriage_returns_pass_through() {
        // Only `\n` terminates a line; a `\r` before it belongs to the line.
        let mut buf = LineBuffer::new();
        assert_eq!(buf.feed("dos line\r\n"), vec!["dos line\r"]);
    }

    #[test]
    fn clear_discards_tail() {
        let mut buf = LineBuffer::new();
        buf.feed("half a li");
        buf.clear();
        assert_eq!(buf.feed("ne\n"), vec!["ne"]);
    }
}
