//! Small indentation-aware text builder used by the artifact renderers.

pub struct CodeWriter {
    buf: String,
    depth: usize,
    unit: &'static str,
}

impl CodeWriter {
    /// `unit` is one indentation level, e.g. four spaces for Python.
    pub fn new(unit: &'static str) -> Self {
        Self {
            buf: String::new(),
            depth: 0,
            unit,
        }
    }

    /// Write one line at the current depth. Empty lines get no indentation.
    pub fn line(&mut self, text: impl AsRef<str>) -> &mut Self {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.buf.push_str(self.unit);
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.line("")
    }

    pub fn indent(&mut self) -> &mut Self {
        self.depth += 1;
        self
    }

    pub fn dedent(&mut self) -> &mut Self {
        self.depth = self.depth.saturating_sub(1);
        self
    }

    /// Write `open`, the body one level deeper, then `close` (if any).
    pub fn block(
        &mut self,
        open: impl AsRef<str>,
        close: Option<&str>,
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.line(open);
        self.indent();
        body(self);
        self.dedent();
        if let Some(close) = close {
            self.line(close);
        }
        self
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_blocks_indent() {
        let mut w = CodeWriter::new("  ");
        w.block("a {", Some("}"), |w| {
            w.line("b;");
            w.blank();
            w.block("c {", Some("}"), |w| {
                w.line("d;");
            });
        });
        assert_eq!(w.finish(), "a {\n  b;\n\n  c {\n    d;\n  }\n}\n");
    }
}
