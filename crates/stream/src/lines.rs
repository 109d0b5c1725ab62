use crate::StreamError;

/// Largest accepted line, excluding the terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a chunked byte stream into newline-terminated lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buf: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every line it completes.
    ///
    /// A trailing `\r` is dropped and blank lines are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, StreamError> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let line = trim_cr(&self.buf[start..end]);
            if line.len() > MAX_LINE_BYTES {
                return Err(StreamError::LineTooLong {
                    limit: MAX_LINE_BYTES,
                });
            }
            if !line.is_empty() {
                lines.push(line.to_vec());
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        if self.buf.len() > MAX_LINE_BYTES {
            return Err(StreamError::LineTooLong {
                limit: MAX_LINE_BYTES,
            });
        }
        Ok(lines)
    }

    /// Return the unterminated remainder, if any.
    pub fn finish(self) -> Option<Vec<u8>> {
        let line = trim_cr(&self.buf);
        (!line.is_empty()).then(|| line.to_vec())
    }
}

fn trim_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}
