use std::io::{self, Write};

use platwrap_stream::LogLevel;

/// Tag asking for a message to be shown as the transient status line.
pub const SPIN_TAG: &str = "spin";

/// Prints streamed log records, keeping at most one transient status line.
///
/// A status line is overwritten by the next status and erased before any
/// other output.
pub struct LogPrinter<W: Write> {
    out: W,
    status_width: usize,
}

impl<W: Write> LogPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            status_width: 0,
        }
    }

    pub fn print(&mut self, level: LogLevel, message: &str, tags: &[String]) -> io::Result<()> {
        if tags.iter().any(|t| t == SPIN_TAG) {
            return self.status(message);
        }
        self.clear()?;
        let message = message.trim_end_matches('\n');
        match level {
            LogLevel::Warn => writeln!(self.out, "Warning: {message}"),
            LogLevel::Error => writeln!(self.out, "Error: {message}"),
            LogLevel::Debug | LogLevel::Info => writeln!(self.out, "{message}"),
        }
    }

    /// Replace the status line.
    pub fn status(&mut self, message: &str) -> io::Result<()> {
        self.clear()?;
        let line = message.lines().next().unwrap_or_default();
        write!(self.out, "{line}")?;
        self.status_width = line.chars().count();
        self.out.flush()
    }

    /// Erase the status line, if any.
    pub fn clear(&mut self) -> io::Result<()> {
        if self.status_width == 0 {
            return Ok(());
        }
        write!(self.out, "\r{}\r", " ".repeat(self.status_width))?;
        self.status_width = 0;
        self.out.flush()
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
