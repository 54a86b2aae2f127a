//! Text log sink adapter.
//!
//! Implements [`LogWriter`] over anything that implements
//! [`core::fmt::Write`] (a UART driver, a file wrapper, a `String` in
//! tests).  Lines are terminated with CRLF for serial terminals.

use core::fmt::Write;

use log::debug;

use crate::app::ports::{HalError, LogWriter};

/// Adapter that writes each status line to a text sink.
pub struct TextLogSink<W> {
    out: W,
    lines: u32,
}

impl<W: Write> TextLogSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, lines: 0 }
    }

    /// Lines written so far.
    pub fn lines(&self) -> u32 {
        self.lines
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> LogWriter for TextLogSink<W> {
    fn write_line(&mut self, line: &str) -> Result<(), HalError> {
        self.out.write_str(line).map_err(|_| HalError::Io)?;
        self.out.write_str("\r\n").map_err(|_| HalError::Io)?;
        self.lines = self.lines.wrapping_add(1);
        Ok(())
    }

    fn sync(&mut self) -> Result<(), HalError> {
        debug!("log sink synced after {} line(s)", self.lines);
        Ok(())
    }
}
