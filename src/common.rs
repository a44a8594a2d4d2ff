// Licensed under the Apache-2.0 license

//! Logging shared by the driver modules.
//!
//! Drivers are generic over a [`Logger`] so that production images can compile
//! logging out entirely with [`NoOpLogger`], while bring-up builds route records
//! to a UART or any other [`embedded_io::Write`] sink through [`WriterLogger`].

use core::fmt::{self, Write as _};

/// Capacity of one formatted log record. Longer records are truncated.
pub const LOG_LINE_CAPACITY: usize = 128;

pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);

    /// Formats `args` into a bounded line and forwards it to [`Logger::debug`].
    fn debug_fmt(&mut self, args: fmt::Arguments<'_>) {
        let line = render(args);
        self.debug(line.as_str());
    }

    /// Formats `args` into a bounded line and forwards it to [`Logger::error`].
    fn error_fmt(&mut self, args: fmt::Arguments<'_>) {
        let line = render(args);
        self.error(line.as_str());
    }
}

/// Renders a record, keeping whatever fits when the line overflows.
fn render(args: fmt::Arguments<'_>) -> heapless::String<LOG_LINE_CAPACITY> {
    let mut line = heapless::String::new();
    let _ = Truncating(&mut line).write_fmt(args);
    line
}

struct Truncating<'a>(&'a mut heapless::String<LOG_LINE_CAPACITY>);

impl fmt::Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
    fn debug_fmt(&mut self, _args: fmt::Arguments<'_>) {}
    fn error_fmt(&mut self, _args: fmt::Arguments<'_>) {}
}

/// Writes each record as one `[I2C]`-prefixed line to an `embedded-io` sink.
///
/// Sink errors are dropped: a failing console must never fail a bus transfer.
pub struct WriterLogger<W: embedded_io::Write> {
    writer: W,
}

impl<W: embedded_io::Write> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, level: &str, msg: &str) {
        let _ = self.writer.write_all(b"[I2C] ");
        let _ = self.writer.write_all(level.as_bytes());
        let _ = self.writer.write_all(b": ");
        let _ = self.writer.write_all(msg.as_bytes());
        let _ = self.writer.write_all(b"\n");
    }
}

impl<W: embedded_io::Write> Logger for WriterLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.emit("debug", msg);
    }

    fn error(&mut self, msg: &str) {
        self.emit("error", msg);
    }
}

/// Formats a debug record through a [`Logger`] without allocating.
#[macro_export]
macro_rules! i2c_debug {
    ($logger:expr, $($arg:tt)*) => {
        $crate::common::Logger::debug_fmt(&mut $logger, format_args!($($arg)*))
    };
}

/// Formats an error record through a [`Logger`] without allocating.
#[macro_export]
macro_rules! i2c_error {
    ($logger:expr, $($arg:tt)*) => {
        $crate::common::Logger::error_fmt(&mut $logger, format_args!($($arg)*))
    };
}
