//! Sinks for the coordinator's progress and failure lines.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Destination for the lines a [`Finisher`](crate::Finisher) reports.
///
/// Any logger implementing both methods can be plugged in via
/// [`Finisher::set_logger`](crate::Finisher::set_logger).
pub trait Logger: Send + Sync {
    fn info(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Used when no logger is configured. Writes timestamped lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLogger;

impl DefaultLogger {
    fn write_line(out: &mut impl Write, args: fmt::Arguments<'_>) -> io::Result<()> {
        let now = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
        writeln!(out, "{now} {args}")
    }
}

impl Logger for DefaultLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        // nowhere left to report a failing stderr
        let _ = Self::write_line(&mut io::stderr().lock(), args);
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.info(args);
    }
}

/// Plain lines on stdout, without timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutLogger;

impl Logger for StdoutLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        let _ = writeln!(io::stdout().lock(), "{args}");
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        self.info(args);
    }
}

/// Forwards lines to `tracing` under the `finish` target, so they end up wherever the
/// application's subscriber sends its own logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!(target: "finish", "{args}");
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        tracing::error!(target: "finish", "{args}");
    }
}

/// Keeps every line in memory.
///
/// Useful for embedders that want to turn failed shutdowns into an exit code after
/// [`Finisher::wait`](crate::Finisher::wait) returns.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn infos(&self) -> Vec<String> {
        lock(&self.infos).clone()
    }

    pub fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }

    pub fn has_errors(&self) -> bool {
        !lock(&self.errors).is_empty()
    }
}

impl Logger for MemoryLogger {
    fn info(&self, args: fmt::Arguments<'_>) {
        lock(&self.infos).push(args.to_string());
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        lock(&self.errors).push(args.to_string());
    }
}

fn lock(lines: &Mutex<Vec<String>>) -> MutexGuard<'_, Vec<String>> {
    lines.lock().unwrap_or_else(PoisonError::into_inner)
}
