//! Logging-sink collaborator interface.
//!
//! The engine never writes to a concrete log target itself. Notable events
//! (cache hits, HTTP error classes, degraded decodes, connection failures)
//! go through a `LogSink` injected at client construction, so embedders can
//! route them into whatever logging stack they already run. `NullLog` is the
//! default; `StderrLog` is a convenience for binaries and tests.

use std::fmt;

/// Severity attached to a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

/// Destination for notable client events.
pub trait LogSink {
    /// Record one event. `trace` carries optional supporting detail such as
    /// an underlying I/O error string.
    fn log(&self, message: &str, severity: Severity, trace: Option<&str>);
}

/// Discards every event. The default sink.
pub struct NullLog;

impl LogSink for NullLog {
    fn log(&self, _message: &str, _severity: Severity, _trace: Option<&str>) {}
}

/// Writes events to standard error, one line each.
pub struct StderrLog;

impl LogSink for StderrLog {
    fn log(&self, message: &str, severity: Severity, trace: Option<&str>) {
        match trace {
            Some(trace) => eprintln!("[{severity}] {message} ({trace})"),
            None => eprintln!("[{severity}] {message}"),
        }
    }
}
