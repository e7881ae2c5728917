//! Error types for the client engine.
//!
//! # Design
//! Connection-level failures (`ConnectFailure`, `NonBlockingActivationFailure`,
//! `WriteFailure`) are terminal for one connection only — the connection is
//! recorded as failed and never retried automatically. HTTP-level problems are
//! *not* errors: 4xx/5xx responses come back as classified `Response` values
//! and the caller inspects their status. `HttpError` exists for callers that
//! want to promote a classified response into an error themselves. A cache
//! miss is a control signal inside the dispatcher, never an error.

use std::fmt;

/// Errors produced while driving a request over the wire.
#[derive(Debug)]
pub enum Error {
    /// The socket could not be connected: address resolution failed, the
    /// connect call errored, or the connection timed out before becoming
    /// writable.
    ConnectFailure(String),

    /// The socket reported connect-readiness but never settled into a usable
    /// non-blocking state within the bounded number of re-checks.
    NonBlockingActivationFailure(String),

    /// The request message could not be fully written to the socket.
    WriteFailure(String),

    /// The response bytes never formed a complete message: the header block
    /// never terminated before end-of-stream, or the stream errored mid-read.
    MalformedResponse(String),

    /// A non-2xx status promoted to an error by the caller. The dispatcher
    /// itself never returns this variant; it surfaces classified responses
    /// as data.
    HttpError { status: u16, body: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConnectFailure(msg) => write!(f, "connect failed: {msg}"),
            Error::NonBlockingActivationFailure(msg) => {
                write!(f, "non-blocking activation failed: {msg}")
            }
            Error::WriteFailure(msg) => write!(f, "write failed: {msg}"),
            Error::MalformedResponse(msg) => write!(f, "malformed response: {msg}"),
            Error::HttpError { status, body } => write!(f, "HTTP {status}: {body}"),
        }
    }
}

impl std::error::Error for Error {}
