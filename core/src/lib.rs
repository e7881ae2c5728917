//! Minimal multiplexed HTTP/1.0 client over raw non-blocking sockets.
//!
//! # Overview
//! Issues wire-exact HTTP/1.0 requests over non-blocking TCP sockets and
//! drives many of them concurrently in one cooperative control flow — no
//! worker threads, no HTTP client library. Responses are parsed (including
//! chunked transfer reversal), classified by status, optionally decoded, and
//! optionally cached so repeated requests skip the network entirely.
//!
//! # Design
//! - `request` builds message bytes and `response` parses them; both are
//!   pure functions, so the wire layer tests without sockets.
//! - `multiplex` owns the in-flight connections: one poll loop, one explicit
//!   state machine per connection, exactly one outcome per request.
//! - Collaborators are injected capabilities with working defaults: a
//!   `CacheStore`, a `LogSink`, a `BodyDecoder` and a `Transport`. Credential
//!   encoding, XML deserialization and TLS handshakes stay outside the core.
//! - `Client::call` returns the issued `Request` with the `Response`;
//!   retrying is explicit, not hidden instance state.

pub mod cache;
pub mod classify;
pub mod client;
pub mod decode;
pub mod error;
pub mod http;
pub mod log;
pub mod multiplex;
pub mod request;
pub mod response;

pub use cache::{fingerprint, CacheEntry, CacheStore, MemoryCache, NoopCache};
pub use classify::{classify, Class, Classification};
pub use client::{CallOptions, Client, ClientConfig};
pub use decode::{classify_content_type, BodyDecoder, ContentKind, JsonDecoder};
pub use error::Error;
pub use http::{Auth, Endpoint, Method, Request, Response, Scheme};
pub use log::{LogSink, NullLog, Severity, StderrLog};
pub use multiplex::{Completion, MioTransport, Multiplexer, Transport};
pub use request::build_message;
pub use response::{parse, ParseOptions, ParseOutcome, RawResponse};
