//! Wire-level plain-data types.
//!
//! # Design
//! Requests and responses are described as plain owned data, with the actual
//! byte construction and parsing living in `request` and `response`. A
//! `Request` is immutable once built: the dispatcher builds a fresh one per
//! call and returns it alongside the `Response`, so retrying is an explicit
//! `retry(&request)` instead of reading hidden "last request" state. Every
//! `Response` carries its originating `Request` by value — with concurrent
//! dispatch, completion order says nothing about submission order, so the
//! association must travel with the result.
//!
//! All types derive serde traits so external cache stores can persist entries
//! without caring about their shape.

use serde::{Deserialize, Serialize};

/// URL scheme of an endpoint origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scheme {
    Http,
    /// Requires a transport-security collaborator; the engine itself only
    /// drives plain TCP.
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// An endpoint origin: scheme, host, port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(scheme: Scheme, host: &str, port: u16) -> Self {
        Self {
            scheme,
            host: host.to_string(),
            port,
        }
    }

    /// Parse an origin string such as `http://api.example.test` or
    /// `http://127.0.0.1:8080`. The port defaults from the scheme.
    pub fn parse(origin: &str) -> Option<Self> {
        let (scheme, rest) = if let Some(rest) = origin.strip_prefix("http://") {
            (Scheme::Http, rest)
        } else if let Some(rest) = origin.strip_prefix("https://") {
            (Scheme::Https, rest)
        } else {
            return None;
        };

        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            return None;
        }

        match rest.split_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().ok()?;
                Some(Self::new(scheme, host, port))
            }
            None => Some(Self::new(scheme, rest, scheme.default_port())),
        }
    }

    /// Value for the `Host` header: bare host on the scheme's default port,
    /// `host:port` otherwise.
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
        }
    }

    /// Whether a message for this method carries its form fields in the body.
    /// GET (and HEAD) carry them as a query string instead.
    pub fn carries_body(self) -> bool {
        !matches!(self, Method::Get | Method::Head)
    }
}

/// Authentication attached to a request.
///
/// Credential *encoding* is an external concern: `Basic` carries the already
/// base64-encoded `user:pass` token, and `Digest` carries the composed
/// parameter list. The builder only formats the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Auth {
    /// Base64 token of `user:pass`, encoded by the caller.
    Basic(String),
    /// Digest parameters as ordered name/value pairs. Any pair named
    /// `password` is dropped by the builder rather than sent.
    Digest(Vec<(String, String)>),
}

/// One fully-specified request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub endpoint: Endpoint,
    /// Path component, e.g. `/items`. A query string may already be present;
    /// GET form fields are appended to it.
    pub action: String,
    pub method: Method,
    /// Ordered header lines. Uniqueness by name is not enforced.
    pub headers: Vec<(String, String)>,
    /// Ordered form fields. Query string for GET, urlencoded body otherwise.
    pub body: Vec<(String, String)>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Per-request cache TTL override in seconds, if any.
    pub cache_ttl: Option<u64>,
    pub auth: Option<Auth>,
    /// Send this request as `GET` plus an `X-HTTP-Method-Override` header,
    /// for services that reject verbs other than GET/POST.
    pub method_override: bool,
}

/// One parsed (or synthesized) response, tied to its originating request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Version token from the status line, e.g. `HTTP/1.0`.
    pub version: String,
    pub status: u16,
    pub status_text: String,
    /// Ordered headers with keys lowercased and trimmed.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes after transfer-decoding and framing.
    pub body: Vec<u8>,
    /// Value produced by the body-decoder collaborator, when it applies.
    pub decoded: Option<serde_json::Value>,
    /// The request this response answers.
    pub request: Request,
}

impl Response {
    /// First header value with the given (lowercase) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Body bytes as lossily-decoded text.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
