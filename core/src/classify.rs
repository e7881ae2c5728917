//! ResponseClassifier: status code to outcome class, cacheability and
//! logging severity.
//!
//! # Design
//! 404 gets its own class because callers routinely distinguish "the
//! resource does not exist" from a genuine error; it is downgraded to a
//! benign plain-text response rather than propagated as a failure. Every
//! status outside the known table — informational, redirects, or anything
//! unparsable — is treated as a server error with a synthesized 500, since
//! this client follows neither continuations nor redirects.

use crate::http::Response;
use crate::log::Severity;
use serde::{Deserialize, Serialize};

/// Plain-text body substituted for 404 responses.
pub const NOT_FOUND_BODY: &[u8] = b"Not Found";

/// Status synthesized for unknown or missing status codes.
pub const SYNTHESIZED_STATUS: u16 = 500;

/// Outcome class of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Class {
    /// 2xx. Cacheable; body decoding applies.
    Success,
    /// 404. Benign terminal state; body decoding applies, never cached.
    NotFound,
    /// 4xx other than 404. Logged at warning severity, not cached.
    ClientError,
    /// 5xx, plus anything outside the known table. Logged at error
    /// severity, not cached.
    ServerError,
}

/// Full classification verdict for one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub class: Class,
    /// Effective status: the wire status, or [`SYNTHESIZED_STATUS`] when the
    /// wire carried none or an unknown one.
    pub status: u16,
    pub cacheable: bool,
    /// Severity for the log sink; `None` means nothing worth logging above
    /// the dispatcher's own informational chatter.
    pub severity: Option<Severity>,
}

/// Map a (possibly missing) status code to its classification.
pub fn classify(status: Option<u16>) -> Classification {
    match status {
        Some(code @ 200..=299) => Classification {
            class: Class::Success,
            status: code,
            cacheable: true,
            severity: None,
        },
        Some(404) => Classification {
            class: Class::NotFound,
            status: 404,
            cacheable: false,
            severity: Some(Severity::Info),
        },
        Some(code @ 400..=499) => Classification {
            class: Class::ClientError,
            status: code,
            cacheable: false,
            severity: Some(Severity::Warn),
        },
        Some(code @ 500..=599) => Classification {
            class: Class::ServerError,
            status: code,
            cacheable: false,
            severity: Some(Severity::Error),
        },
        // Not in the known table, or missing entirely.
        _ => Classification {
            class: Class::ServerError,
            status: SYNTHESIZED_STATUS,
            cacheable: false,
            severity: Some(Severity::Error),
        },
    }
}

/// Rewrite a 404 response into its benign plain-text form.
pub fn downgrade_not_found(response: &mut Response) {
    response.body = NOT_FOUND_BODY.to_vec();
    response
        .headers
        .retain(|(name, _)| name != "content-type" && name != "content-length");
    response
        .headers
        .push(("content-type".to_string(), "text/plain".to_string()));
}
