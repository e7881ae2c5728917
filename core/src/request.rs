//! RequestBuilder: request parameters to wire-exact HTTP/1.0 message bytes.
//!
//! # Design
//! `build_message` is a pure function of the `Request` plus the client's
//! user agent — building the same request twice yields identical bytes. GET
//! (and HEAD) form-encode their fields into the query string; every other
//! method carries them as an `application/x-www-form-urlencoded` body with an
//! exact `Content-Length`. The message always names `Host` and
//! `Connection: Close` (one response per connection, framed by end-of-stream).
//!
//! # Form encoding
//! Historical variants of this client disagreed on query-string escaping, so
//! one canonical encoding is fixed here: unreserved characters
//! (ALPHA / DIGIT / `-` `.` `_` `~`) pass through, everything else becomes
//! `%XX` with uppercase hex — space is `%20`, not `+`. Keys and values are
//! encoded alike.

use crate::http::{Auth, Method, Request};

const CRLF: &str = "\r\n";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Construct the full HTTP/1.0 message for `request`.
pub fn build_message(request: &Request, user_agent: &str) -> Vec<u8> {
    let (wire_method, override_header) = wire_method(request);

    // Form fields ride in the body only for methods that carry one; a GET
    // override also forces them onto the query string.
    let fields_in_body = wire_method.carries_body() && !request.body.is_empty();

    let mut path = request.action.clone();
    if !fields_in_body && !request.body.is_empty() {
        path.push(if path.contains('?') { '&' } else { '?' });
        path.push_str(&form_encode(&request.body));
    }

    let mut head = String::new();
    head.push_str(wire_method.as_str());
    head.push(' ');
    head.push_str(&path);
    head.push_str(" HTTP/1.0");
    head.push_str(CRLF);

    push_header(&mut head, "Host", &request.endpoint.host_header());
    push_header(&mut head, "Connection", "Close");
    if !user_agent.is_empty() {
        push_header(&mut head, "User-Agent", user_agent);
    }
    if let Some(name) = override_header {
        push_header(&mut head, "X-HTTP-Method-Override", name);
    }
    if let Some(auth) = &request.auth {
        push_header(&mut head, "Authorization", &authorization_value(auth));
    }
    for (name, value) in &request.headers {
        push_header(&mut head, name, value);
    }

    let body = if fields_in_body {
        form_encode(&request.body).into_bytes()
    } else {
        Vec::new()
    };

    if !body.is_empty() {
        push_header(&mut head, "Content-Type", FORM_CONTENT_TYPE);
        push_header(&mut head, "Content-Length", &body.len().to_string());
    }
    head.push_str(CRLF);

    let mut message = head.into_bytes();
    message.extend_from_slice(&body);
    message
}

/// Resolve the verb actually written to the wire. With the override escape
/// hatch, a non-GET request is sent as `GET` plus an `X-HTTP-Method-Override`
/// header naming the logical verb.
fn wire_method(request: &Request) -> (Method, Option<&'static str>) {
    if request.method_override && request.method != Method::Get {
        (Method::Get, Some(request.method.as_str()))
    } else {
        (request.method, None)
    }
}

fn push_header(head: &mut String, name: &str, value: &str) {
    head.push_str(name);
    head.push_str(": ");
    head.push_str(value);
    head.push_str(CRLF);
}

fn authorization_value(auth: &Auth) -> String {
    match auth {
        Auth::Basic(token) => format!("Basic {token}"),
        Auth::Digest(params) => {
            // The password never leaves the process, whatever the caller put
            // in the parameter list.
            let composed = params
                .iter()
                .filter(|(name, _)| name != "password")
                .map(|(name, value)| format!("{name}=\"{value}\""))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Digest {composed}")
        }
    }
}

/// Canonical form encoding of ordered fields, `k=v` joined by `&`.
pub fn form_encode(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Endpoint, Scheme};

    fn request(method: Method, body: Vec<(String, String)>) -> Request {
        Request {
            endpoint: Endpoint::new(Scheme::Http, "api.example.test", 80),
            action: "/items".to_string(),
            method,
            headers: Vec::new(),
            body,
            timeout_secs: 30,
            cache_ttl: None,
            auth: None,
            method_override: false,
        }
    }

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn message_text(request: &Request) -> String {
        String::from_utf8(build_message(request, "restmux")).unwrap()
    }

    #[test]
    fn get_appends_fields_to_query_string() {
        let req = request(Method::Get, fields(&[("id", "5")]));
        let text = message_text(&req);
        assert!(text.starts_with("GET /items?id=5 HTTP/1.0\r\n"), "{text}");
        assert!(!text.contains("Content-Length"));
    }

    #[test]
    fn get_never_emits_a_body() {
        let req = request(Method::Get, fields(&[("a", "1"), ("b", "2")]));
        let text = message_text(&req);
        assert!(text.ends_with("\r\n\r\n"), "{text}");
    }

    #[test]
    fn post_carries_urlencoded_body_with_exact_length() {
        let req = request(Method::Post, fields(&[("name", "milk"), ("qty", "2")]));
        let bytes = build_message(&req, "restmux");
        let text = String::from_utf8(bytes.clone()).unwrap();

        let sep = text.find("\r\n\r\n").unwrap();
        let body = &bytes[sep + 4..];
        assert_eq!(body, b"name=milk&qty=2");
        assert!(text.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert!(text.contains("Content-Type: application/x-www-form-urlencoded\r\n"));
    }

    #[test]
    fn message_contains_exactly_one_separator() {
        for (method, body) in [
            (Method::Get, fields(&[("x", "y")])),
            (Method::Post, fields(&[("x", "y")])),
            (Method::Put, Vec::new()),
        ] {
            let req = request(method, body);
            let text = message_text(&req);
            let head_end = text.find("\r\n\r\n").unwrap();
            // no second separator inside the head
            assert_eq!(text[..head_end].find("\r\n\r\n"), None);
        }
    }

    #[test]
    fn mandatory_headers_are_present() {
        let req = request(Method::Get, Vec::new());
        let text = message_text(&req);
        assert!(text.contains("Host: api.example.test\r\n"));
        assert!(text.contains("Connection: Close\r\n"));
        assert!(text.contains("User-Agent: restmux\r\n"));
    }

    #[test]
    fn basic_auth_uses_caller_encoded_token() {
        let mut req = request(Method::Get, Vec::new());
        req.auth = Some(Auth::Basic("dXNlcjpwYXNz".to_string()));
        let text = message_text(&req);
        assert!(text.contains("Authorization: Basic dXNlcjpwYXNz\r\n"));
    }

    #[test]
    fn digest_auth_composes_params_and_drops_password() {
        let mut req = request(Method::Get, Vec::new());
        req.auth = Some(Auth::Digest(fields(&[
            ("username", "user"),
            ("password", "secret"),
            ("realm", "api"),
        ])));
        let text = message_text(&req);
        assert!(text.contains("Authorization: Digest username=\"user\", realm=\"api\"\r\n"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn method_override_sends_get_with_override_header() {
        let mut req = request(Method::Delete, fields(&[("id", "5")]));
        req.method_override = true;
        let text = message_text(&req);
        assert!(text.starts_with("GET /items?id=5 HTTP/1.0\r\n"), "{text}");
        assert!(text.contains("X-HTTP-Method-Override: DELETE\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn form_encoding_is_strict_percent_encoding() {
        let encoded = form_encode(&fields(&[("q", "a b&c"), ("tilde~", "ok")]));
        assert_eq!(encoded, "q=a%20b%26c&tilde~=ok");
    }

    #[test]
    fn building_twice_yields_identical_bytes() {
        let req = request(Method::Post, fields(&[("k", "v")]));
        assert_eq!(build_message(&req, "ua"), build_message(&req, "ua"));
    }

    #[test]
    fn get_with_existing_query_appends_with_ampersand() {
        let mut req = request(Method::Get, fields(&[("page", "2")]));
        req.action = "/items?sort=asc".to_string();
        let text = message_text(&req);
        assert!(text.starts_with("GET /items?sort=asc&page=2 HTTP/1.0\r\n"));
    }
}
