//! ResponseParser: raw accumulated bytes to a structured response.
//!
//! # Design
//! `parse` is a pure function over the bytes a connection has accumulated so
//! far. Until the header block terminates with a blank line it reports
//! `Incomplete` and the caller keeps reading; the multiplexer only treats
//! `Incomplete` as an error once the peer has closed the stream.
//!
//! Framing order: chunked transfer reversal first (when the header block
//! names it, see [`dechunk`]), then the `Content-Length` trim, then the XML
//! guard. The `Content-Length` trim keeps only the *last* N body bytes,
//! discarding any leading slack accumulated ahead of the true payload. That
//! tolerance absorbs partial or garbled leading reads from the socket, but it
//! can also mask genuine framing bugs upstream, so it is gated behind
//! [`ParseOptions::trim_to_content_length`] rather than applied silently.

const CRLF: &[u8] = b"\r\n";

/// How far past `Transfer-Encoding` the word `chunked` may appear and still
/// trigger dechunking. A narrow window avoids false positives from other
/// header values that merely mention "chunked".
const CHUNKED_PROXIMITY: usize = 40;

/// Knobs for response framing.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Trim the body to exactly its trailing `Content-Length` bytes,
    /// discarding leading slack. On by default.
    pub trim_to_content_length: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            trim_to_content_length: true,
        }
    }
}

/// Structured response parts, before classification and body decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub version: String,
    /// `None` when the status line carried no numeric status; the classifier
    /// synthesizes a 500 for it downstream.
    pub status: Option<u16>,
    pub status_text: String,
    /// Ordered headers, keys lowercased and trimmed.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Result of one parse attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Complete(RawResponse),
    /// No blank line yet — the header block has not terminated.
    Incomplete,
}

/// Split raw bytes into status line, headers and body, reversing chunked
/// transfer encoding and applying the configured framing tolerances.
pub fn parse(raw: &[u8], options: &ParseOptions) -> ParseOutcome {
    let (head_end, body_start) = match find_blank_line(raw) {
        Some(split) => split,
        None => return ParseOutcome::Incomplete,
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).into_owned();
    let mut lines = head.split("\r\n").flat_map(|l| l.split('\n'));

    let status_line = lines.next().unwrap_or_default();
    let (version, status, status_text) = parse_status_line(status_line);

    let mut headers = Vec::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.push((
                name.trim().to_ascii_lowercase(),
                value.trim().to_string(),
            ));
        }
    }

    let mut body = raw[body_start..].to_vec();

    if names_chunked(&head) {
        body = dechunk(&body);
    }

    if options.trim_to_content_length {
        if let Some(length) = header_value(&headers, "content-length")
            .and_then(|v| v.parse::<usize>().ok())
        {
            if body.len() > length {
                body = body[body.len() - length..].to_vec();
            }
        }
    }

    if header_value(&headers, "content-type").is_some_and(|ct| ct.contains("xml")) {
        body = trim_xml(body);
    }

    ParseOutcome::Complete(RawResponse {
        version,
        status,
        status_text,
        headers,
        body,
    })
}

/// First blank-line sequence, returning (end of head, start of body).
/// Accepts both CRLF and bare-LF separators.
fn find_blank_line(raw: &[u8]) -> Option<(usize, usize)> {
    let crlf = find_subslice(raw, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find_subslice(raw, b"\n\n").map(|i| (i, i + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_status_line(line: &str) -> (String, Option<u16>, String) {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default().to_string();
    let status = parts.next().and_then(|s| s.parse::<u16>().ok());
    let status_text = parts.next().unwrap_or_default().trim().to_string();
    (version, status, status_text)
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

/// Whether the raw header text names chunked transfer encoding. Only a
/// `chunked` within [`CHUNKED_PROXIMITY`] characters of `Transfer-Encoding`
/// counts.
fn names_chunked(head: &str) -> bool {
    let lower = head.to_ascii_lowercase();
    if let Some(te) = lower.find("transfer-encoding") {
        let window_end = (te + "transfer-encoding".len() + CHUNKED_PROXIMITY).min(lower.len());
        return lower[te..window_end].contains("chunked");
    }
    false
}

/// Reverse chunked transfer encoding.
///
/// Duplicate blank-line runs are first normalized to single separators, then
/// the body is consumed as hex-size line / chunk bytes / separator, stopping
/// at the zero-size chunk. A malformed size line ends decoding with whatever
/// has been recovered so far.
pub fn dechunk(body: &[u8]) -> Vec<u8> {
    let mut data = body.to_vec();
    while let Some(i) = find_subslice(&data, b"\r\n\r\n") {
        data.splice(i..i + 4, CRLF.iter().copied());
    }

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (line, after_line) = match read_line(&data, pos) {
            Some(split) => split,
            None => break,
        };
        let size_text = line.split(';').next().unwrap_or_default().trim();
        let size = match usize::from_str_radix(size_text, 16) {
            Ok(size) => size,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }

        let end = (after_line + size).min(data.len());
        out.extend_from_slice(&data[after_line..end]);
        pos = end;
        // skip the chunk's trailing separator
        if data[pos..].starts_with(CRLF) {
            pos += 2;
        } else if data[pos..].starts_with(b"\n") {
            pos += 1;
        }
    }
    out
}

/// Line starting at `pos`, without its terminator, plus the offset just past
/// the terminator.
fn read_line(data: &[u8], pos: usize) -> Option<(String, usize)> {
    let rest = &data[pos..];
    let nl = rest.iter().position(|&b| b == b'\n')?;
    let mut line_end = nl;
    if line_end > 0 && rest[line_end - 1] == b'\r' {
        line_end -= 1;
    }
    Some((
        String::from_utf8_lossy(&rest[..line_end]).into_owned(),
        pos + nl + 1,
    ))
}

/// Guard against socket-level framing noise around XML payloads: keep from
/// the first `<?xml` marker through the last `>`.
fn trim_xml(body: Vec<u8>) -> Vec<u8> {
    let start = find_subslice(&body, b"<?xml");
    let end = body.iter().rposition(|&b| b == b'>');
    match (start, end) {
        (Some(start), Some(end)) if start <= end => body[start..=end].to_vec(),
        _ => body,
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
