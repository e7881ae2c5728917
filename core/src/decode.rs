//! Content-type classification and the body-decoder collaborator.
//!
//! The engine itself never deserializes payloads: it classifies the
//! content-type into a coarse family and hands the raw bytes to a
//! `BodyDecoder` injected at client construction. The bundled `JsonDecoder`
//! covers the JSON and plain-text families with serde_json; XML (and
//! anything else) stays with whatever decoder the embedder supplies. A
//! decoder failure degrades gracefully — the dispatcher logs it and keeps
//! the raw bytes exposed.

/// Coarse content-type families the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Xml,
    Text,
    Other,
}

/// Classify a `Content-Type` header value into a family.
pub fn classify_content_type(content_type: Option<&str>) -> ContentKind {
    let ct = match content_type {
        Some(ct) => ct.to_ascii_lowercase(),
        None => return ContentKind::Other,
    };
    if ct.contains("json") {
        ContentKind::Json
    } else if ct.contains("xml") {
        ContentKind::Xml
    } else if ct.starts_with("text/") {
        ContentKind::Text
    } else {
        ContentKind::Other
    }
}

/// Decodes raw body bytes into a structured value.
pub trait BodyDecoder {
    /// Decode `body` according to its content family. `Ok(None)` means the
    /// family is outside this decoder's competence and the raw bytes stand.
    fn decode(
        &self,
        body: &[u8],
        kind: ContentKind,
    ) -> Result<Option<serde_json::Value>, String>;
}

/// Default decoder: serde_json for JSON, UTF-8 string values for plain text,
/// nothing for XML or unknown families.
pub struct JsonDecoder;

impl BodyDecoder for JsonDecoder {
    fn decode(
        &self,
        body: &[u8],
        kind: ContentKind,
    ) -> Result<Option<serde_json::Value>, String> {
        match kind {
            ContentKind::Json => serde_json::from_slice(body)
                .map(Some)
                .map_err(|e| e.to_string()),
            ContentKind::Text => Ok(Some(serde_json::Value::String(
                String::from_utf8_lossy(body).into_owned(),
            ))),
            ContentKind::Xml | ContentKind::Other => Ok(None),
        }
    }
}
