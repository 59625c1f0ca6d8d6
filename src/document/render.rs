use crate::accumulator::RawRequest;
use crate::encoding::{encode_into, encoded_len};
use bytes::Bytes;

const METHOD_KEY: &str = "{\"method\":\"";
const URI_KEY: &str = "\",\"uri\":\"";
const VERSION_KEY: &str = "\",\"version\":\"";
const HEADERS_KEY: &str = "\",\"headers\":[";
const BODY_KEY: &str = "],\"body\":\"";
const CLOSE: &str = "\"}";

/// Serialized canonical document
///
/// Immutable once rendered. Two documents compare equal exactly when their
/// bytes are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalDocument(Bytes);

impl CanonicalDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The document as text; every byte is ASCII.
    pub fn as_str(&self) -> &str {
        // Only ASCII literals and base64 output are ever written
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalDocument {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Renders `request` as a canonical document.
///
/// Keys always appear in the order `method, uri, version, headers, body`.
/// Every payload is base64, so only the fixed structural literals are ever
/// written unencoded. The output buffer is sized exactly before writing and
/// belongs to this call alone.
///
/// ```
/// use bytes::Bytes;
/// use reqecho::accumulator::{HeaderField, HttpVersion, RawRequest};
/// use reqecho::document::render;
///
/// let request = RawRequest {
///     method: Bytes::from_static(b"GET"),
///     uri: Bytes::from_static(b"/foo?bar=baz"),
///     version: HttpVersion::HTTP_11,
///     headers: vec![HeaderField::new("Host", "example.com")],
///     body: Bytes::new(),
/// };
/// assert_eq!(
///     render(&request).as_str(),
///     r#"{"method":"R0VU","uri":"L2Zvbz9iYXI9YmF6","version":"SFRUUC8xLjE=","headers":[["SG9zdA==","ZXhhbXBsZS5jb20="]],"body":""}"#
/// );
/// ```
pub fn render(request: &RawRequest) -> CanonicalDocument {
    let version = request.version.to_string();

    let headers_len: usize = request
        .headers
        .iter()
        .map(|h| "[\"\",\"\"]".len() + encoded_len(h.name.len()) + encoded_len(h.value.len()))
        .sum::<usize>()
        + request.headers.len().saturating_sub(1);
    let capacity = METHOD_KEY.len()
        + encoded_len(request.method.len())
        + URI_KEY.len()
        + encoded_len(request.uri.len())
        + VERSION_KEY.len()
        + encoded_len(version.len())
        + HEADERS_KEY.len()
        + headers_len
        + BODY_KEY.len()
        + encoded_len(request.body.len())
        + CLOSE.len();

    let mut out = String::with_capacity(capacity);
    out.push_str(METHOD_KEY);
    encode_into(&request.method, &mut out);
    out.push_str(URI_KEY);
    encode_into(&request.uri, &mut out);
    out.push_str(VERSION_KEY);
    encode_into(version.as_bytes(), &mut out);
    out.push_str(HEADERS_KEY);
    for (i, header) in request.headers.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str("[\"");
        encode_into(&header.name, &mut out);
        out.push_str("\",\"");
        encode_into(&header.value, &mut out);
        out.push_str("\"]");
    }
    out.push_str(BODY_KEY);
    encode_into(&request.body, &mut out);
    out.push_str(CLOSE);

    debug_assert_eq!(out.len(), capacity);
    CanonicalDocument(Bytes::from(out))
}
