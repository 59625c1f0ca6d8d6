use crate::accumulator::RawRequest;
use crate::encoding::{self, EncodingError};
use bytes::Bytes;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document is not a JSON object")]
    NotAnObject,
    #[error("missing key `{0}`")]
    MissingKey(&'static str),
    #[error("key `{key}` must be {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },
    #[error("key `{key}` is not valid base64: {source}")]
    Encoding {
        key: &'static str,
        #[source]
        source: EncodingError,
    },
}

/// A canonical document decoded back into raw bytes
///
/// `version` is kept as the bytes the backend wrote, since documents from
/// other backends are not required to use the `HTTP/x.y` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub method: Bytes,
    pub uri: Bytes,
    pub version: Bytes,
    pub headers: Vec<(Bytes, Bytes)>,
    pub body: Bytes,
}

impl ParsedDocument {
    /// Whether this document describes exactly `request`
    pub fn matches(&self, request: &RawRequest) -> bool {
        self.method == request.method
            && self.uri == request.uri
            && self.version == request.version.to_string().as_bytes()
            && self.body == request.body
            && self.headers.len() == request.headers.len()
            && self
                .headers
                .iter()
                .zip(&request.headers)
                .all(|((name, value), h)| *name == h.name && *value == h.value)
    }
}

impl From<&RawRequest> for ParsedDocument {
    fn from(request: &RawRequest) -> Self {
        Self {
            method: request.method.clone(),
            uri: request.uri.clone(),
            version: Bytes::from(request.version.to_string()),
            headers: request
                .headers
                .iter()
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect(),
            body: request.body.clone(),
        }
    }
}

/// Parses a canonical document produced by any backend.
///
/// All five keys must be present with the right JSON types; each payload must
/// be valid base64. Key order is not checked here, byte equality of documents
/// covers that.
pub fn parse(document: &[u8]) -> Result<ParsedDocument, DocumentError> {
    let value: Value = serde_json::from_slice(document)?;
    let Value::Object(object) = value else {
        return Err(DocumentError::NotAnObject);
    };

    let headers = match object.get("headers") {
        None => return Err(DocumentError::MissingKey("headers")),
        Some(Value::Array(pairs)) => pairs
            .iter()
            .map(header_pair)
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(DocumentError::WrongType {
                key: "headers",
                expected: "an array",
            });
        }
    };

    Ok(ParsedDocument {
        method: payload(&object, "method")?,
        uri: payload(&object, "uri")?,
        version: payload(&object, "version")?,
        headers,
        body: payload(&object, "body")?,
    })
}

fn payload(object: &Map<String, Value>, key: &'static str) -> Result<Bytes, DocumentError> {
    match object.get(key) {
        None => Err(DocumentError::MissingKey(key)),
        Some(Value::String(text)) => decode_field(key, text),
        Some(_) => Err(DocumentError::WrongType {
            key,
            expected: "a string",
        }),
    }
}

fn header_pair(pair: &Value) -> Result<(Bytes, Bytes), DocumentError> {
    const WRONG: DocumentError = DocumentError::WrongType {
        key: "headers",
        expected: "an array of [name, value] string pairs",
    };
    match pair {
        Value::Array(items) => match items.as_slice() {
            [Value::String(name), Value::String(value)] => {
                Ok((decode_field("headers", name)?, decode_field("headers", value)?))
            }
            _ => Err(WRONG),
        },
        _ => Err(WRONG),
    }
}

fn decode_field(key: &'static str, text: &str) -> Result<Bytes, DocumentError> {
    encoding::decode(text)
        .map(Bytes::from)
        .map_err(|source| DocumentError::Encoding { key, source })
}
