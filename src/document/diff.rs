use super::ParsedDocument;
use std::fmt;

/// A field on which two backends' documents disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discrepancy {
    Method,
    Uri,
    Version,
    /// Same header list length, but some pair differs in name, value or position
    Headers,
    /// Different number of header pairs
    HeaderCount { left: usize, right: usize },
    Body,
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::Method => f.write_str("method differs"),
            Discrepancy::Uri => f.write_str("uri differs"),
            Discrepancy::Version => f.write_str("version differs"),
            Discrepancy::Headers => f.write_str("headers differ"),
            Discrepancy::HeaderCount { left, right } => {
                write!(f, "header count differs ({left} vs {right})")
            }
            Discrepancy::Body => f.write_str("body differs"),
        }
    }
}

/// Lists every field on which `left` and `right` disagree, in document key
/// order. Empty when the documents describe the same request.
pub fn diff(left: &ParsedDocument, right: &ParsedDocument) -> Vec<Discrepancy> {
    let mut found = Vec::new();
    if left.method != right.method {
        found.push(Discrepancy::Method);
    }
    if left.uri != right.uri {
        found.push(Discrepancy::Uri);
    }
    if left.version != right.version {
        found.push(Discrepancy::Version);
    }
    if left.headers.len() != right.headers.len() {
        found.push(Discrepancy::HeaderCount {
            left: left.headers.len(),
            right: right.headers.len(),
        });
    } else if left.headers != right.headers {
        found.push(Discrepancy::Headers);
    }
    if left.body != right.body {
        found.push(Discrepancy::Body);
    }
    found
}
