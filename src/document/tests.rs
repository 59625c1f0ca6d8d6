use super::*;
use crate::accumulator::{HeaderField, HttpVersion, RawRequest};
use bytes::Bytes;

fn example_request() -> RawRequest {
    RawRequest {
        method: Bytes::from_static(b"GET"),
        uri: Bytes::from_static(b"/foo?bar=baz"),
        version: HttpVersion::HTTP_11,
        headers: vec![HeaderField::new("Host", "example.com")],
        body: Bytes::new(),
    }
}

#[test]
fn test_render_example_exactly() {
    assert_eq!(
        render(&example_request()).as_str(),
        r#"{"method":"R0VU","uri":"L2Zvbz9iYXI9YmF6","version":"SFRUUC8xLjE=","headers":[["SG9zdA==","ZXhhbXBsZS5jb20="]],"body":""}"#
    );
}

#[test]
fn test_render_no_headers() {
    let request = RawRequest {
        headers: Vec::new(),
        ..example_request()
    };
    let doc = render(&request);
    assert!(doc.as_str().contains(r#""headers":[],"body":"""#));
}

#[test]
fn test_render_preserves_duplicate_headers_in_order() {
    let request = RawRequest {
        headers: vec![
            HeaderField::new("Host", "a"),
            HeaderField::new("X", "1"),
            HeaderField::new("Host", "b"),
        ],
        ..example_request()
    };
    let doc = render(&request);
    assert!(doc.as_str().contains(
        r#""headers":[["SG9zdA==","YQ=="],["WA==","MQ=="],["SG9zdA==","Yg=="]]"#
    ));

    let parsed = parse(doc.as_bytes()).unwrap();
    assert_eq!(parsed.headers.len(), 3);
    assert_eq!(&parsed.headers[0].0[..], b"Host");
    assert_eq!(&parsed.headers[0].1[..], b"a");
    assert_eq!(&parsed.headers[1].0[..], b"X");
    assert_eq!(&parsed.headers[2].0[..], b"Host");
    assert_eq!(&parsed.headers[2].1[..], b"b");
}

#[test]
fn test_render_is_deterministic() {
    let request = RawRequest {
        body: Bytes::from_static(b"\x00\x01binary\r\n\xff"),
        ..example_request()
    };
    assert_eq!(render(&request), render(&request));
    assert_eq!(render(&request).as_bytes(), render(&request.clone()).as_bytes());
}

#[test]
fn test_render_version_is_computed() {
    let request = RawRequest {
        version: HttpVersion::HTTP_10,
        ..example_request()
    };
    assert!(render(&request).as_str().contains(r#""version":"SFRUUC8xLjA=""#));

    let request = RawRequest {
        version: HttpVersion::new(1, 7),
        ..example_request()
    };
    let parsed = parse(render(&request).as_bytes()).unwrap();
    assert_eq!(&parsed.version[..], b"HTTP/1.7");
}

#[test]
fn test_render_length_matches_content() {
    let request = RawRequest {
        headers: vec![HeaderField::new("A", ""), HeaderField::new("", "B")],
        body: Bytes::from(vec![7u8; 100_000]),
        ..example_request()
    };
    let doc = render(&request);
    assert_eq!(doc.len(), doc.as_str().len());
    assert!(!doc.is_empty());
}

#[test]
fn test_parse_inverts_render() {
    let all_bytes: Vec<u8> = (0..=255u8).collect();
    let request = RawRequest {
        method: Bytes::from_static(b"G\x00T"),
        uri: Bytes::from(all_bytes.clone()),
        version: HttpVersion::HTTP_11,
        headers: vec![HeaderField::new(Bytes::from(all_bytes.clone()), "\"quoted\"")],
        body: Bytes::from(all_bytes),
    };
    let parsed = parse(render(&request).as_bytes()).unwrap();
    assert!(parsed.matches(&request));
    assert_eq!(parsed, ParsedDocument::from(&request));
}

#[test]
fn test_parse_empty_body() {
    let parsed = parse(render(&example_request()).as_bytes()).unwrap();
    assert!(parsed.body.is_empty());
}

#[test]
fn test_parse_rejects_malformed_documents() {
    assert!(matches!(parse(b"not json"), Err(DocumentError::Json(_))));
    assert!(matches!(parse(b"[]"), Err(DocumentError::NotAnObject)));
    assert!(matches!(
        parse(br#"{"method":"","uri":"","version":"","headers":[]}"#),
        Err(DocumentError::MissingKey("body"))
    ));
    assert!(matches!(
        parse(br#"{"method":1,"uri":"","version":"","headers":[],"body":""}"#),
        Err(DocumentError::WrongType { key: "method", .. })
    ));
    assert!(matches!(
        parse(br#"{"method":"","uri":"","version":"","headers":[["a"]],"body":""}"#),
        Err(DocumentError::WrongType { key: "headers", .. })
    ));
    assert!(matches!(
        parse(br#"{"method":"!!","uri":"","version":"","headers":[],"body":""}"#),
        Err(DocumentError::Encoding { key: "method", .. })
    ));
}

#[test]
fn test_diff_identical_documents() {
    let a = parse(render(&example_request()).as_bytes()).unwrap();
    assert!(diff(&a, &a.clone()).is_empty());
}

#[test]
fn test_diff_reports_each_field() {
    let a = ParsedDocument::from(&example_request());
    let mut b = a.clone();
    b.uri = Bytes::from_static(b"/foo");
    b.version = Bytes::from_static(b"1.1");
    b.body = Bytes::from_static(b"x");
    assert_eq!(
        diff(&a, &b),
        vec![Discrepancy::Uri, Discrepancy::Version, Discrepancy::Body]
    );

    let mut c = a.clone();
    c.headers.push((Bytes::from_static(b"Host"), Bytes::from_static(b"b")));
    assert_eq!(
        diff(&a, &c),
        vec![Discrepancy::HeaderCount { left: 1, right: 2 }]
    );

    let mut d = a.clone();
    d.headers[0].0 = Bytes::from_static(b"host");
    assert_eq!(diff(&a, &d), vec![Discrepancy::Headers]);
    assert_eq!(Discrepancy::Headers.to_string(), "headers differ");
}
