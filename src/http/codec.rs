use crate::accumulator::{HeaderField, HttpVersion, RequestEvent, RequestHead};
use bytes::{Buf, Bytes, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// Most header lines accepted in one request head
pub const MAX_HEADERS: usize = 128;

/// Longest accepted chunk-size line, extensions included
const MAX_CHUNK_LINE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(#[from] httparse::Error),
    #[error("request head exceeds {max} bytes")]
    HeadTooLarge { max: usize },
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("unsupported transfer-encoding")]
    UnsupportedTransferEncoding,
    #[error("invalid chunked body: {0}")]
    InvalidChunk(&'static str),
    #[error("connection closed in the middle of a request")]
    UnexpectedEof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Head,
    Length(u64),
    ChunkSize,
    ChunkData(u64),
    ChunkDataEnd,
    Trailers,
}

/// Splits an HTTP/1.x byte stream into request events
///
/// Yields `Head`, then zero or more `Body` chunks, then `End` for each
/// request, and starts over for the next request on the same connection.
/// Header names and values are passed through untouched; the codec only looks
/// at `Transfer-Encoding` and `Content-Length` to find where the body ends.
#[derive(Debug)]
pub struct RequestCodec {
    state: DecodeState,
    max_head_size: usize,
}

impl RequestCodec {
    pub fn new(max_head_size: usize) -> Self {
        Self {
            state: DecodeState::Head,
            max_head_size,
        }
    }

    /// Whether the codec sits between requests
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::Head
    }

    fn decode_head(&mut self, src: &mut BytesMut) -> Result<Option<RequestEvent>, CodecError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_len = match req.parse(src)? {
            httparse::Status::Complete(n) => n,
            httparse::Status::Partial => {
                if src.len() > self.max_head_size {
                    return Err(CodecError::HeadTooLarge {
                        max: self.max_head_size,
                    });
                }
                return Ok(None);
            }
        };
        if parsed_len > self.max_head_size {
            return Err(CodecError::HeadTooLarge {
                max: self.max_head_size,
            });
        }

        let mut chunked = false;
        let mut has_transfer_encoding = false;
        let mut content_length: Option<u64> = None;
        let mut fields = Vec::with_capacity(req.headers.len());
        for header in req.headers.iter() {
            if header.name.eq_ignore_ascii_case("transfer-encoding") {
                has_transfer_encoding = true;
                chunked = ends_with_chunked(header.value);
            } else if header.name.eq_ignore_ascii_case("content-length") {
                let len = parse_content_length(header.value)?;
                if content_length.is_some_and(|prev| prev != len) {
                    return Err(CodecError::InvalidContentLength);
                }
                content_length = Some(len);
            }
            fields.push(HeaderField::new(
                Bytes::copy_from_slice(header.name.as_bytes()),
                Bytes::copy_from_slice(header.value),
            ));
        }
        if has_transfer_encoding && !chunked {
            return Err(CodecError::UnsupportedTransferEncoding);
        }

        let target = req.path.unwrap_or_default().as_bytes();
        let (path, query) = match target.iter().position(|&b| b == b'?') {
            Some(i) => (&target[..i], Some(Bytes::copy_from_slice(&target[i + 1..]))),
            None => (target, None),
        };
        let head = RequestHead {
            method: Bytes::copy_from_slice(req.method.unwrap_or_default().as_bytes()),
            path: Bytes::copy_from_slice(path),
            query,
            version: HttpVersion::new(1, req.version.unwrap_or(1)),
            headers: fields,
        };

        src.advance(parsed_len);
        // Transfer-Encoding overrides Content-Length
        self.state = if chunked {
            DecodeState::ChunkSize
        } else {
            DecodeState::Length(content_length.unwrap_or(0))
        };
        Ok(Some(RequestEvent::Head(head)))
    }
}

impl Decoder for RequestCodec {
    type Item = RequestEvent;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RequestEvent>, CodecError> {
        loop {
            match self.state {
                DecodeState::Head => return self.decode_head(src),
                DecodeState::Length(0) => {
                    self.state = DecodeState::Head;
                    return Ok(Some(RequestEvent::End));
                }
                DecodeState::Length(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let n = take_len(remaining, src);
                    self.state = DecodeState::Length(remaining - n as u64);
                    return Ok(Some(RequestEvent::Body(src.split_to(n).freeze())));
                }
                DecodeState::ChunkSize => {
                    let Some(line_end) = find_crlf(src) else {
                        if src.len() > MAX_CHUNK_LINE {
                            return Err(CodecError::InvalidChunk("chunk size line too long"));
                        }
                        return Ok(None);
                    };
                    if line_end > MAX_CHUNK_LINE {
                        return Err(CodecError::InvalidChunk("chunk size line too long"));
                    }
                    let size = parse_chunk_size(&src[..line_end])?;
                    src.advance(line_end + 2);
                    self.state = if size == 0 {
                        DecodeState::Trailers
                    } else {
                        DecodeState::ChunkData(size)
                    };
                }
                DecodeState::ChunkData(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let n = take_len(remaining, src);
                    let left = remaining - n as u64;
                    self.state = if left == 0 {
                        DecodeState::ChunkDataEnd
                    } else {
                        DecodeState::ChunkData(left)
                    };
                    return Ok(Some(RequestEvent::Body(src.split_to(n).freeze())));
                }
                DecodeState::ChunkDataEnd => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    if &src[..2] != b"\r\n" {
                        return Err(CodecError::InvalidChunk("missing CRLF after chunk data"));
                    }
                    src.advance(2);
                    self.state = DecodeState::ChunkSize;
                }
                DecodeState::Trailers => {
                    let Some(line_end) = find_crlf(src) else {
                        if src.len() > self.max_head_size {
                            return Err(CodecError::HeadTooLarge {
                                max: self.max_head_size,
                            });
                        }
                        return Ok(None);
                    };
                    // Trailer fields are consumed but not echoed
                    src.advance(line_end + 2);
                    if line_end == 0 {
                        self.state = DecodeState::Head;
                        return Ok(Some(RequestEvent::End));
                    }
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RequestEvent>, CodecError> {
        match self.decode(src)? {
            Some(event) => Ok(Some(event)),
            None if self.is_idle() && src.is_empty() => Ok(None),
            None => Err(CodecError::UnexpectedEof),
        }
    }
}

/// Whether the client asked to keep the connection open after this request
pub fn keep_alive(head: &RequestHead) -> bool {
    let mut close = head.version == HttpVersion::HTTP_10;
    for header in &head.headers {
        if !header.name.eq_ignore_ascii_case(b"connection") {
            continue;
        }
        for token in header.value.split(|&b| b == b',') {
            let token = token.trim_ascii();
            if token.eq_ignore_ascii_case(b"close") {
                return false;
            }
            if token.eq_ignore_ascii_case(b"keep-alive") {
                close = false;
            }
        }
    }
    !close
}

fn take_len(remaining: u64, src: &BytesMut) -> usize {
    usize::try_from(remaining).map_or(src.len(), |r| r.min(src.len()))
}

fn find_crlf(src: &[u8]) -> Option<usize> {
    src.windows(2).position(|w| w == b"\r\n")
}

fn ends_with_chunked(value: &[u8]) -> bool {
    value
        .split(|&b| b == b',')
        .map(<[u8]>::trim_ascii)
        .filter(|token| !token.is_empty())
        .last()
        .is_some_and(|token| token.eq_ignore_ascii_case(b"chunked"))
}

fn parse_content_length(value: &[u8]) -> Result<u64, CodecError> {
    let value = value.trim_ascii();
    if value.is_empty() || !value.iter().all(u8::is_ascii_digit) {
        return Err(CodecError::InvalidContentLength);
    }
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(CodecError::InvalidContentLength)
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, CodecError> {
    let size = match line.iter().position(|&b| b == b';') {
        Some(i) => &line[..i],
        None => line,
    }
    .trim_ascii();
    if size.is_empty() || !size.iter().all(u8::is_ascii_hexdigit) {
        return Err(CodecError::InvalidChunk("chunk size is not a hex number"));
    }
    std::str::from_utf8(size)
        .ok()
        .and_then(|s| u64::from_str_radix(s, 16).ok())
        .ok_or(CodecError::InvalidChunk("chunk size overflows"))
}
