use std::ops::Range;
use std::str;

use http::{header, HeaderName, HeaderValue, StatusCode};

use crate::error::ParseError;
use crate::ext::{HeaderIterExt, StatusExt};
use crate::util::find_crlf;

/// How the response body is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// No body, either by status or `content-length: 0`.
    NoBody,
    /// `content-length` with the declared number of bytes.
    LengthDelimited(u64),
    /// `transfer-encoding: chunked`.
    Chunked,
    /// Neither header present. The body ends when the server closes the connection.
    CloseDelimited,
}

#[derive(Debug)]
pub(crate) enum BodyReader {
    NoBody,
    LengthDelimited { total: u64, left: u64 },
    Chunked(Dechunker),
    CloseDelimited { ended: bool },
}

impl BodyReader {
    /// Decide body framing for a final (non 1xx) response.
    pub fn for_response(
        status: StatusCode,
        headers: &[(HeaderName, HeaderValue)],
    ) -> Result<BodyReader, ParseError> {
        if status.forbids_body() {
            return Ok(BodyReader::NoBody);
        }

        let encodings = headers.iter().comma_values(&header::TRANSFER_ENCODING);
        let has_length = headers.iter().any(|(k, _)| *k == header::CONTENT_LENGTH);

        if !encodings.is_empty() {
            if has_length {
                return Err(ParseError::ContentLengthWithTransferEncoding);
            }
            if encodings != ["chunked"] {
                return Err(ParseError::UnsupportedTransferEncoding(encodings.join(", ")));
            }
            return Ok(BodyReader::Chunked(Dechunker::default()));
        }

        if has_length {
            let len = content_length(headers)?;
            return Ok(if len == 0 {
                BodyReader::NoBody
            } else {
                BodyReader::LengthDelimited {
                    total: len,
                    left: len,
                }
            });
        }

        Ok(BodyReader::CloseDelimited { ended: false })
    }

    pub fn body_mode(&self) -> BodyMode {
        match self {
            BodyReader::NoBody => BodyMode::NoBody,
            BodyReader::LengthDelimited { total, .. } => BodyMode::LengthDelimited(*total),
            BodyReader::Chunked(_) => BodyMode::Chunked,
            BodyReader::CloseDelimited { .. } => BodyMode::CloseDelimited,
        }
    }

    pub fn is_ended(&self) -> bool {
        match self {
            BodyReader::NoBody => true,
            BodyReader::LengthDelimited { left, .. } => *left == 0,
            BodyReader::Chunked(d) => d.is_ended(),
            BodyReader::CloseDelimited { ended } => *ended,
        }
    }

    pub fn is_close_delimited(&self) -> bool {
        matches!(self, BodyReader::CloseDelimited { .. })
    }

    /// Mark a close delimited body as complete. Called when the peer closes.
    pub fn finish_close_delimited(&mut self) {
        if let BodyReader::CloseDelimited { ended } = self {
            *ended = true;
        }
    }

    /// Read from `input`.
    ///
    /// Returns `(input consumed, body data)` where body data is a range in `input`.
    /// `(0, None)` means more input is needed.
    pub fn read(&mut self, input: &[u8]) -> Result<(usize, Option<Range<usize>>), ParseError> {
        if input.is_empty() {
            return Ok((0, None));
        }

        match self {
            BodyReader::NoBody | BodyReader::LengthDelimited { left: 0, .. } => Ok((0, None)),
            BodyReader::LengthDelimited { left, .. } => {
                let n = (*left).min(input.len() as u64) as usize;
                *left -= n as u64;
                Ok((n, Some(0..n)))
            }
            BodyReader::Chunked(d) => d.read(input),
            // Still drains after the peer closed, the buffer may hold the tail.
            BodyReader::CloseDelimited { .. } => Ok((input.len(), Some(0..input.len()))),
        }
    }
}

fn content_length(headers: &[(HeaderName, HeaderValue)]) -> Result<u64, ParseError> {
    let mut found: Option<u64> = None;

    for v in headers.iter().comma_values(&header::CONTENT_LENGTH) {
        // Only 1*DIGIT. u64::from_str would also take a leading '+'.
        if !v.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::BadContentLengthHeader);
        }
        let len: u64 = v.parse().map_err(|_| ParseError::BadContentLengthHeader)?;
        match found {
            Some(prev) if prev != len => return Err(ParseError::TooManyContentLengthHeaders),
            _ => found = Some(len),
        }
    }

    // Present but no readable value, e.g. non-ascii or empty.
    found.ok_or(ParseError::BadContentLengthHeader)
}

/// Max length of a chunk size line or a trailer line, excluding the CRLF.
const MAX_CHUNK_LINE: usize = 4096;

#[derive(Debug, Default)]
pub(crate) struct Dechunker {
    state: ChunkState,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    #[default]
    Size,
    Data(u64),
    DataCrLf,
    Trailer,
    Ended,
}

impl Dechunker {
    fn is_ended(&self) -> bool {
        self.state == ChunkState::Ended
    }

    fn read(&mut self, input: &[u8]) -> Result<(usize, Option<Range<usize>>), ParseError> {
        match self.state {
            ChunkState::Size => {
                let Some(end) = find_line_end(input)? else {
                    return Ok((0, None));
                };
                let len = parse_chunk_len(&input[..end])?;
                self.state = if len == 0 {
                    ChunkState::Trailer
                } else {
                    ChunkState::Data(len)
                };
                Ok((end + 2, None))
            }
            ChunkState::Data(left) => {
                let n = left.min(input.len() as u64) as usize;
                let left = left - n as u64;
                self.state = if left == 0 {
                    ChunkState::DataCrLf
                } else {
                    ChunkState::Data(left)
                };
                Ok((n, Some(0..n)))
            }
            ChunkState::DataCrLf => {
                if input.len() < 2 {
                    if input[0] != b'\r' {
                        return Err(ParseError::ChunkExpectedCrLf);
                    }
                    return Ok((0, None));
                }
                if &input[..2] != b"\r\n" {
                    return Err(ParseError::ChunkExpectedCrLf);
                }
                self.state = ChunkState::Size;
                Ok((2, None))
            }
            ChunkState::Trailer => {
                let Some(end) = find_line_end(input)? else {
                    return Ok((0, None));
                };
                if end == 0 {
                    self.state = ChunkState::Ended;
                } else {
                    debug!("Discard chunked trailer ({} bytes)", end);
                }
                Ok((end + 2, None))
            }
            ChunkState::Ended => Ok((0, None)),
        }
    }
}

/// Find the CRLF ending a chunk line, only looking within [`MAX_CHUNK_LINE`].
fn find_line_end(input: &[u8]) -> Result<Option<usize>, ParseError> {
    let window = &input[..input.len().min(MAX_CHUNK_LINE + 2)];

    match find_crlf(window) {
        Some(end) => Ok(Some(end)),
        None if window.len() == MAX_CHUNK_LINE + 2 => Err(ParseError::ChunkLineTooLong),
        None => Ok(None),
    }
}

fn parse_chunk_len(line: &[u8]) -> Result<u64, ParseError> {
    let line = str::from_utf8(line).map_err(|_| ParseError::ChunkLenNotAscii)?;
    if !line.is_ascii() {
        return Err(ParseError::ChunkLenNotAscii);
    }

    // Chunk extensions follow a ';' and are ignored.
    let len = line.split(';').next().unwrap_or_default().trim();

    if len.is_empty() || !len.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ParseError::ChunkLenNotANumber);
    }

    u64::from_str_radix(len, 16).map_err(|_| ParseError::ChunkLenNotANumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> Vec<(HeaderName, HeaderValue)> {
        pairs
            .iter()
            .map(|(k, v)| {
                (
                    HeaderName::from_static(k),
                    HeaderValue::from_static(v),
                )
            })
            .collect()
    }

    fn mode(status: u16, pairs: &[(&'static str, &'static str)]) -> Result<BodyMode, ParseError> {
        let status = StatusCode::from_u16(status).unwrap();
        BodyReader::for_response(status, &headers(pairs)).map(|r| r.body_mode())
    }

    /// Drain a reader over the whole input, collecting body data.
    fn read_all(reader: &mut BodyReader, mut input: &[u8]) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::new();
        loop {
            let (used, data) = reader.read(input)?;
            if let Some(r) = data {
                out.extend_from_slice(&input[r]);
            }
            input = &input[used..];
            if used == 0 {
                return Ok(out);
            }
        }
    }

    #[test]
    fn framing_decisions() {
        assert_eq!(mode(200, &[("content-length", "5")]), Ok(BodyMode::LengthDelimited(5)));
        assert_eq!(mode(200, &[("content-length", "0")]), Ok(BodyMode::NoBody));
        assert_eq!(mode(200, &[("transfer-encoding", "chunked")]), Ok(BodyMode::Chunked));
        assert_eq!(mode(200, &[]), Ok(BodyMode::CloseDelimited));
        assert_eq!(mode(204, &[("content-length", "10")]), Ok(BodyMode::NoBody));
        assert_eq!(mode(304, &[]), Ok(BodyMode::NoBody));
    }

    #[test]
    fn content_length_with_transfer_encoding() {
        let err = mode(
            200,
            &[("content-length", "5"), ("transfer-encoding", "chunked")],
        )
        .unwrap_err();
        assert_eq!(err, ParseError::ContentLengthWithTransferEncoding);
    }

    #[test]
    fn unsupported_transfer_encoding() {
        let err = mode(200, &[("transfer-encoding", "gzip, chunked")]).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnsupportedTransferEncoding("gzip, chunked".into())
        );
    }

    #[test]
    fn conflicting_content_lengths() {
        let err = mode(200, &[("content-length", "5"), ("content-length", "6")]).unwrap_err();
        assert_eq!(err, ParseError::TooManyContentLengthHeaders);

        let ok = mode(200, &[("content-length", "5"), ("content-length", "5")]);
        assert_eq!(ok, Ok(BodyMode::LengthDelimited(5)));
    }

    #[test]
    fn bad_content_length() {
        let err = mode(200, &[("content-length", "five")]).unwrap_err();
        assert_eq!(err, ParseError::BadContentLengthHeader);

        let err = mode(200, &[("content-length", "-1")]).unwrap_err();
        assert_eq!(err, ParseError::BadContentLengthHeader);

        let err = mode(200, &[("content-length", "+5")]).unwrap_err();
        assert_eq!(err, ParseError::BadContentLengthHeader);

        let err = mode(200, &[("content-length", "5 5")]).unwrap_err();
        assert_eq!(err, ParseError::BadContentLengthHeader);
    }

    #[test]
    fn length_delimited_stops_at_length() {
        let mut reader = BodyReader::LengthDelimited { total: 5, left: 5 };
        let body = read_all(&mut reader, b"hello world").unwrap();
        assert_eq!(body, b"hello");
        assert!(reader.is_ended());
    }

    #[test]
    fn close_delimited_until_finished() {
        let mut reader = BodyReader::CloseDelimited { ended: false };
        let body = read_all(&mut reader, b"anything").unwrap();
        assert_eq!(body, b"anything");
        assert!(!reader.is_ended());

        reader.finish_close_delimited();
        assert!(reader.is_ended());
    }

    #[test]
    fn dechunk_with_extension_and_trailer() {
        let mut reader = BodyReader::Chunked(Dechunker::default());
        let input = b"5;name=x\r\nhello\r\n6\r\n world\r\n0\r\nExpires: never\r\n\r\n";
        let body = read_all(&mut reader, input).unwrap();
        assert_eq!(body, b"hello world");
        assert!(reader.is_ended());
    }

    #[test]
    fn dechunk_waits_for_complete_size_line() {
        let mut reader = BodyReader::Chunked(Dechunker::default());
        assert_eq!(reader.read(b"1").unwrap(), (0, None));
        assert_eq!(reader.read(b"1\r").unwrap(), (0, None));
        assert_eq!(reader.read(b"1\r\n").unwrap(), (3, None));
    }

    #[test]
    fn chunk_len_not_ascii() {
        let mut reader = BodyReader::Chunked(Dechunker::default());
        let err = read_all(&mut reader, b"\xFF\r\ndata\r\n").unwrap_err();
        assert_eq!(err, ParseError::ChunkLenNotAscii);
    }

    #[test]
    fn chunk_len_not_a_number() {
        let mut reader = BodyReader::Chunked(Dechunker::default());
        let err = read_all(&mut reader, b"xyz\r\ndata\r\n").unwrap_err();
        assert_eq!(err, ParseError::ChunkLenNotANumber);

        let mut reader = BodyReader::Chunked(Dechunker::default());
        let err = read_all(&mut reader, b"+5\r\nhello\r\n").unwrap_err();
        assert_eq!(err, ParseError::ChunkLenNotANumber);

        let mut reader = BodyReader::Chunked(Dechunker::default());
        let err = read_all(&mut reader, b"\r\n").unwrap_err();
        assert_eq!(err, ParseError::ChunkLenNotANumber);
    }

    #[test]
    fn chunk_line_too_long() {
        let mut reader = BodyReader::Chunked(Dechunker::default());

        let line = vec![b'0'; MAX_CHUNK_LINE + 1];
        assert_eq!(reader.read(&line).unwrap(), (0, None));

        let line = vec![b'0'; MAX_CHUNK_LINE + 2];
        assert_eq!(reader.read(&line).unwrap_err(), ParseError::ChunkLineTooLong);

        // At the limit is fine.
        let mut reader = BodyReader::Chunked(Dechunker::default());
        let mut line = vec![b'0'; MAX_CHUNK_LINE - 1];
        line.extend_from_slice(b"5\r\n");
        assert_eq!(reader.read(&line).unwrap(), (MAX_CHUNK_LINE + 2, None));
    }

    #[test]
    fn trailer_line_too_long() {
        let mut reader = BodyReader::Chunked(Dechunker::default());
        assert_eq!(reader.read(b"0\r\n").unwrap(), (3, None));

        let line = vec![b'x'; MAX_CHUNK_LINE + 10];
        assert_eq!(reader.read(&line).unwrap_err(), ParseError::ChunkLineTooLong);
    }

    #[test]
    fn chunk_expected_crlf() {
        let mut reader = BodyReader::Chunked(Dechunker::default());
        let err = read_all(&mut reader, b"5\r\nhelloXY0\r\n\r\n").unwrap_err();
        assert_eq!(err, ParseError::ChunkExpectedCrLf);
    }
}
