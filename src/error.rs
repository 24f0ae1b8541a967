use std::fmt;
use std::io;

use crate::client::State;

/// Failures to frame an HTTP/1.1 response.
///
/// A [`Flow`](crate::client::Flow) that hits one of these becomes errored and
/// keeps returning the same value until it is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum ParseError {
    HttpParseFail(String),
    HttpParseTooManyHeaders,
    UnsupportedVersion,
    BadHeader(String),
    HeaderTooLarge,
    BadContentLengthHeader,
    TooManyContentLengthHeaders,
    ContentLengthWithTransferEncoding,
    UnsupportedTransferEncoding(String),
    ChunkLenNotAscii,
    ChunkLenNotANumber,
    ChunkExpectedCrLf,
    ChunkLineTooLong,
}

impl From<httparse::Error> for ParseError {
    fn from(value: httparse::Error) -> Self {
        match value {
            httparse::Error::TooManyHeaders => ParseError::HttpParseTooManyHeaders,
            _ => ParseError::HttpParseFail(value.to_string()),
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::HttpParseFail(v) => write!(f, "http parse fail: {}", v),
            ParseError::HttpParseTooManyHeaders => {
                write!(f, "http parse resulted in too many headers")
            }
            ParseError::UnsupportedVersion => write!(f, "unsupported http version"),
            ParseError::BadHeader(v) => write!(f, "bad header: {}", v),
            ParseError::HeaderTooLarge => write!(f, "response header block too large"),
            ParseError::BadContentLengthHeader => write!(f, "content-length header not a number"),
            ParseError::TooManyContentLengthHeaders => {
                write!(f, "conflicting content-length headers")
            }
            ParseError::ContentLengthWithTransferEncoding => {
                write!(f, "both content-length and transfer-encoding in response")
            }
            ParseError::UnsupportedTransferEncoding(v) => {
                write!(f, "unsupported transfer-encoding: {}", v)
            }
            ParseError::ChunkLenNotAscii => write!(f, "chunk length is not ascii"),
            ParseError::ChunkLenNotANumber => write!(f, "chunk length cannot be read as a number"),
            ParseError::ChunkExpectedCrLf => write!(f, "chunk expected crlf as next character"),
            ParseError::ChunkLineTooLong => write!(f, "chunk size or trailer line too long"),
        }
    }
}

/// Error type for toyhttp
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The url could not be parsed, has no host or an unsupported scheme.
    InvalidUrl(String),

    /// Connect, send or receive failed, or the peer closed the connection
    /// before the response was complete.
    Connection(io::Error),

    /// TLS handshake or certificate verification failed.
    Tls(String),

    /// Connecting, reading or writing exceeded the configured timeout.
    Timeout,

    /// The response could not be framed.
    Parse(ParseError),

    /// An operation was attempted in a state that does not allow it.
    InvalidState {
        /// State the flow was in.
        state: State,
        /// What was attempted.
        action: &'static str,
    },

    /// A state transition that would move the flow backwards or sideways.
    InvalidTransition {
        /// Current state.
        from: State,
        /// Rejected target state.
        to: State,
    },
}

impl Error {
    /// Map an io error from the socket, recognizing timeouts and TLS failures.
    pub(crate) fn from_io(e: io::Error) -> Error {
        if matches!(
            e.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        ) {
            return Error::Timeout;
        }

        let tls = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<rustls::Error>())
            .map(|t| t.to_string());

        match tls {
            Some(v) => Error::Tls(v),
            None => Error::Connection(e),
        }
    }

    pub(crate) fn unexpected_close(what: &str) -> Error {
        Error::Connection(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("connection closed {}", what),
        ))
    }
}

impl From<ParseError> for Error {
    fn from(value: ParseError) -> Self {
        Error::Parse(value)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => Some(e),
            Error::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidUrl(v) => write!(f, "invalid url: {}", v),
            Error::Connection(e) => write!(f, "connection error: {}", e),
            Error::Tls(v) => write!(f, "tls error: {}", v),
            Error::Timeout => write!(f, "timeout"),
            Error::Parse(e) => write!(f, "{}", e),
            Error::InvalidState { state, action } => {
                write!(f, "cannot {} in state {:?}", action, state)
            }
            Error::InvalidTransition { from, to } => {
                write!(f, "invalid state transition {:?} -> {:?}", from, to)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_httparse_error() {
        let error: ParseError = httparse::Error::HeaderName.into();
        assert!(matches!(error, ParseError::HttpParseFail(_)));

        let error: ParseError = httparse::Error::TooManyHeaders.into();
        assert_eq!(error, ParseError::HttpParseTooManyHeaders);
    }

    #[test]
    fn timeout_kinds_map_to_timeout() {
        let e = Error::from_io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert!(matches!(e, Error::Timeout));

        let e = Error::from_io(io::Error::new(io::ErrorKind::WouldBlock, "again"));
        assert!(matches!(e, Error::Timeout));
    }

    #[test]
    fn wrapped_rustls_error_maps_to_tls() {
        let inner = rustls::Error::General("bad cert".into());
        let e = Error::from_io(io::Error::new(io::ErrorKind::InvalidData, inner));
        let Error::Tls(msg) = e else {
            panic!("Expected Error::Tls");
        };
        assert!(msg.contains("bad cert"));
    }

    #[test]
    fn other_io_errors_map_to_connection() {
        let e = Error::from_io(io::Error::new(io::ErrorKind::ConnectionRefused, "no"));
        let Error::Connection(io) = e else {
            panic!("Expected Error::Connection");
        };
        assert_eq!(io.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[test]
    fn parse_error_display() {
        let e = Error::from(ParseError::ChunkExpectedCrLf);
        assert_eq!(e.to_string(), "chunk expected crlf as next character");
    }
}
