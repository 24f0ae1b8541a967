use std::io::Write;

use http::{HeaderName, HeaderValue, Method};

use crate::error::ParseError;

/// An outgoing request without body.
///
/// Headers are written in insertion order. The `host` header should be added
/// first, but nothing enforces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    target: String,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Request {
    /// A GET request for `target`, which is the path plus optional `?query`.
    pub fn get(target: impl Into<String>) -> Self {
        Request {
            method: Method::GET,
            target: target.into(),
            headers: Vec::new(),
        }
    }

    /// Append a header. Duplicates are kept.
    pub fn header<K, V>(mut self, key: K, value: V) -> Result<Self, ParseError>
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        let name = HeaderName::try_from(key).map_err(|e| bad_header(e.into()))?;
        let value = HeaderValue::try_from(value).map_err(|e| bad_header(e.into()))?;
        self.headers.push((name, value));
        Ok(self)
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target, i.e. `/path?query`.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Headers in the order they will be written.
    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    /// Serialize the request line, headers and the terminating blank line.
    ///
    /// The output only depends on the request, the same request always gives
    /// the same bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        self.write_to(&mut out);
        out
    }

    /// Append the serialized request to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        // Writing to a Vec cannot fail.
        let _ = write!(out, "{} {} HTTP/1.1\r\n", self.method, self.target);

        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        out.extend_from_slice(b"\r\n");
    }
}

fn bad_header(e: http::Error) -> ParseError {
    ParseError::BadHeader(e.to_string())
}
