use http::{HeaderName, HeaderValue, StatusCode, Version};

use crate::error::ParseError;
use crate::response::Response;

/// Parse a complete header block, status line through the terminating blank line.
///
/// `N` bounds the number of headers. The caller has already located the
/// `\r\n\r\n` terminator, which means a partial parse is an error here.
pub(crate) fn parse_response<const N: usize>(input: &[u8]) -> Result<Response, ParseError> {
    let mut headers = [httparse::EMPTY_HEADER; N];
    let mut res = httparse::Response::new(&mut headers);

    match res.parse(input)? {
        httparse::Status::Complete(_) => {}
        httparse::Status::Partial => {
            return Err(ParseError::HttpParseFail("incomplete header block".into()));
        }
    }

    let version = match res.version {
        Some(1) => Version::HTTP_11,
        Some(0) => Version::HTTP_10,
        _ => return Err(ParseError::UnsupportedVersion),
    };

    let code = res
        .code
        .ok_or_else(|| ParseError::HttpParseFail("missing status code".into()))?;
    let status = StatusCode::from_u16(code)
        .map_err(|_| ParseError::HttpParseFail(format!("invalid status code: {}", code)))?;

    let reason = res
        .reason
        .filter(|r| !r.is_empty())
        .map(|r| r.to_string());

    let mut parsed = Vec::with_capacity(res.headers.len());
    for h in res.headers.iter() {
        let name = HeaderName::from_bytes(h.name.as_bytes())
            .map_err(|e| ParseError::BadHeader(e.to_string()))?;
        let value =
            HeaderValue::from_bytes(h.value).map_err(|e| ParseError::BadHeader(e.to_string()))?;
        parsed.push((name, value));
    }

    Ok(Response {
        version,
        status,
        reason,
        headers: parsed,
    })
}
