use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use http::uri::{Authority, Uri};

use crate::Error;

/// Where to connect and what to ask for, resolved from a url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub https: bool,
    /// Host to connect to and to verify the certificate against. No brackets.
    pub host: String,
    pub port: u16,
    /// Value for the `host` header, with port if not the scheme default.
    pub host_header: String,
    /// Path plus `?query`.
    pub request_target: String,
    /// `Basic ...` from userinfo in the url.
    pub authorization: Option<String>,
}

impl Target {
    pub fn parse(url: &str) -> Result<Target, Error> {
        let uri: Uri = url
            .parse()
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;

        let https = match uri.scheme_str() {
            Some(s) if s.eq_ignore_ascii_case("https") => true,
            Some(s) if s.eq_ignore_ascii_case("http") => false,
            Some(s) => return Err(Error::InvalidUrl(format!("unsupported scheme: {}", s))),
            None => return Err(Error::InvalidUrl(format!("missing scheme: {}", url))),
        };

        let authority = uri
            .authority()
            .ok_or_else(|| Error::InvalidUrl(format!("missing host: {}", url)))?;

        let host = authority.host();
        if host.is_empty() {
            return Err(Error::InvalidUrl(format!("missing host: {}", url)));
        }

        let default_port = if https { 443 } else { 80 };
        let port = authority.port_u16().unwrap_or(default_port);

        let host_header = if port == default_port {
            host.to_string()
        } else {
            format!("{}:{}", host, port)
        };

        let mut request_target = match uri.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        if let Some(q) = uri.query().filter(|q| !q.is_empty()) {
            request_target.push('?');
            request_target.push_str(q);
        }

        Ok(Target {
            https,
            host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port,
            host_header,
            request_target,
            authorization: basic_auth(authority),
        })
    }
}

/// `Basic` credentials from the url userinfo. User and password are
/// percent-decoded separately, so an escaped `%3A` stays within its part.
fn basic_auth(authority: &Authority) -> Option<String> {
    let (userinfo, _) = authority.as_str().rsplit_once('@')?;

    let (user, pass) = userinfo.split_once(':').unwrap_or((userinfo, ""));

    let mut creds = percent_decode(user);
    creds.push(b':');
    creds.extend_from_slice(&percent_decode(pass));

    Some(format!("Basic {}", BASE64_STANDARD.encode(creds)))
}

/// Decode `%XX` escapes. Malformed escapes are kept as is.
fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    out
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|v| v as u8)
}
