use http::{HeaderName, HeaderValue, StatusCode, Version};

/// Status line and headers of a received response.
///
/// Headers are kept in the order they arrived, duplicates included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub(crate) version: Version,
    pub(crate) status: StatusCode,
    pub(crate) reason: Option<String>,
    pub(crate) headers: Vec<(HeaderName, HeaderValue)>,
}

impl Response {
    /// HTTP version from the status line. Either 1.0 or 1.1.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase, if the server sent a non-empty one.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// All headers in arrival order.
    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    /// First value of the named header.
    pub fn header<K>(&self, name: K) -> Option<&HeaderValue>
    where
        K: AsRef<str>,
    {
        let name = name.as_ref();
        self.headers
            .iter()
            .find(|(k, _)| k.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Convert to an `http::Response` for use with the wider http ecosystem.
    ///
    /// The reason phrase is dropped since `http` has no place for it.
    pub fn to_http(&self) -> http::Response<()> {
        let mut res = http::Response::new(());
        *res.status_mut() = self.status;
        *res.version_mut() = self.version;
        let map = res.headers_mut();
        for (k, v) in &self.headers {
            map.append(k.clone(), v.clone());
        }
        res
    }
}
