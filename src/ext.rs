use http::{HeaderName, HeaderValue, StatusCode};

pub(crate) trait HeaderIterExt {
    /// All values for `name`, with comma separated lists split out and trimmed.
    fn comma_values(self, name: &HeaderName) -> Vec<String>;
}

impl<'a, I> HeaderIterExt for I
where
    I: Iterator<Item = &'a (HeaderName, HeaderValue)>,
{
    fn comma_values(self, name: &HeaderName) -> Vec<String> {
        self.filter(|(k, _)| k == name)
            .filter_map(|(_, v)| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

pub(crate) trait StatusExt {
    /// Interim 1xx responses that precede the final response.
    fn is_interim(&self) -> bool;

    /// Responses that never carry a body, regardless of framing headers.
    fn forbids_body(&self) -> bool;
}

impl StatusExt for StatusCode {
    fn is_interim(&self) -> bool {
        self.is_informational()
    }

    fn forbids_body(&self) -> bool {
        *self == StatusCode::NO_CONTENT || *self == StatusCode::NOT_MODIFIED
    }
}
