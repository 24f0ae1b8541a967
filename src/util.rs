use std::str;

/// Find the end of the header block. Returns the index just past `\r\n\r\n`.
pub(crate) fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
}

/// Find the first `\r\n`. Returns the index of the `\r`.
pub(crate) fn find_crlf(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|w| w == b"\r\n")
}

/// Trace log wire data line by line.
pub(crate) fn log_data(data: &[u8]) {
    if !log_enabled!(log::Level::Trace) {
        return;
    }

    for line in data.split(|c| *c == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        match str::from_utf8(line) {
            Ok(v) => trace!("{}", v),
            Err(_) => trace!("(non-utf8 {} bytes)", line.len()),
        }
    }
}
