use std::time::Duration;

use crate::client::DEFAULT_MAX_HEADER_SIZE;

/// Default value for [`Config::user_agent`].
pub const DEFAULT_USER_AGENT: &str = "toyhttp/0.1";

/// Configuration of an [`Agent`](crate::Agent).
#[derive(Debug, Clone)]
pub struct Config {
    timeout: Duration,
    user_agent: String,
    max_header_size: usize,
    recv_buffer_size: usize,
}

impl Config {
    /// Create a config with default values.
    pub fn new() -> Self {
        Config {
            timeout: Duration::from_secs(5),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            recv_buffer_size: 4096,
        }
    }

    /// Bound for connecting and for each individual read and write.
    ///
    /// Defaults to 5 seconds. A zero duration is raised to one millisecond,
    /// since the socket layer takes zero to mean "no timeout".
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.max(Duration::from_millis(1));
        self
    }

    /// Value of the `user-agent` request header.
    ///
    /// Defaults to `toyhttp/0.1`.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Max size of the response header block.
    ///
    /// Defaults to 16 KiB.
    pub fn max_header_size(mut self, max: usize) -> Self {
        self.max_header_size = max;
        self
    }

    /// Max bytes read from the connection per receive call.
    ///
    /// Defaults to 4096.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size.max(1);
        self
    }

    pub(crate) fn get_timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn get_user_agent(&self) -> &str {
        &self.user_agent
    }

    pub(crate) fn get_max_header_size(&self) -> usize {
        self.max_header_size
    }

    pub(crate) fn get_recv_buffer_size(&self) -> usize {
        self.recv_buffer_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = Config::default();
        assert_eq!(c.get_timeout(), Duration::from_secs(5));
        assert_eq!(c.get_user_agent(), "toyhttp/0.1");
        assert_eq!(c.get_max_header_size(), 16 * 1024);
        assert_eq!(c.get_recv_buffer_size(), 4096);
    }

    #[test]
    fn zero_values_are_raised() {
        let c = Config::new()
            .timeout(Duration::ZERO)
            .recv_buffer_size(0);
        assert_eq!(c.get_timeout(), Duration::from_millis(1));
        assert_eq!(c.get_recv_buffer_size(), 1);
    }
}
