//! Socket configuration options
//!
//! Transport-level knobs shared by the broker's reply sockets and the
//! client's request socket.

use std::time::Duration;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use robotmq_core::options::SocketOptions;
/// use std::time::Duration;
///
/// let opts = SocketOptions::default()
///     .with_recv_timeout(Duration::from_secs(5))
///     .with_send_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Receive timeout
    ///
    /// - `None`: Block indefinitely (default)
    /// - `Some(duration)`: Fail a single read with `TimedOut` after duration
    pub recv_timeout: Option<Duration>,

    /// Send timeout
    ///
    /// - `None`: Block indefinitely (default)
    /// - `Some(duration)`: Fail a single write with `TimedOut` after duration
    pub send_timeout: Option<Duration>,

    /// Maximum time to wait for a connection to be established.
    /// - Default: 1 second
    pub connect_timeout: Duration,

    /// Initial delay before re-sending after a failed attempt.
    /// - Default: 10ms
    pub reconnect_ivl: Duration,

    /// Cap for the exponential reconnect backoff.
    /// - Default: 1 second
    pub reconnect_ivl_max: Duration,

    /// Maximum size of a single frame in bytes.
    /// - `None`: No limit (default)
    pub max_msg_size: Option<usize>,

    /// Size of each read from the network.
    /// - Default: 8192 (8KB)
    pub read_buffer_size: usize,

    /// Initial capacity of the encode buffer.
    /// - Default: 8192 (8KB)
    pub write_buffer_size: usize,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            recv_timeout: None,
            send_timeout: None,
            connect_timeout: Duration::from_secs(1),
            reconnect_ivl: Duration::from_millis(10),
            reconnect_ivl_max: Duration::from_secs(1),
            max_msg_size: None,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
        }
    }
}

impl SocketOptions {
    /// Create new socket options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set receive timeout (builder-style).
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Set send timeout (builder-style).
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set connect timeout (builder-style).
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set reconnect interval (builder-style).
    pub fn with_reconnect_ivl(mut self, ivl: Duration) -> Self {
        self.reconnect_ivl = ivl;
        self
    }

    /// Set maximum reconnect interval (builder-style).
    pub fn with_reconnect_ivl_max(mut self, max: Duration) -> Self {
        self.reconnect_ivl_max = max;
        self
    }

    /// Set maximum frame size (builder-style).
    pub fn with_max_msg_size(mut self, size: usize) -> Self {
        self.max_msg_size = Some(size);
        self
    }

    /// Set read buffer size (builder-style).
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set write buffer size (builder-style).
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Small buffers for low-latency exchanges of scalar payloads.
    pub fn small_buffers(self) -> Self {
        self.with_read_buffer_size(4096).with_write_buffer_size(4096)
    }

    /// Large buffers for bulk payloads (images, point clouds).
    pub fn large_buffers(self) -> Self {
        self.with_read_buffer_size(65536).with_write_buffer_size(65536)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SocketOptions::default();
        assert_eq!(opts.recv_timeout, None);
        assert_eq!(opts.send_timeout, None);
        assert_eq!(opts.reconnect_ivl, Duration::from_millis(10));
        assert_eq!(opts.read_buffer_size, 8192);
        assert!(opts.max_msg_size.is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let opts = SocketOptions::new()
            .with_recv_timeout(Duration::from_secs(5))
            .with_reconnect_ivl_max(Duration::from_secs(2))
            .with_max_msg_size(1 << 20)
            .large_buffers();

        assert_eq!(opts.recv_timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.reconnect_ivl_max, Duration::from_secs(2));
        assert_eq!(opts.max_msg_size, Some(1 << 20));
        assert_eq!(opts.read_buffer_size, 65536);
    }
}
