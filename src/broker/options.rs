//! Per-call options for `RequestBroker::send`.

use std::time::Duration;

/// Default request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How one exchange behaves around connectivity, deadline and overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOptions {
    /// Deadline for the exchange. Also bounds the wait for a connection
    /// when `queue_until_connected` is set. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Wait for the channel to connect instead of failing immediately.
    pub queue_until_connected: bool,
    /// Reject the call if an exchange for the same outbound event is pending.
    pub single_flight: bool,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            queue_until_connected: false,
            single_flight: false,
        }
    }
}

impl SendOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn queue_until_connected(mut self, queue: bool) -> Self {
        self.queue_until_connected = queue;
        self
    }

    pub fn single_flight(mut self, single_flight: bool) -> Self {
        self.single_flight = single_flight;
        self
    }
}
