//! Connection state machine for the channel.

use std::fmt;

/// Lifecycle state of the channel's connection.
///
/// Transitions:
/// - Disconnected -> Connecting (on `connect()`)
/// - Connecting -> Connected (transport established)
/// - Connecting -> Disconnected (connect failed)
/// - Connected -> Disconnected (on `disconnect()`, EOF or I/O error)
///
/// Entering Disconnected from any other state fails every pending exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport (initial state)
    #[default]
    Disconnected,
    /// Transport being established
    Connecting,
    /// Transport up, reader and writer tasks running
    Connected,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}
