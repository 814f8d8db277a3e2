//! Correlation key for in-flight exchanges.
//!
//! The wire protocol carries no request id, so the key never leaves the
//! process. It only disambiguates concurrent exchanges inside the registry.

use std::fmt;
use std::sync::Arc;

/// Identifies one exchange: the outbound event name plus a sequence number.
///
/// The sequence number is allocated by the registry and increases
/// monotonically, so two concurrent calls of the same operation never share
/// a key and a key is never reused while its exchange is pending.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    outbound: Arc<str>,
    seq: u64,
}

impl CorrelationKey {
    pub(crate) fn new(outbound: impl Into<Arc<str>>, seq: u64) -> Self {
        Self {
            outbound: outbound.into(),
            seq,
        }
    }

    /// Name of the outbound event that started the exchange.
    pub fn outbound(&self) -> &str {
        &self.outbound
    }

    /// Registry-wide sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.outbound, self.seq)
    }
}
