//! Exchange tracking for request/response over a shared channel.
//!
//! # Components
//!
//! - `CorrelationKey`: outbound event name plus registry sequence number
//! - `ExchangeRegistry`: pending exchanges and inbound dispatch
//! - `ExchangeHandle`: the single waiter of one exchange

mod key;
mod outcome;
mod registry;

pub use key::CorrelationKey;
pub use outcome::ExchangeOutcome;
pub use registry::{ExchangeHandle, ExchangeRegistry};
