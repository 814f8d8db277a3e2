pub mod broker;
pub mod channel;
pub mod config;
pub mod error;
pub mod exchange;
pub mod operation;

pub use broker::{RequestBroker, SendOptions};
pub use channel::{Channel, ConnectionState, Connector, Subscription, TcpConnector, Transport};
pub use config::{BrokerSettings, load_settings};
pub use error::{ConfigError, ExchangeError, ExchangeResult};
pub use exchange::{CorrelationKey, ExchangeHandle, ExchangeRegistry};
pub use operation::Operation;
