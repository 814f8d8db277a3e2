//! Request broker: one outbound event, exactly one typed outcome.
//!
//! Request flow:
//! 1. Check connectivity (fail fast, or wait when queueing is requested)
//! 2. Register the exchange with the registry to get its handle
//! 3. Emit the outbound message on the channel
//! 4. Await the handle (no lock held) and decode the payload
//!
//! Registration happens before emission so a fast reply can always be
//! routed. Any failure after registration settles the exchange itself, so
//! the caller always observes the outcome through the same handle.

mod options;

use std::sync::Arc;

use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tokio::time::Instant;

pub use options::{DEFAULT_REQUEST_TIMEOUT, SendOptions};

use crate::channel::{Channel, ConnectionState, TcpConnector};
use crate::config::BrokerSettings;
use crate::error::{ConfigError, ExchangeError};
use crate::operation::Operation;

/// Public entry point for every logical operation.
pub struct RequestBroker {
    channel: Arc<Channel>,
    defaults: SendOptions,
}

impl RequestBroker {
    pub fn new(channel: Arc<Channel>) -> Self {
        Self::with_defaults(channel, SendOptions::default())
    }

    /// Broker whose `call` uses `defaults`.
    pub fn with_defaults(channel: Arc<Channel>, defaults: SendOptions) -> Self {
        Self { channel, defaults }
    }

    /// Broker over a TCP channel to the configured endpoint. Does not connect.
    pub fn from_settings(settings: &BrokerSettings) -> Result<Self, ConfigError> {
        let connector = TcpConnector::new(settings.socket_addr()?);
        let channel = Channel::with_queue_capacity(connector, settings.outbound_queue_capacity);
        Ok(Self::with_defaults(
            Arc::new(channel),
            settings.send_options(),
        ))
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    pub fn defaults(&self) -> &SendOptions {
        &self.defaults
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Receiver observing connection-state transitions.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.channel.watch_state()
    }

    /// Perform a catalog operation with the default options.
    pub async fn call<P, T>(&self, operation: &Operation, payload: &P) -> Result<T, ExchangeError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.call_with(operation, payload, &self.defaults).await
    }

    pub async fn call_with<P, T>(
        &self,
        operation: &Operation,
        payload: &P,
        options: &SendOptions,
    ) -> Result<T, ExchangeError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(
            operation.outbound,
            payload,
            operation.success,
            operation.error,
            options,
        )
        .await
    }

    /// Perform one exchange.
    ///
    /// Emits `outbound` with `payload`, then waits for `success_event`
    /// (decoded into `T`) or `error_event` (a `Remote` error). Produces
    /// exactly one outcome; the deadline and channel teardown guarantee the
    /// wait ends. Never retries.
    ///
    /// Dropping the returned future abandons the result without cancelling
    /// the exchange: it still settles and is still cleaned up.
    pub async fn send<P, T>(
        &self,
        outbound: &str,
        payload: &P,
        success_event: &str,
        error_event: &str,
        options: &SendOptions,
    ) -> Result<T, ExchangeError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload).map_err(|e| {
            ExchangeError::protocol(outbound, format!("payload is not serializable: {}", e))
        })?;

        let started = Instant::now();
        self.ensure_connected(outbound, options).await?;
        let timeout = options
            .timeout
            .map(|limit| limit.saturating_sub(started.elapsed()));

        let registry = self.channel.registry();
        let handle = if options.single_flight {
            registry.begin_single_flight(outbound, success_event, error_event, timeout)?
        } else {
            registry.begin(outbound, success_event, error_event, timeout)
        };
        let key = handle.key().clone();

        // A disconnect between the check above and `begin` has already
        // drained the registry, so re-check before emitting.
        if !self.channel.state().is_connected() {
            registry.settle(
                &key,
                Err(ExchangeError::connectivity(
                    "channel disconnected before emission",
                )),
            );
        } else if let Err(e) = self.channel.emit(outbound, payload) {
            registry.settle(&key, Err(e));
        } else {
            debug!(target: "callwire::broker", "Emitted {}", key);
        }

        let value = match handle.outcome().await {
            Ok(value) => value,
            Err(e) => {
                debug!(target: "callwire::broker", "Exchange {} failed: {}", key, e);
                return Err(e);
            }
        };
        serde_json::from_value(value).map_err(|e| ExchangeError::protocol(success_event, e.to_string()))
    }

    async fn ensure_connected(
        &self,
        outbound: &str,
        options: &SendOptions,
    ) -> Result<(), ExchangeError> {
        if self.channel.state().is_connected() {
            return Ok(());
        }
        if !options.queue_until_connected {
            return Err(ExchangeError::connectivity("channel not connected"));
        }

        debug!(
            target: "callwire::broker",
            "Queueing {} until the channel connects",
            outbound
        );
        match options.timeout {
            Some(limit) => tokio::time::timeout(limit, self.channel.wait_until_connected())
                .await
                .map_err(|_| ExchangeError::Timeout {
                    exchange: outbound.to_string(),
                    after: limit,
                }),
            None => {
                self.channel.wait_until_connected().await;
                Ok(())
            }
        }
    }
}
