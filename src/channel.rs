//! Persistent, multiplexed message channel to the backend.
//!
//! The channel owns one transport at a time and its lifecycle:
//! - `connect()` / `disconnect()` are idempotent
//! - A Reader Task routes inbound frames to the exchange registry and to
//!   listeners; a Writer Task drains the bounded outbound queue
//! - Entering `Disconnected` (client request, EOF, I/O error, failed
//!   connect) fails every pending exchange with a connectivity error
//!
//! # Components
//!
//! - `Connector`: opens the byte stream (`TcpConnector` for real use)
//! - `ConnectionState`: lifecycle state, observable through a watch channel
//! - `Subscription`: long-lived listener for pushed events

mod codec;
mod connector;
mod listeners;
mod message;
mod reader;
mod state;
mod writer;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

pub use connector::{BoxedReader, BoxedWriter, ConnectFuture, Connector, TcpConnector, Transport};
pub use listeners::Subscription;
pub use message::WireMessage;
pub use state::ConnectionState;
pub(crate) use writer::OUTBOUND_QUEUE_CAPACITY;

use crate::error::{ExchangeError, LockResultExt};
use crate::exchange::ExchangeRegistry;
use listeners::ListenerRegistry;
use reader::{ReaderTaskHandle, spawn_reader_task};
use writer::{WriterTaskHandle, spawn_writer_task};

/// Event the client emits to announce itself after connecting.
pub const ANNOUNCE_EVENT: &str = "socket_connect";

/// Shared, persistent channel to one backend process.
///
/// Also owns the `ExchangeRegistry` its reader dispatches into, so that
/// channel teardown and exchange draining cannot get out of step.
pub struct Channel {
    shared: Arc<ChannelShared>,
}

struct ChannelShared {
    connector: Box<dyn Connector>,
    registry: Arc<ExchangeRegistry>,
    listeners: Arc<ListenerRegistry>,
    state: watch::Sender<ConnectionState>,
    /// The live link, if any. State changes happen while holding this lock.
    link: Mutex<Option<Link>>,
    /// Generation of the latest connect attempt.
    attempt: AtomicU64,
    queue_capacity: usize,
}

/// One established connection: the outbound queue plus its two tasks.
struct Link {
    generation: u64,
    outbound: mpsc::Sender<WireMessage>,
    _reader: ReaderTaskHandle,
    _writer: WriterTaskHandle,
}

/// Lets the reader and writer of one link report transport failure without
/// keeping the channel alive.
#[derive(Clone)]
pub(crate) struct LinkMonitor {
    shared: Weak<ChannelShared>,
    generation: u64,
}

impl LinkMonitor {
    pub(crate) fn transport_lost(&self, reason: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.teardown(Some(self.generation), reason);
        }
    }
}

impl Channel {
    pub fn new(connector: impl Connector) -> Self {
        Self::with_queue_capacity(connector, OUTBOUND_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(connector: impl Connector, queue_capacity: usize) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(ChannelShared {
                connector: Box::new(connector),
                registry: Arc::new(ExchangeRegistry::new()),
                listeners: Arc::new(ListenerRegistry::new()),
                state,
                link: Mutex::new(None),
                attempt: AtomicU64::new(0),
                queue_capacity: queue_capacity.max(1),
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Receiver observing every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the channel reaches `Connected`.
    pub async fn wait_until_connected(&self) {
        let mut state = self.watch_state();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state.wait_for(|state| state.is_connected()).await;
    }

    /// The registry this channel dispatches into.
    pub fn registry(&self) -> &Arc<ExchangeRegistry> {
        &self.shared.registry
    }

    /// Connect the transport.
    ///
    /// No-op when already `Connected`. While another attempt is `Connecting`,
    /// opens nothing and waits for that attempt: returns `Ok` once it
    /// connects, a connectivity error if it ends `Disconnected`. On failure
    /// the channel returns to `Disconnected` and the error is a connectivity
    /// error.
    pub async fn connect(&self) -> Result<(), ExchangeError> {
        let mut generation = None;
        self.shared.state.send_if_modified(|state| {
            if *state != ConnectionState::Disconnected {
                return false;
            }
            *state = ConnectionState::Connecting;
            let next = self.shared.attempt.fetch_add(1, Ordering::SeqCst) + 1;
            generation = Some(next);
            true
        });
        let Some(generation) = generation else {
            debug!(
                target: "callwire::channel",
                "connect() while {}, nothing to open",
                self.state()
            );
            return self.await_pending_attempt().await;
        };

        let target = self.shared.connector.describe();
        info!(target: "callwire::channel", "Connecting to {}", target);

        let transport = match self.shared.connector.connect().await {
            Ok(transport) => transport,
            Err(e) => {
                let reason = format!("connect to {} failed: {}", target, e);
                warn!(target: "callwire::channel", "{}", reason);
                if self.shared.is_current_attempt(generation) {
                    self.shared.teardown(None, &reason);
                }
                return Err(ExchangeError::connectivity(reason));
            }
        };

        let mut link = self.shared.link.lock().recover_poison("Channel::connect");
        if !self.shared.is_current_attempt(generation)
            || self.state() != ConnectionState::Connecting
        {
            // disconnect() ran while the transport was being established.
            debug!(
                target: "callwire::channel",
                "Connect attempt {} superseded, dropping transport",
                generation
            );
            return Err(ExchangeError::connectivity(
                "channel disconnected while connecting",
            ));
        }

        let monitor = LinkMonitor {
            shared: Arc::downgrade(&self.shared),
            generation,
        };
        let (outbound, queue) = mpsc::channel(self.shared.queue_capacity);
        let reader = spawn_reader_task(
            transport.reader,
            Arc::clone(&self.shared.registry),
            Arc::clone(&self.shared.listeners),
            monitor.clone(),
        );
        let writer = spawn_writer_task(transport.writer, queue, monitor);
        *link = Some(Link {
            generation,
            outbound,
            _reader: reader,
            _writer: writer,
        });
        self.shared.state.send_replace(ConnectionState::Connected);

        info!(target: "callwire::channel", "Connected to {}", target);
        Ok(())
    }

    /// Wait for an attempt started elsewhere to leave `Connecting`.
    async fn await_pending_attempt(&self) -> Result<(), ExchangeError> {
        let mut state = self.watch_state();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await;
        if self.state().is_connected() {
            Ok(())
        } else {
            Err(ExchangeError::connectivity(
                "concurrent connect attempt did not connect",
            ))
        }
    }

    /// Disconnect the transport, failing every pending exchange.
    ///
    /// No-op when already `Disconnected`.
    pub fn disconnect(&self) {
        if !self.shared.teardown(None, "channel disconnected by client") {
            debug!(
                target: "callwire::channel",
                "disconnect() while disconnected, nothing to do"
            );
        }
    }

    /// Queue one outbound message.
    ///
    /// Fails with a connectivity error when there is no live link or the
    /// outbound queue is full. Delivery to the remote is not confirmed.
    pub fn emit(&self, event: &str, payload: Value) -> Result<(), ExchangeError> {
        let link = self.shared.link.lock().recover_poison("Channel::emit");
        let Some(link) = link.as_ref() else {
            return Err(ExchangeError::connectivity("channel not connected"));
        };
        link.outbound
            .try_send(WireMessage::new(event, payload))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(message) => ExchangeError::connectivity(format!(
                    "outbound queue full, dropped {}",
                    message.event
                )),
                mpsc::error::TrySendError::Closed(_) => {
                    ExchangeError::connectivity("writer task stopped")
                }
            })
    }

    /// Emit the connect announcement with `payload`.
    ///
    /// The backend acknowledges with `socket_response`; listen for it with
    /// `listen("socket_response")` before announcing.
    pub fn announce(&self, payload: Value) -> Result<(), ExchangeError> {
        self.emit(ANNOUNCE_EVENT, payload)
    }

    /// Subscribe to every delivery of `event`. Dropping the subscription
    /// unsubscribes.
    pub fn listen(&self, event: &str) -> Subscription {
        self.shared.listeners.subscribe(event)
    }

    /// Number of live listeners on `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.shared.listeners.listener_count(event)
    }
}

impl ChannelShared {
    fn is_current_attempt(&self, generation: u64) -> bool {
        self.attempt.load(Ordering::SeqCst) == generation
    }

    /// Move to `Disconnected`, drop the link and drain the registry.
    ///
    /// With `Some(generation)`, only tears down if that link is still the
    /// live one, so late failure reports from an old link are ignored.
    /// Returns `false` if there was nothing to tear down.
    fn teardown(&self, generation: Option<u64>, reason: &str) -> bool {
        let link = {
            let mut guard = self.link.lock().recover_poison("Channel::teardown");
            if let Some(generation) = generation {
                match guard.as_ref() {
                    Some(link) if link.generation == generation => {}
                    _ => return false,
                }
            }
            let link = guard.take();
            let mut changed = false;
            self.state.send_if_modified(|state| {
                changed = *state != ConnectionState::Disconnected;
                *state = ConnectionState::Disconnected;
                changed
            });
            if !changed && link.is_none() {
                return false;
            }
            link
        };
        // Dropping the link cancels its reader and writer tasks.
        drop(link);

        let drained = self.registry.drain_all(reason);
        info!(
            target: "callwire::channel",
            "Disconnected ({}), failed {} pending exchanges",
            reason,
            drained
        );
        true
    }
}

impl Drop for ChannelShared {
    fn drop(&mut self) {
        self.registry.drain_all("channel dropped");
    }
}
