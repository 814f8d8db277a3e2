//! Registry of in-flight exchanges.
//!
//! The registry owns the mapping from correlation key to pending exchange and
//! resolves entries from inbound deliveries:
//! - Before emitting, the broker calls `begin()` to get an `ExchangeHandle`
//! - The channel reader calls `dispatch()` for every inbound message
//! - Deadlines and channel teardown settle through `settle()` / `drain_all()`
//!
//! # Correlation
//!
//! Inbound messages carry no request id, only an event name. Each exchange
//! subscribes to its success and error event names by joining a per-event
//! FIFO queue. A delivery settles the front of that queue: the earliest
//! still-pending exchange awaiting the event (first-registered,
//! first-resolved). Two concurrent calls sharing event names are therefore
//! resolved in registration order, never in reply order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use log::{debug, warn};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::key::CorrelationKey;
use super::outcome::{ExchangeOutcome, remote_error};
use crate::error::{ExchangeError, LockResultExt};

/// Tracks pending exchanges and routes inbound deliveries to their waiters.
///
/// All state sits behind a single mutex, so `begin`, `settle`, `dispatch`
/// and `drain_all` are atomic with respect to each other. Waiters are woken
/// after the lock is released.
pub struct ExchangeRegistry {
    state: Mutex<RegistryState>,
}

struct RegistryState {
    /// Last allocated sequence number.
    last_seq: u64,
    /// Pending exchanges by key.
    pending: HashMap<CorrelationKey, PendingExchange>,
    /// Inbound event name -> keys awaiting it, in registration order.
    awaiting: HashMap<String, VecDeque<CorrelationKey>>,
}

struct PendingExchange {
    success_event: String,
    error_event: String,
    waiter: oneshot::Sender<ExchangeOutcome>,
    deadline: Option<Instant>,
    timer: Option<AbortHandle>,
}

/// The caller's side of one exchange.
///
/// Dropping the handle abandons interest in the result only: the exchange
/// still settles (or times out) and is still removed from the registry.
#[derive(Debug)]
pub struct ExchangeHandle {
    key: CorrelationKey,
    receiver: oneshot::Receiver<ExchangeOutcome>,
}

impl ExchangeHandle {
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    /// Wait for the exchange to settle.
    pub async fn outcome(self) -> ExchangeOutcome {
        match self.receiver.await {
            Ok(outcome) => outcome,
            // Sender dropped without settling: the registry itself went away.
            Err(_) => Err(ExchangeError::connectivity(
                "exchange registry dropped before settlement",
            )),
        }
    }
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                last_seq: 0,
                pending: HashMap::new(),
                awaiting: HashMap::new(),
            }),
        }
    }

    /// Start a pending exchange.
    ///
    /// Allocates a fresh key, subscribes it to `success_event` and
    /// `error_event`, and arms the deadline when `timeout` is set. Never
    /// blocks. Must be called before the outbound message is emitted so the
    /// reply can always be routed.
    ///
    /// Arming a deadline requires a tokio runtime; outside one the exchange
    /// is registered without a deadline.
    pub fn begin(
        self: &Arc<Self>,
        outbound: &str,
        success_event: &str,
        error_event: &str,
        timeout: Option<Duration>,
    ) -> ExchangeHandle {
        let mut state = self.state.lock().recover_poison("ExchangeRegistry::begin");
        self.begin_locked(&mut state, outbound, success_event, error_event, timeout)
    }

    /// Like `begin`, but rejects the call if another exchange started by the
    /// same outbound event is still pending.
    pub fn begin_single_flight(
        self: &Arc<Self>,
        outbound: &str,
        success_event: &str,
        error_event: &str,
        timeout: Option<Duration>,
    ) -> Result<ExchangeHandle, ExchangeError> {
        let mut state = self
            .state
            .lock()
            .recover_poison("ExchangeRegistry::begin_single_flight");
        if state.pending.keys().any(|key| key.outbound() == outbound) {
            return Err(ExchangeError::Overlapping {
                event: outbound.to_string(),
            });
        }
        Ok(self.begin_locked(&mut state, outbound, success_event, error_event, timeout))
    }

    fn begin_locked(
        self: &Arc<Self>,
        state: &mut RegistryState,
        outbound: &str,
        success_event: &str,
        error_event: &str,
        timeout: Option<Duration>,
    ) -> ExchangeHandle {
        state.last_seq += 1;
        let key = CorrelationKey::new(outbound, state.last_seq);
        let (waiter, receiver) = oneshot::channel();

        let (deadline, timer) = match timeout {
            Some(after) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => (
                    Some(Instant::now() + after),
                    Some(self.arm_deadline(&runtime, key.clone(), after)),
                ),
                Err(_) => {
                    warn!(
                        target: "callwire::exchange",
                        "No runtime to arm deadline for {}, registering without timeout",
                        key
                    );
                    (None, None)
                }
            },
            None => (None, None),
        };

        state
            .awaiting
            .entry(success_event.to_string())
            .or_default()
            .push_back(key.clone());
        if error_event != success_event {
            state
                .awaiting
                .entry(error_event.to_string())
                .or_default()
                .push_back(key.clone());
        }
        state.pending.insert(
            key.clone(),
            PendingExchange {
                success_event: success_event.to_string(),
                error_event: error_event.to_string(),
                waiter,
                deadline,
                timer,
            },
        );

        debug!(
            target: "callwire::exchange",
            "Began {} awaiting {} / {} ({} pending)",
            key,
            success_event,
            error_event,
            state.pending.len()
        );

        ExchangeHandle { key, receiver }
    }

    /// Spawn the task that settles `key` as timed out once `after` elapses.
    ///
    /// The task holds only a weak reference so a dropped registry does not
    /// outlive its timers.
    fn arm_deadline(
        self: &Arc<Self>,
        runtime: &tokio::runtime::Handle,
        key: CorrelationKey,
        after: Duration,
    ) -> AbortHandle {
        let registry: Weak<Self> = Arc::downgrade(self);
        runtime
            .spawn(async move {
                tokio::time::sleep(after).await;
                if let Some(registry) = registry.upgrade() {
                    let exchange = key.to_string();
                    if registry.settle(&key, Err(ExchangeError::Timeout { exchange, after })) {
                        debug!(
                            target: "callwire::exchange",
                            "Exchange {} timed out after {:?}",
                            key,
                            after
                        );
                    }
                }
            })
            .abort_handle()
    }

    /// Settle an exchange with `outcome`.
    ///
    /// Returns `false` without doing anything if the exchange is no longer
    /// pending, which makes late deliveries, late deadlines and late
    /// teardown no-ops. Otherwise cancels the deadline, removes the
    /// subscriptions and the entry, then wakes the waiter.
    pub fn settle(&self, key: &CorrelationKey, outcome: ExchangeOutcome) -> bool {
        let entry = {
            let mut state = self.state.lock().recover_poison("ExchangeRegistry::settle");
            match Self::take_locked(&mut state, key) {
                Some(entry) => entry,
                None => return false,
            }
        };
        Self::complete(key, entry, outcome);
        true
    }

    /// Route one inbound delivery.
    ///
    /// Settles the earliest-registered pending exchange awaiting `event`.
    /// The delivery is a success if `event` is that exchange's success event
    /// (including when both names coincide), a `Remote` error otherwise.
    ///
    /// Returns `true` if an exchange claimed the delivery.
    pub fn dispatch(&self, event: &str, payload: Value) -> bool {
        let (key, entry) = {
            let mut state = self.state.lock().recover_poison("ExchangeRegistry::dispatch");
            let Some(key) = state.awaiting.get(event).and_then(|queue| queue.front()).cloned()
            else {
                return false;
            };
            match Self::take_locked(&mut state, &key) {
                Some(entry) => (key, entry),
                None => return false,
            }
        };

        let outcome = if event == entry.success_event {
            Ok(payload)
        } else {
            Err(remote_error(event, payload))
        };
        Self::complete(&key, entry, outcome);
        true
    }

    /// Force-settle every pending exchange with a connectivity error.
    ///
    /// Used when the channel enters `Disconnected`. Leaves the registry empty
    /// and returns how many exchanges were settled.
    pub fn drain_all(&self, reason: &str) -> usize {
        let entries: Vec<_> = {
            let mut state = self.state.lock().recover_poison("ExchangeRegistry::drain_all");
            state.awaiting.clear();
            state.pending.drain().collect()
        };

        let count = entries.len();
        for (key, entry) in entries {
            Self::complete(&key, entry, Err(ExchangeError::connectivity(reason)));
        }
        if count > 0 {
            debug!(
                target: "callwire::exchange",
                "Drained {} pending exchanges: {}",
                count,
                reason
            );
        }
        count
    }

    /// Number of pending exchanges.
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock().recover_poison("ExchangeRegistry::pending_count");
        state.pending.len()
    }

    pub fn is_pending(&self, key: &CorrelationKey) -> bool {
        let state = self.state.lock().recover_poison("ExchangeRegistry::is_pending");
        state.pending.contains_key(key)
    }

    /// Number of exchanges currently subscribed to an inbound event name.
    pub fn subscriber_count(&self, event: &str) -> usize {
        let state = self
            .state
            .lock()
            .recover_poison("ExchangeRegistry::subscriber_count");
        state.awaiting.get(event).map_or(0, VecDeque::len)
    }

    /// Deadline of a pending exchange, if one was armed.
    pub fn deadline(&self, key: &CorrelationKey) -> Option<Instant> {
        let state = self.state.lock().recover_poison("ExchangeRegistry::deadline");
        state.pending.get(key).and_then(|entry| entry.deadline)
    }

    /// Remove an entry and its subscriptions. Caller holds the lock.
    fn take_locked(state: &mut RegistryState, key: &CorrelationKey) -> Option<PendingExchange> {
        let entry = state.pending.remove(key)?;
        for event in [&entry.success_event, &entry.error_event] {
            if let Some(queue) = state.awaiting.get_mut(event.as_str()) {
                queue.retain(|queued| queued != key);
                if queue.is_empty() {
                    state.awaiting.remove(event.as_str());
                }
            }
        }
        Some(entry)
    }

    /// Finish a removed entry. Called without the lock held.
    fn complete(key: &CorrelationKey, entry: PendingExchange, outcome: ExchangeOutcome) {
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        if entry.waiter.send(outcome).is_err() {
            debug!(
                target: "callwire::exchange",
                "Waiter for {} abandoned, outcome dropped",
                key
            );
        }
    }
}
