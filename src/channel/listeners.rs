//! Long-lived inbound listeners.
//!
//! Exchanges claim replies through the registry; listeners are for everything
//! else the backend pushes (`socket_response`, `info`, agent updates). Each
//! listener gets its own unbounded queue and unsubscribes when dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::LockResultExt;

pub(crate) struct ListenerRegistry {
    state: Mutex<ListenerState>,
}

struct ListenerState {
    next_id: u64,
    by_event: HashMap<String, Vec<(u64, mpsc::UnboundedSender<Value>)>>,
}

/// Receives every payload delivered on one event name.
///
/// Dropping the subscription removes it from the channel.
pub struct Subscription {
    event: String,
    id: u64,
    receiver: mpsc::UnboundedReceiver<Value>,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Next payload, or `None` once the channel itself is gone.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// Next payload if one is already queued.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(&self.event, self.id);
        }
    }
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(ListenerState {
                next_id: 0,
                by_event: HashMap::new(),
            }),
        }
    }

    pub(crate) fn subscribe(self: &Arc<Self>, event: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().recover_poison("ListenerRegistry::subscribe");
        state.next_id += 1;
        let id = state.next_id;
        state
            .by_event
            .entry(event.to_string())
            .or_default()
            .push((id, tx));
        Subscription {
            event: event.to_string(),
            id,
            receiver: rx,
            registry: Arc::downgrade(self),
        }
    }

    fn unsubscribe(&self, event: &str, id: u64) {
        let mut state = self.state.lock().recover_poison("ListenerRegistry::unsubscribe");
        if let Some(listeners) = state.by_event.get_mut(event) {
            listeners.retain(|(listener_id, _)| *listener_id != id);
            if listeners.is_empty() {
                state.by_event.remove(event);
            }
        }
    }

    /// Deliver a payload to every listener of `event`. Returns how many
    /// listeners received it.
    pub(crate) fn deliver(&self, event: &str, payload: &Value) -> usize {
        let state = self.state.lock().recover_poison("ListenerRegistry::deliver");
        state.by_event.get(event).map_or(0, |listeners| {
            listeners
                .iter()
                .filter(|(_, tx)| tx.send(payload.clone()).is_ok())
                .count()
        })
    }

    pub(crate) fn listener_count(&self, event: &str) -> usize {
        let state = self
            .state
            .lock()
            .recover_poison("ListenerRegistry::listener_count");
        state.by_event.get(event).map_or(0, Vec::len)
    }
}
