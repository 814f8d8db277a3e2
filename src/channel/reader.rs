//! Reader task for the channel's inbound half.
//!
//! The Reader Task:
//! - Runs in a spawned tokio task, one per connection
//! - Reads newline-delimited frames from the transport
//! - Hands each message to listeners and to the exchange registry
//! - Reports EOF or read errors to the channel, which tears the link down

use std::sync::Arc;

use log::{debug, warn};
use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::LinkMonitor;
use super::codec::{decode_frame, read_frame};
use super::connector::BoxedReader;
use super::listeners::ListenerRegistry;
use crate::exchange::ExchangeRegistry;

/// Handle to a running Reader Task. Cancels the task when dropped.
pub(super) struct ReaderTaskHandle {
    _join_handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl Drop for ReaderTaskHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

pub(super) fn spawn_reader_task(
    reader: BoxedReader,
    registry: Arc<ExchangeRegistry>,
    listeners: Arc<ListenerRegistry>,
    monitor: LinkMonitor,
) -> ReaderTaskHandle {
    let cancel_token = CancellationToken::new();
    let token_clone = cancel_token.clone();

    let join_handle = tokio::spawn(reader_loop(
        reader,
        registry,
        listeners,
        monitor,
        token_clone,
    ));

    ReaderTaskHandle {
        _join_handle: join_handle,
        cancel_token,
    }
}

async fn reader_loop(
    reader: BoxedReader,
    registry: Arc<ExchangeRegistry>,
    listeners: Arc<ListenerRegistry>,
    monitor: LinkMonitor,
    cancel_token: CancellationToken,
) {
    let mut reader = BufReader::new(reader);
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                debug!(
                    target: "callwire::channel::reader",
                    "Reader task cancelled, shutting down"
                );
                break;
            }

            result = read_frame(&mut reader) => {
                match result {
                    Ok(Some(frame)) => handle_frame(&frame, &registry, &listeners),
                    Ok(None) => {
                        warn!(
                            target: "callwire::channel::reader",
                            "Connection closed by remote"
                        );
                        monitor.transport_lost("connection closed by remote");
                        break;
                    }
                    Err(e) => {
                        warn!(
                            target: "callwire::channel::reader",
                            "Reader error: {}, failing pending exchanges",
                            e
                        );
                        monitor.transport_lost(&format!("read error: {}", e));
                        break;
                    }
                }
            }
        }
    }
}

/// Handle a single inbound frame.
fn handle_frame(frame: &[u8], registry: &ExchangeRegistry, listeners: &ListenerRegistry) {
    let message = match decode_frame(frame) {
        Ok(message) => message,
        Err(e) => {
            warn!(
                target: "callwire::channel::reader",
                "Skipping malformed frame: {}",
                e
            );
            return;
        }
    };

    let heard = listeners.deliver(&message.event, &message.payload);
    let claimed = registry.dispatch(&message.event, message.payload);
    if !claimed && heard == 0 {
        debug!(
            target: "callwire::channel::reader",
            "No exchange or listener for {}, dropping",
            message.event
        );
    }
}
