//! Writer task for the channel's outbound half.
//!
//! Single writer consuming the bounded outbound queue, so frames are written
//! in emission order and never interleave.

use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::LinkMonitor;
use super::codec::write_frame;
use super::connector::BoxedWriter;
use super::message::WireMessage;

/// Queue capacity for outbound messages.
///
/// Bounds memory per connection. A full queue rejects the emission.
pub(crate) const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Handle to a running Writer Task. Cancels the task when dropped.
pub(super) struct WriterTaskHandle {
    _join_handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl Drop for WriterTaskHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

pub(super) fn spawn_writer_task(
    writer: BoxedWriter,
    queue: mpsc::Receiver<WireMessage>,
    monitor: LinkMonitor,
) -> WriterTaskHandle {
    let cancel_token = CancellationToken::new();
    let token_clone = cancel_token.clone();

    let join_handle = tokio::spawn(writer_loop(writer, queue, monitor, token_clone));

    WriterTaskHandle {
        _join_handle: join_handle,
        cancel_token,
    }
}

async fn writer_loop(
    mut writer: BoxedWriter,
    mut queue: mpsc::Receiver<WireMessage>,
    monitor: LinkMonitor,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                debug!(
                    target: "callwire::channel::writer",
                    "Writer task cancelled, shutting down"
                );
                break;
            }

            message = queue.recv() => {
                let Some(message) = message else {
                    debug!(
                        target: "callwire::channel::writer",
                        "Outbound queue closed, shutting down"
                    );
                    break;
                };
                let written = tokio::select! {
                    result = write_frame(&mut writer, &message) => result,
                    _ = cancel_token.cancelled() => {
                        debug!(
                            target: "callwire::channel::writer",
                            "Writer task cancelled mid-frame, shutting down"
                        );
                        return;
                    }
                };
                if let Err(e) = written {
                    warn!(
                        target: "callwire::channel::writer",
                        "Write error on {}: {}",
                        message.event,
                        e
                    );
                    monitor.transport_lost(&format!("write error: {}", e));
                    return;
                }
            }
        }
    }

    // Best effort: lets the remote observe EOF.
    let _ = writer.shutdown().await;
}
