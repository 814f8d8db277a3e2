//! In-memory backend speaking the newline-delimited JSON framing.
//!
//! `connected_broker()` returns a broker whose channel talks to a
//! `FakeBackend` over `tokio::io::duplex`, so tests can observe every
//! emitted frame and push arbitrary replies.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use callwire::channel::{ConnectFuture, WireMessage};
use callwire::{Channel, Connector, RequestBroker, SendOptions, Transport};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

/// How long a test waits for a frame before failing.
const FRAME_WAIT: Duration = Duration::from_secs(5);

/// Connector handing out pre-made duplex streams, one per connect.
pub struct DuplexConnector {
    streams: Mutex<Vec<DuplexStream>>,
}

impl DuplexConnector {
    pub fn new(streams: Vec<DuplexStream>) -> Self {
        Self {
            streams: Mutex::new(streams),
        }
    }
}

impl Connector for DuplexConnector {
    fn connect(&self) -> ConnectFuture<'_> {
        Box::pin(async move {
            let stream = self.streams.lock().unwrap().pop().ok_or_else(|| {
                io::Error::new(io::ErrorKind::ConnectionRefused, "backend unavailable")
            })?;
            Ok(Transport::from_stream(stream))
        })
    }

    fn describe(&self) -> String {
        "fake-backend".to_string()
    }
}

/// Backend side of one duplex transport.
pub struct FakeBackend {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeBackend {
    fn new(stream: DuplexStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Next frame the client emitted.
    pub async fn recv(&mut self) -> WireMessage {
        let line = tokio::time::timeout(FRAME_WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a frame")
            .expect("failed to read frame")
            .expect("client closed the transport");
        serde_json::from_str(&line).expect("client wrote an invalid frame")
    }

    /// Next frame, asserting its event name.
    pub async fn expect_event(&mut self, event: &str) -> Value {
        let message = self.recv().await;
        assert_eq!(message.event, event, "unexpected outbound event");
        message.payload
    }

    /// Deliver one inbound message to the client.
    pub async fn push(&mut self, event: &str, payload: Value) {
        let mut frame = serde_json::to_vec(&WireMessage::new(event, payload)).unwrap();
        frame.push(b'\n');
        self.push_raw(&frame).await;
    }

    /// Write raw bytes, for malformed-frame tests.
    pub async fn push_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("failed to push");
        self.writer.flush().await.expect("failed to flush");
    }
}

/// A disconnected broker plus the backend that will answer once it connects.
pub fn broker_with_backend(defaults: SendOptions) -> (Arc<RequestBroker>, FakeBackend) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let channel = Channel::new(DuplexConnector::new(vec![client]));
    let broker = RequestBroker::with_defaults(Arc::new(channel), defaults);
    (Arc::new(broker), FakeBackend::new(server))
}

/// A connected broker using default options.
pub async fn connected_broker() -> (Arc<RequestBroker>, FakeBackend) {
    connected_broker_with(SendOptions::default()).await
}

pub async fn connected_broker_with(defaults: SendOptions) -> (Arc<RequestBroker>, FakeBackend) {
    let (broker, backend) = broker_with_backend(defaults);
    broker
        .channel()
        .connect()
        .await
        .expect("fake backend should accept the connection");
    (broker, backend)
}

/// Poll `condition` until it holds, yielding to other tasks in between.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(FRAME_WAIT, async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
