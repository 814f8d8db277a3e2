//! Newline-delimited JSON framing.
//!
//! Format: one `WireMessage` serialized as compact JSON per line (`\n`).
//! Compact `serde_json` output never contains a raw newline, so the line
//! boundary is unambiguous.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::message::WireMessage;

/// Write one framed message and flush.
pub(crate) async fn write_frame<W>(writer: &mut W, message: &WireMessage) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Read the next non-blank line as raw bytes, surrounding whitespace trimmed.
///
/// Returns `Ok(None)` on a clean EOF. A trailing line without newline before
/// EOF is still returned. Bytes are not checked for UTF-8 here, so a garbled
/// line reaches `decode_frame` instead of failing the read.
pub(crate) async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_ascii();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_vec()));
        }
    }
}

/// Decode a frame into a message.
pub(crate) fn decode_frame(frame: &[u8]) -> Result<WireMessage, serde_json::Error> {
    serde_json::from_slice(frame)
}
