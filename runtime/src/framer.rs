//! Sentinel-delimited framing of breakpoint records.
//!
//! A frame is `START_DEBUG_MESSAGE` + protobuf-encoded [`Breakpoint`] +
//! `END_DEBUG_MESSAGE`. The decoder accumulates chunks from a [`ChunkSource`]
//! and searches the accumulated buffer, so sentinels split across reads and several
//! frames arriving in one read are both handled.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use debuglet_core::error::{DebugletError, Result};
use debuglet_core::wire::Breakpoint;
use prost::Message;
use tokio::sync::Mutex;

/// Marks the beginning of a frame.
pub const START_SENTINEL: &[u8] = b"START_DEBUG_MESSAGE";

/// Marks the end of a frame.
pub const END_SENTINEL: &[u8] = b"END_DEBUG_MESSAGE";

/// Pull-based byte reader the decoder consumes.
#[async_trait]
pub trait ChunkSource: Send {
    /// Read the next chunk. Never returns an empty chunk on success.
    async fn read_chunk(&mut self) -> Result<Vec<u8>>;
}

/// Byte writer frames are pushed into.
#[async_trait]
pub trait ChunkSink: Send {
    /// Write all bytes and flush.
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

#[async_trait]
impl ChunkSink for Vec<u8> {
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Serialize a breakpoint into one wire frame.
pub fn encode(breakpoint: &Breakpoint) -> Vec<u8> {
    let payload = breakpoint.encode_to_vec();
    let mut frame = Vec::with_capacity(START_SENTINEL.len() + payload.len() + END_SENTINEL.len());
    frame.extend_from_slice(START_SENTINEL);
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(END_SENTINEL);
    frame
}

/// Reassembles frames from a byte stream.
///
/// Bytes following a decoded frame stay buffered for the next call. The
/// buffer is guarded by a single lock, held for the whole decode including
/// the reads it issues.
#[derive(Default)]
pub struct FrameDecoder {
    pending: Mutex<Pending>,
}

#[derive(Default)]
struct Pending {
    bytes: BytesMut,
    /// Offset below which no end sentinel can start.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next breakpoint, reading from `source` only while the
    /// buffer holds no complete frame.
    pub async fn decode_stream<S>(&self, source: &mut S) -> Result<Breakpoint>
    where
        S: ChunkSource + ?Sized,
    {
        let mut pending = self.pending.lock().await;
        loop {
            if let Some(payload) = pending.take_frame()? {
                return Ok(Breakpoint::decode(payload)?);
            }
            let chunk = source.read_chunk().await?;
            tracing::trace!(bytes = chunk.len(), buffered = pending.bytes.len(), "Read chunk");
            pending.bytes.extend_from_slice(&chunk);
        }
    }

    /// Number of bytes waiting in the buffer.
    pub async fn buffered_len(&self) -> usize {
        self.pending.lock().await.bytes.len()
    }
}

impl Pending {
    /// Split the first complete frame's payload off the buffer.
    ///
    /// The end sentinel search resumes where the previous call stopped, so
    /// a frame arriving in many chunks is scanned once.
    fn take_frame(&mut self) -> Result<Option<Bytes>> {
        let from = self.scanned.min(self.bytes.len());
        let end = match find(&self.bytes[from..], END_SENTINEL) {
            Some(offset) => from + offset,
            None => {
                self.scanned = self.bytes.len().saturating_sub(END_SENTINEL.len() - 1);
                return Ok(None);
            }
        };
        self.scanned = 0;

        let start = match find(&self.bytes[..end], START_SENTINEL) {
            Some(start) => start,
            None => {
                let _ = self.bytes.split_to(end + END_SENTINEL.len());
                return Err(DebugletError::Framing(format!(
                    "end sentinel at offset {} has no preceding start sentinel",
                    end
                )));
            }
        };

        if start > 0 {
            tracing::debug!(discarded = start, "Discarding bytes before start sentinel");
        }

        let mut frame = self.bytes.split_to(end + END_SENTINEL.len());
        let mut payload = frame.split_off(start + START_SENTINEL.len());
        payload.truncate(payload.len() - END_SENTINEL.len());
        Ok(Some(payload.freeze()))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
