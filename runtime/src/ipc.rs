//! Local IPC channel to the native debugger engine.
//!
//! Each direction uses its own Unix-domain socket. The agent binds and
//! listens, the engine connects once, and from then on the channel moves
//! bytes in bounded chunks. This is the only layer that touches the socket;
//! framing above it works against [`ChunkSource`] and [`ChunkSink`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use debuglet_core::error::{DebugletError, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::framer::{ChunkSink, ChunkSource};

/// Read and write granularity in bytes.
pub const CHUNK_SIZE: usize = 1024;

/// Suffix of the agent-to-engine socket.
pub const OUTBOUND_SUFFIX: &str = ".breakpoints.sock";

/// Suffix of the engine-to-agent socket.
pub const INBOUND_SUFFIX: &str = ".hits.sock";

/// Socket paths for one agent/engine pairing.
///
/// The engine receives `base` as its pipe name and derives both socket
/// paths by appending the same suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPaths {
    pub base: PathBuf,
    pub outbound: PathBuf,
    pub inbound: PathBuf,
}

impl ChannelPaths {
    /// Fresh, unique paths under `dir`.
    pub fn generate(dir: &Path) -> Self {
        let name = format!("debuglet-{}", uuid::Uuid::new_v4().simple());
        Self::from_base(dir.join(name))
    }

    pub fn from_base(base: PathBuf) -> Self {
        let with_suffix = |suffix: &str| {
            let mut path = base.clone().into_os_string();
            path.push(suffix);
            PathBuf::from(path)
        };
        Self {
            outbound: with_suffix(OUTBOUND_SUFFIX),
            inbound: with_suffix(INBOUND_SUFFIX),
            base,
        }
    }
}

/// One end of a single-peer duplex byte channel.
pub struct IpcChannel {
    path: PathBuf,
    listener: Option<UnixListener>,
    stream: Option<UnixStream>,
    closed: bool,
}

impl IpcChannel {
    /// Listen on `path`, replacing a stale socket file left by a previous run.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            tracing::warn!(path = %path.display(), "Removing stale Unix socket");
            let _ = std::fs::remove_file(&path);
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let listener = UnixListener::bind(&path).map_err(|e| {
            DebugletError::Other(format!("Failed to bind {}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), "IPC channel listening");

        Ok(Self {
            path,
            listener: Some(listener),
            stream: None,
            closed: false,
        })
    }

    /// Wait for the single peer. The listener is dropped once it connects.
    ///
    /// Cancel-safe: if the future is dropped before a peer arrives the
    /// channel keeps listening.
    pub async fn accept(&mut self) -> Result<()> {
        let listener = self.listener.as_ref().ok_or_else(|| {
            DebugletError::InvalidState(format!(
                "channel {} is not listening",
                self.path.display()
            ))
        })?;
        let (stream, _) = listener.accept().await?;
        self.listener = None;
        self.stream = Some(stream);
        tracing::debug!(path = %self.path.display(), "IPC peer connected");
        Ok(())
    }

    /// Read up to [`CHUNK_SIZE`] bytes.
    ///
    /// A zero-length read means the peer hung up and is reported as
    /// [`DebugletError::ChannelClosed`] instead of an empty chunk. Named
    /// pipes on Windows can return zero bytes for a full message; on a Unix
    /// socket it is always end of stream, so it is not retried as a chunk.
    pub async fn read(&mut self) -> Result<Vec<u8>> {
        let path = self.path.clone();
        let stream = self.stream_mut()?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(DebugletError::ChannelClosed(format!(
                "peer disconnected from {}",
                path.display()
            )));
        }
        buf.truncate(n);
        Ok(buf)
    }

    /// Write `bytes` in [`CHUNK_SIZE`] pieces and flush once at the end.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        for chunk in bytes.chunks(CHUNK_SIZE) {
            stream.write_all(chunk).await?;
        }
        stream.flush().await?;
        Ok(())
    }

    /// Release the socket and remove its file. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.stream = None;
        self.listener = None;
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove socket file");
            }
        }
        tracing::debug!(path = %self.path.display(), "IPC channel closed");
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream_mut(&mut self) -> Result<&mut UnixStream> {
        if self.closed {
            return Err(DebugletError::ChannelClosed(format!(
                "channel {} was closed",
                self.path.display()
            )));
        }
        let path = &self.path;
        self.stream.as_mut().ok_or_else(|| {
            DebugletError::InvalidState(format!("channel {} has no peer yet", path.display()))
        })
    }
}

impl Drop for IpcChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl ChunkSource for IpcChannel {
    async fn read_chunk(&mut self) -> Result<Vec<u8>> {
        self.read().await
    }
}

#[async_trait]
impl ChunkSink for IpcChannel {
    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write(bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framer::{encode, FrameDecoder};
    use debuglet_core::wire::Breakpoint;

    async fn connected_pair(dir: &Path) -> (IpcChannel, UnixStream) {
        let path = dir.join("test.sock");
        let mut channel = IpcChannel::bind(&path).unwrap();
        let (accepted, peer) = tokio::join!(channel.accept(), UnixStream::connect(&path));
        accepted.unwrap();
        (channel, peer.unwrap())
    }

    #[test]
    fn test_channel_paths_share_base() {
        let paths = ChannelPaths::generate(Path::new("/tmp"));
        let base = paths.base.to_string_lossy().to_string();
        assert!(base.starts_with("/tmp/debuglet-"));
        assert_eq!(
            paths.outbound.to_string_lossy(),
            format!("{}{}", base, OUTBOUND_SUFFIX)
        );
        assert_eq!(
            paths.inbound.to_string_lossy(),
            format!("{}{}", base, INBOUND_SUFFIX)
        );
    }

    #[test]
    fn test_channel_paths_are_unique() {
        let a = ChannelPaths::generate(Path::new("/tmp"));
        let b = ChannelPaths::generate(Path::new("/tmp"));
        assert_ne!(a.base, b.base);
    }

    #[tokio::test]
    async fn test_read_before_accept_is_invalid_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut channel = IpcChannel::bind(dir.path().join("idle.sock")).unwrap();
        let err = channel.read().await.unwrap_err();
        assert!(matches!(err, DebugletError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"left over").unwrap();

        let channel = IpcChannel::bind(&path).unwrap();
        assert!(channel.path().exists());
    }

    #[tokio::test]
    async fn test_read_returns_peer_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, mut peer) = connected_pair(dir.path()).await;
        assert!(channel.is_connected());

        peer.write_all(b"hello").await.unwrap();
        let chunk = channel.read().await.unwrap();
        assert_eq!(chunk, b"hello");
    }

    #[tokio::test]
    async fn test_peer_hangup_is_channel_closed() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, peer) = connected_pair(dir.path()).await;
        drop(peer);

        let err = channel.read().await.unwrap_err();
        assert!(matches!(err, DebugletError::ChannelClosed(_)));
    }

    #[tokio::test]
    async fn test_large_write_arrives_intact() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, mut peer) = connected_pair(dir.path()).await;

        let payload: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        channel.write(&payload).await.unwrap();
        channel.close();

        let mut received = Vec::new();
        peer.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_reads_are_bounded_by_chunk_size() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, mut peer) = connected_pair(dir.path()).await;

        peer.write_all(&vec![7u8; CHUNK_SIZE * 2]).await.unwrap();
        let chunk = channel.read().await.unwrap();
        assert!(!chunk.is_empty());
        assert!(chunk.len() <= CHUNK_SIZE);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, _peer) = connected_pair(dir.path()).await;
        let path = channel.path().to_path_buf();

        channel.close();
        channel.close();
        assert!(!path.exists());

        let err = channel.write(b"late").await.unwrap_err();
        assert!(matches!(err, DebugletError::ChannelClosed(_)));
    }

    #[tokio::test]
    async fn test_drop_removes_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.sock");
        {
            let _channel = IpcChannel::bind(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_frames_decode_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let (mut channel, mut peer) = connected_pair(dir.path()).await;

        let mut big = Breakpoint::at("bp-big", "Services/Billing.cs", 300);
        big.expressions = (0..200).map(|i| format!("invoice.Lines[{}].Total", i)).collect();
        let small = Breakpoint::at("bp-small", "Services/Billing.cs", 12);

        let mut bytes = encode(&big);
        bytes.extend(encode(&small));
        peer.write_all(&bytes).await.unwrap();

        let decoder = FrameDecoder::new();
        assert_eq!(decoder.decode_stream(&mut channel).await.unwrap(), big);
        assert_eq!(decoder.decode_stream(&mut channel).await.unwrap(), small);
    }
}
