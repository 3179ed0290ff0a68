//! Outbound direction: control plane -> engine.

use std::sync::Arc;

use async_trait::async_trait;
use debuglet_core::error::Result;
use debuglet_core::event::events;
use debuglet_core::wire::Breakpoint;
use debuglet_core::{DebugletEvent, EventEmitter};

use crate::controller::DebuggerClient;
use crate::convert;
use crate::framer::{encode, ChunkSink};
use crate::ipc::IpcChannel;
use crate::reconciler::BreakpointReconciler;
use crate::retry::LoopAction;

/// Polls the active set and pushes the delta to the engine.
///
/// New breakpoints are written first, in snapshot order, then a tombstone
/// (`activated = false`) for every breakpoint that disappeared.
pub struct BreakpointPusher<S: ChunkSink = IpcChannel> {
    client: Arc<DebuggerClient>,
    reconciler: Arc<BreakpointReconciler>,
    sink: S,
    events: EventEmitter,
}

impl<S: ChunkSink> BreakpointPusher<S> {
    pub fn new(
        client: Arc<DebuggerClient>,
        reconciler: Arc<BreakpointReconciler>,
        sink: S,
        events: EventEmitter,
    ) -> Self {
        Self {
            client,
            reconciler,
            sink,
            events,
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    async fn push(&mut self, breakpoint: &Breakpoint) -> Result<()> {
        self.sink.write_bytes(&encode(breakpoint)).await
    }
}

#[async_trait]
impl<S: ChunkSink> LoopAction for BreakpointPusher<S> {
    async fn run_once(&mut self) -> Result<()> {
        let active = self.client.list_active_breakpoints().await?;
        if active.wait_expired {
            tracing::trace!("Long poll expired without changes");
            return Ok(());
        }

        let delta = self
            .reconciler
            .reconcile(convert::to_wire_breakpoints(&active.breakpoints));

        for breakpoint in &delta.new {
            let location = breakpoint
                .location
                .as_ref()
                .map(|l| format!("{}:{}", l.path, l.line))
                .unwrap_or_default();
            tracing::info!(breakpoint_id = %breakpoint.id, %location, "Setting breakpoint");
            self.push(breakpoint).await?;
            self.events
                .emit(DebugletEvent::for_breakpoint(events::BREAKPOINT_NEW, breakpoint));
        }

        for breakpoint in &delta.removed {
            tracing::info!(breakpoint_id = %breakpoint.id, "Removing breakpoint");
            self.push(&breakpoint.tombstone()).await?;
            self.events
                .emit(DebugletEvent::for_breakpoint(events::BREAKPOINT_REMOVED, breakpoint));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::FakeController;
    use crate::framer::{ChunkSource, FrameDecoder};
    use debuglet_core::error::DebugletError;
    use debuglet_core::v2;

    /// Replays previously written bytes as a single chunk.
    struct Replay(Option<Vec<u8>>);

    #[async_trait]
    impl ChunkSource for Replay {
        async fn read_chunk(&mut self) -> Result<Vec<u8>> {
            self.0
                .take()
                .ok_or_else(|| DebugletError::ChannelClosed("replay exhausted".to_string()))
        }
    }

    fn listing(ids: &[(&str, i32)]) -> v2::ListActiveBreakpointsResponse {
        v2::ListActiveBreakpointsResponse {
            breakpoints: ids
                .iter()
                .map(|(id, line)| v2::Breakpoint {
                    id: id.to_string(),
                    location: Some(v2::SourceLocation {
                        path: "file.cs".to_string(),
                        line: *line,
                        column: 0,
                    }),
                    ..Default::default()
                })
                .collect(),
            next_wait_token: "next".to_string(),
            wait_expired: false,
        }
    }

    async fn registered(fake: &Arc<FakeController>) -> Arc<DebuggerClient> {
        let client = Arc::new(DebuggerClient::new(fake.clone(), v2::Debuggee::default()));
        client.register().await.unwrap();
        client
    }

    async fn frames(bytes: Vec<u8>) -> Vec<Breakpoint> {
        let decoder = FrameDecoder::new();
        let mut source = Replay(Some(bytes));
        let mut out = Vec::new();
        while let Ok(breakpoint) = decoder.decode_stream(&mut source).await {
            out.push(breakpoint);
        }
        out
    }

    #[tokio::test]
    async fn test_pushes_new_then_tombstones() {
        let fake = Arc::new(FakeController::default());
        fake.script_list(Ok(listing(&[("A", 10), ("B", 20)])));
        fake.script_list(Ok(listing(&[("A", 10)])));
        let client = registered(&fake).await;
        let reconciler = Arc::new(BreakpointReconciler::new());
        let events = EventEmitter::default();
        let mut rx = events.subscribe();

        let mut pusher = BreakpointPusher::new(client, reconciler.clone(), Vec::new(), events);
        pusher.run_once().await.unwrap();
        pusher.run_once().await.unwrap();

        let written = frames(pusher.into_sink()).await;
        let summary: Vec<(&str, bool)> = written
            .iter()
            .map(|b| (b.id.as_str(), b.activated))
            .collect();
        assert_eq!(summary, vec![("A", true), ("B", true), ("B", false)]);
        assert_eq!(written[2].location.as_ref().unwrap().line, 20);
        assert_eq!(reconciler.len(), 1);

        assert_eq!(rx.recv().await.unwrap().key, events::BREAKPOINT_NEW);
        assert_eq!(rx.recv().await.unwrap().key, events::BREAKPOINT_NEW);
        assert_eq!(rx.recv().await.unwrap().key, events::BREAKPOINT_REMOVED);
    }

    #[tokio::test]
    async fn test_wait_expired_leaves_state_untouched() {
        let fake = Arc::new(FakeController::default());
        fake.script_list(Ok(listing(&[("A", 10)])));
        // Unscripted lists answer with wait_expired and no breakpoints.
        let client = registered(&fake).await;
        let reconciler = Arc::new(BreakpointReconciler::new());

        let mut pusher =
            BreakpointPusher::new(client, reconciler.clone(), Vec::new(), EventEmitter::default());
        pusher.run_once().await.unwrap();
        pusher.run_once().await.unwrap();

        assert_eq!(reconciler.len(), 1);
        let written = frames(pusher.into_sink()).await;
        assert_eq!(written.len(), 1);
        assert!(written[0].activated);
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_writes_nothing() {
        let fake = Arc::new(FakeController::default());
        fake.script_list(Ok(listing(&[("A", 10)])));
        fake.script_list(Ok(listing(&[("A", 10)])));
        let client = registered(&fake).await;

        let mut pusher = BreakpointPusher::new(
            client,
            Arc::new(BreakpointReconciler::new()),
            Vec::new(),
            EventEmitter::default(),
        );
        pusher.run_once().await.unwrap();
        let after_first = pusher.sink.len();
        pusher.run_once().await.unwrap();
        assert_eq!(pusher.sink.len(), after_first);
    }

    #[tokio::test]
    async fn test_list_failure_propagates_without_writes() {
        let fake = Arc::new(FakeController::default());
        fake.script_list(Err(FakeController::unavailable()));
        let client = registered(&fake).await;

        let mut pusher = BreakpointPusher::new(
            client,
            Arc::new(BreakpointReconciler::new()),
            Vec::new(),
            EventEmitter::default(),
        );
        let err = pusher.run_once().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(pusher.into_sink().is_empty());
    }
}
