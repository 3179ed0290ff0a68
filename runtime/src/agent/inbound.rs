//! Inbound direction: engine -> control plane.

use std::sync::Arc;

use async_trait::async_trait;
use debuglet_core::error::Result;
use debuglet_core::event::events;
use debuglet_core::v2;
use debuglet_core::{DebugletEvent, EventEmitter};
use tokio_util::sync::CancellationToken;

use crate::controller::DebuggerClient;
use crate::convert;
use crate::framer::{ChunkSource, FrameDecoder};
use crate::ipc::IpcChannel;
use crate::logpoint::LogPointSink;
use crate::retry::LoopAction;

/// Reads hit breakpoints from the engine and reports them.
///
/// A hit whose update fails is kept and re-sent before the next frame is
/// read, so a control-plane outage delays reports without dropping them.
pub struct HitReporter<S: ChunkSource = IpcChannel> {
    client: Arc<DebuggerClient>,
    source: S,
    decoder: FrameDecoder,
    log_sink: Arc<dyn LogPointSink>,
    events: EventEmitter,
    cancel: CancellationToken,
    pending: Option<v2::Breakpoint>,
    kill_received: bool,
}

impl<S: ChunkSource> HitReporter<S> {
    pub fn new(
        client: Arc<DebuggerClient>,
        source: S,
        log_sink: Arc<dyn LogPointSink>,
        events: EventEmitter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            source,
            decoder: FrameDecoder::new(),
            log_sink,
            events,
            cancel,
            pending: None,
            kill_received: false,
        }
    }

    /// Whether the engine announced its own shutdown.
    pub fn kill_received(&self) -> bool {
        self.kill_received
    }

    /// Hit that still has to be reported.
    pub fn pending(&self) -> Option<&v2::Breakpoint> {
        self.pending.as_ref()
    }

    pub fn into_source(self) -> S {
        self.source
    }

    async fn report(&mut self, breakpoint: v2::Breakpoint) -> Result<()> {
        match self.client.update_breakpoint(breakpoint.clone()).await {
            Ok(()) => {
                tracing::info!(breakpoint_id = %breakpoint.id, "Reported breakpoint hit");
                Ok(())
            }
            Err(e) => {
                self.pending = Some(breakpoint);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<S: ChunkSource> LoopAction for HitReporter<S> {
    async fn run_once(&mut self) -> Result<()> {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(breakpoint_id = %pending.id, "Retrying hit report");
            self.report(pending).await?;
        }

        // Frames already buffered or on the socket win over cancellation so
        // a kill frame sent right before the engine exits is not lost.
        let frame = tokio::select! {
            biased;
            frame = self.decoder.decode_stream(&mut self.source) => frame?,
            _ = self.cancel.cancelled() => return Ok(()),
        };

        if frame.kill_server {
            tracing::info!("Engine requested shutdown");
            self.kill_received = true;
            self.cancel.cancel();
            return Ok(());
        }

        if frame.log_point && !frame.has_error() {
            if let Err(e) = self.log_sink.write(&frame) {
                tracing::warn!(breakpoint_id = %frame.id, error = %e, "Failed to write log point");
            }
            self.events
                .emit(DebugletEvent::for_breakpoint(events::BREAKPOINT_LOGGED, &frame));
            return Ok(());
        }

        self.events
            .emit(DebugletEvent::for_breakpoint(events::BREAKPOINT_HIT, &frame));
        let mut hit = convert::to_v2_breakpoint(&frame);
        convert::finalize(&mut hit);
        self.report(hit).await
    }
}
