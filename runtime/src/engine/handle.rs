//! EngineHandle - Runtime operations on a running engine.

use std::time::Duration;

use async_trait::async_trait;
use debuglet_core::error::Result;
use tokio::process::Child;

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 2000;

/// Runtime operations on a running engine.
#[async_trait]
pub trait EngineHandle: Send {
    /// Process id, if the engine is a process that has not been reaped.
    fn pid(&self) -> Option<u32>;

    /// Resolve when the engine exits on its own, yielding its exit code.
    ///
    /// Cancel-safe, so it can be raced against other work.
    async fn wait(&mut self) -> Result<Option<i32>>;

    /// Stop the engine: ask politely, then force after `grace`. Reaps the
    /// process. Stopping an engine that already exited is a no-op.
    async fn stop(&mut self, grace: Duration) -> Result<()>;
}

/// Handle for an engine subprocess spawned by this agent.
pub struct ProcessHandle {
    child: Child,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

#[async_trait]
impl EngineHandle for ProcessHandle {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> Result<Option<i32>> {
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    async fn stop(&mut self, grace: Duration) -> Result<()> {
        if let Some(status) = self.child.try_wait()? {
            tracing::debug!(?status, "Engine already exited");
            return Ok(());
        }

        // Step 1: SIGTERM so the engine can detach from the debuggee cleanly
        if let Some(pid) = self.child.id() {
            tracing::debug!(pid, "Sending SIGTERM to engine process");
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }

        // Step 2: wait out the grace period, then SIGKILL
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(?status, "Engine process exited gracefully");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Error waiting for engine process, forcing kill");
                self.child.kill().await?;
                Ok(())
            }
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Engine process did not exit gracefully, sending SIGKILL"
                );
                self.child.kill().await?;
                Ok(())
            }
        }
    }
}
