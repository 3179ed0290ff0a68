//! EngineLauncher - Trait for starting a debugger engine.

use async_trait::async_trait;
use debuglet_core::error::Result;

use super::handle::EngineHandle;
use super::spec::EngineSpec;

/// Starts a debugger engine. The agent only talks to the engine through
/// the IPC channels, so tests substitute launchers that connect in-process.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Start an engine for `spec`.
    async fn launch(&self, spec: &EngineSpec) -> Result<Box<dyn EngineHandle>>;
}
