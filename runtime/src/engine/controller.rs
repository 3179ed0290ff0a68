//! EngineController - Spawns the native debugger engine.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use debuglet_core::error::{DebugletError, Result};
use tokio::process::Command;

use super::handle::{EngineHandle, ProcessHandle};
use super::launcher::EngineLauncher;
use super::spec::EngineSpec;

/// File name of the engine binary.
pub const ENGINE_BINARY_NAME: &str = "debuglet-engine";

/// Launcher for the real engine binary.
///
/// The engine runs as a child process with inherited stdout/stderr so its
/// diagnostics end up next to the agent's. It is killed if the handle is
/// dropped without being stopped.
pub struct EngineController {
    /// Path to the engine binary
    engine_path: PathBuf,
}

impl EngineController {
    /// Create a new EngineController.
    ///
    /// # Arguments
    /// * `engine_path` - Path to the engine binary
    ///
    /// # Returns
    /// * `Ok(EngineController)` - The binary exists
    /// * `Err(...)` - The binary was not found
    pub fn new(engine_path: PathBuf) -> Result<Self> {
        if !engine_path.exists() {
            return Err(DebugletError::EngineError {
                message: format!("Engine binary not found: {}", engine_path.display()),
                hint: Some(format!(
                    "Install {} or pass --engine-path",
                    ENGINE_BINARY_NAME
                )),
            });
        }

        Ok(Self { engine_path })
    }

    /// Find the engine binary in common locations.
    ///
    /// Searches in order:
    /// 1. Same directory as current executable
    /// 2. PATH
    pub fn find_engine() -> Result<PathBuf> {
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let candidate = exe_dir.join(ENGINE_BINARY_NAME);
                if candidate.exists() {
                    return Ok(candidate);
                }
            }
        }

        if let Some(path) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&path) {
                let candidate = dir.join(ENGINE_BINARY_NAME);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        Err(DebugletError::EngineError {
            message: format!("Could not find {} binary", ENGINE_BINARY_NAME),
            hint: Some("Pass --engine-path or add the engine to PATH".to_string()),
        })
    }

    pub fn engine_path(&self) -> &PathBuf {
        &self.engine_path
    }
}

#[async_trait]
impl EngineLauncher for EngineController {
    async fn launch(&self, spec: &EngineSpec) -> Result<Box<dyn EngineHandle>> {
        tracing::info!(
            engine = %self.engine_path.display(),
            pipe_name = %spec.pipe_name.display(),
            "Spawning engine subprocess"
        );

        let child = Command::new(&self.engine_path)
            .args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DebugletError::EngineError {
                message: format!("Failed to spawn engine: {}", e),
                hint: Some(format!("Engine path: {}", self.engine_path.display())),
            })?;

        tracing::info!(pid = ?child.id(), "Engine subprocess spawned");
        Ok(Box::new(ProcessHandle::new(child)))
    }
}
