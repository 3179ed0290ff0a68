//! Engine module - native debugger engine subprocess.
//!
//! - `EngineSpec`: what the engine debugs and where it connects
//! - `EngineController`: spawns the engine binary
//! - `EngineHandle`: wait on and stop a running engine

mod controller;
mod handle;
mod launcher;
mod spec;

pub use controller::{EngineController, ENGINE_BINARY_NAME};
pub use handle::{EngineHandle, ProcessHandle, DEFAULT_SHUTDOWN_TIMEOUT_MS};
pub use launcher::EngineLauncher;
pub use spec::EngineSpec;
