//! Debuglet Core - Breakpoint Records and Shared Types
//!
//! This crate holds everything the agent runtime and the CLI share without
//! doing any I/O: the engine wire records, the control-plane records, the
//! error taxonomy, configuration and lifecycle events.

pub mod config;
pub mod error;
pub mod event;
pub mod v2;
pub mod wire;

// Re-export commonly used types
pub use config::{AgentConfig, Credentials, DebuggeeConfig, Platform, RetryConfig, Target};
pub use error::{DebugletError, Result};
pub use event::{DebugletEvent, EventEmitter};

/// Debuglet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
