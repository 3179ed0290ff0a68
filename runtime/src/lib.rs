//! Debuglet Runtime - Debugger agent implementation.
//!
//! This crate bridges a native debugger engine and the cloud debugger
//! control plane: engine subprocess management, the framed IPC channels,
//! breakpoint reconciliation, retrying poll and report loops, and the
//! gRPC controller client.

#![allow(clippy::result_large_err)]

pub mod agent;
pub mod controller;
pub mod convert;
pub mod engine;
pub mod framer;
pub mod ipc;
pub mod logpoint;
pub mod reconciler;
pub mod retry;

// Re-export common types
pub use agent::{Agent, AgentState, BreakpointPusher, HitReporter};
pub use controller::{ActiveBreakpoints, ControllerApi, DebuggerClient};
pub use controller::{build_debuggee, CredentialSource, GrpcController, MetadataServer};
pub use engine::{EngineController, EngineHandle, EngineLauncher, EngineSpec, ProcessHandle};
pub use framer::{encode, ChunkSink, ChunkSource, FrameDecoder};
pub use ipc::{ChannelPaths, IpcChannel, CHUNK_SIZE};
pub use logpoint::{LogPointSink, TracingLogPointSink};
pub use reconciler::{BreakpointReconciler, ReconcileResult};
pub use retry::{Backoff, LoopAction, RetryLoop};

/// Debuglet Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
