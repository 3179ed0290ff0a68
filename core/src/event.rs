//! Agent lifecycle events.
//!
//! Fire-and-forget notifications about registration, startup and breakpoint
//! traffic. Emitting never blocks and succeeds whether or not anyone listens.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::wire::Breakpoint;

pub type EventKey = String;

/// What an event carries besides its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// A breakpoint id and the source position it is set at.
    Breakpoint { id: String, path: String, line: i32 },
    String(String),
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugletEvent {
    /// One of the [`events`] keys.
    pub key: EventKey,
    pub payload: EventPayload,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DebugletEvent {
    pub fn new(key: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            key: key.into(),
            payload,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn empty(key: impl Into<String>) -> Self {
        Self::new(key, EventPayload::Empty)
    }

    pub fn with_string(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key, EventPayload::String(message.into()))
    }

    /// Event about `breakpoint`. A breakpoint without a location reports an
    /// empty path and line 0.
    pub fn for_breakpoint(key: impl Into<String>, breakpoint: &Breakpoint) -> Self {
        let (path, line) = breakpoint
            .location
            .as_ref()
            .map(|l| (l.path.clone(), l.line))
            .unwrap_or_default();
        Self::new(
            key,
            EventPayload::Breakpoint {
                id: breakpoint.id.clone(),
                path,
                line,
            },
        )
    }
}

/// Broadcasts events to every current subscriber.
#[derive(Clone)]
pub struct EventEmitter {
    sender: Arc<broadcast::Sender<DebugletEvent>>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Send `event`. Dropped when nobody subscribes or a receiver lags.
    pub fn emit(&self, event: DebugletEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DebugletEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Event keys.
pub mod events {
    // Agent lifecycle
    pub const AGENT_REGISTERED: &str = "agent.registered";
    pub const AGENT_STARTED: &str = "agent.started";
    pub const AGENT_STOPPED: &str = "agent.stopped";

    // Breakpoint traffic
    pub const BREAKPOINT_NEW: &str = "breakpoint.new";
    pub const BREAKPOINT_REMOVED: &str = "breakpoint.removed";
    pub const BREAKPOINT_HIT: &str = "breakpoint.hit";
    pub const BREAKPOINT_LOGGED: &str = "breakpoint.logged";
}
