//! Control-plane client.
//!
//! - `ControllerApi`: the three controller RPCs, one call each
//! - `DebuggerClient`: registration state machine on top of the RPCs
//! - `GrpcController`: tonic transport for `ControllerApi`
//! - `CredentialSource`: bearer tokens for the transport
//! - `build_debuggee`: the registration descriptor

mod credentials;
mod debuggee;
mod grpc;

pub use credentials::{CredentialSource, MetadataServer, DEFAULT_METADATA_HOST};
pub use debuggee::{build_debuggee, compute_uniquifier, labels};
pub use grpc::{GrpcController, LIST_TIMEOUT, RPC_TIMEOUT};

use std::sync::Arc;

use async_trait::async_trait;
use debuglet_core::error::{DebugletError, Result};
use debuglet_core::v2::{
    Breakpoint, Debuggee, ListActiveBreakpointsRequest, ListActiveBreakpointsResponse,
    RegisterDebuggeeRequest, RegisterDebuggeeResponse, UpdateActiveBreakpointRequest,
    UpdateActiveBreakpointResponse, INITIAL_WAIT_TOKEN,
};
use parking_lot::Mutex;

/// Raw controller RPCs.
#[async_trait]
pub trait ControllerApi: Send + Sync {
    async fn register_debuggee(
        &self,
        request: RegisterDebuggeeRequest,
    ) -> Result<RegisterDebuggeeResponse>;

    async fn list_active_breakpoints(
        &self,
        request: ListActiveBreakpointsRequest,
    ) -> Result<ListActiveBreakpointsResponse>;

    async fn update_active_breakpoint(
        &self,
        request: UpdateActiveBreakpointRequest,
    ) -> Result<UpdateActiveBreakpointResponse>;
}

/// Outcome of one long poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveBreakpoints {
    pub breakpoints: Vec<Breakpoint>,
    /// The poll timed out without changes. `breakpoints` is then empty and
    /// says nothing about the active set.
    pub wait_expired: bool,
}

#[derive(Debug)]
struct Registration {
    debuggee_id: Option<String>,
    wait_token: String,
}

/// Client for one debuggee registration.
///
/// Unregistered until [`register`](Self::register) succeeds. A not-found
/// answer to a list or update registers again and retries the call once.
/// The old id stays in place until the new registration lands, and callers
/// that hit not-found at the same time share one re-registration.
pub struct DebuggerClient {
    api: Arc<dyn ControllerApi>,
    debuggee: Debuggee,
    state: Mutex<Registration>,
    recovery: tokio::sync::Mutex<()>,
}

impl DebuggerClient {
    pub fn new(api: Arc<dyn ControllerApi>, debuggee: Debuggee) -> Self {
        Self {
            api,
            debuggee,
            state: Mutex::new(Registration {
                debuggee_id: None,
                wait_token: INITIAL_WAIT_TOKEN.to_string(),
            }),
            recovery: tokio::sync::Mutex::new(()),
        }
    }

    /// Register the debuggee and return its id.
    pub async fn register(&self) -> Result<String> {
        let response = self
            .api
            .register_debuggee(RegisterDebuggeeRequest {
                debuggee: Some(self.debuggee.clone()),
            })
            .await?;

        let debuggee = response.debuggee.ok_or_else(|| {
            DebugletError::Other("register response carries no debuggee".to_string())
        })?;

        if debuggee.is_disabled {
            self.unregister();
            return Err(DebugletError::DebuggeeDisabled(if debuggee.id.is_empty() {
                self.debuggee.uniquifier.clone()
            } else {
                debuggee.id
            }));
        }
        if debuggee.id.is_empty() {
            return Err(DebugletError::Other(
                "register response carries no debuggee id".to_string(),
            ));
        }

        {
            let mut state = self.state.lock();
            state.debuggee_id = Some(debuggee.id.clone());
            state.wait_token = INITIAL_WAIT_TOKEN.to_string();
        }
        tracing::info!(debuggee_id = %debuggee.id, "Debuggee registered");
        Ok(debuggee.id)
    }

    /// Long-poll for the active breakpoint set.
    pub async fn list_active_breakpoints(&self) -> Result<ActiveBreakpoints> {
        let (debuggee_id, wait_token) = self.session()?;
        match self.try_list(debuggee_id.clone(), wait_token).await {
            Err(e) if e.is_not_found() => {
                self.recover_registration(&debuggee_id, &e).await?;
                let (debuggee_id, wait_token) = self.session()?;
                self.try_list(debuggee_id, wait_token).await
            }
            other => other,
        }
    }

    /// Report the final state of a breakpoint.
    pub async fn update_breakpoint(&self, breakpoint: Breakpoint) -> Result<()> {
        let (debuggee_id, _) = self.session()?;
        match self.try_update(debuggee_id.clone(), breakpoint.clone()).await {
            Err(e) if e.is_not_found() => {
                self.recover_registration(&debuggee_id, &e).await?;
                let (debuggee_id, _) = self.session()?;
                self.try_update(debuggee_id, breakpoint).await
            }
            other => other,
        }
    }

    /// Forget the current registration.
    pub fn unregister(&self) {
        let mut state = self.state.lock();
        state.debuggee_id = None;
        state.wait_token = INITIAL_WAIT_TOKEN.to_string();
    }

    pub fn is_registered(&self) -> bool {
        self.state.lock().debuggee_id.is_some()
    }

    pub fn debuggee_id(&self) -> Option<String> {
        self.state.lock().debuggee_id.clone()
    }

    pub fn wait_token(&self) -> String {
        self.state.lock().wait_token.clone()
    }

    /// Register again after `stale_id` was rejected.
    ///
    /// Skipped when another caller already replaced `stale_id` while this
    /// one waited for the lock.
    async fn recover_registration(&self, stale_id: &str, cause: &DebugletError) -> Result<()> {
        let _guard = self.recovery.lock().await;
        if self.debuggee_id().as_deref() != Some(stale_id) {
            tracing::debug!(stale_id, "Debuggee already registered again");
            return Ok(());
        }
        tracing::warn!(error = %cause, "Debuggee unknown to the control plane, registering again");
        self.register().await?;
        Ok(())
    }

    /// Current debuggee id and wait token.
    fn session(&self) -> Result<(String, String)> {
        let state = self.state.lock();
        let debuggee_id = state.debuggee_id.clone().ok_or_else(|| {
            DebugletError::InvalidState("debuggee is not registered".to_string())
        })?;
        Ok((debuggee_id, state.wait_token.clone()))
    }

    async fn try_list(&self, debuggee_id: String, wait_token: String) -> Result<ActiveBreakpoints> {
        let response = self
            .api
            .list_active_breakpoints(ListActiveBreakpointsRequest {
                debuggee_id: debuggee_id.clone(),
                wait_token,
                success_on_timeout: true,
            })
            .await?;

        if !response.next_wait_token.is_empty() {
            let mut state = self.state.lock();
            // A token issued to a replaced registration means nothing to the new one.
            if state.debuggee_id.as_deref() == Some(debuggee_id.as_str()) {
                state.wait_token = response.next_wait_token;
            }
        }

        Ok(ActiveBreakpoints {
            breakpoints: response.breakpoints,
            wait_expired: response.wait_expired,
        })
    }

    async fn try_update(&self, debuggee_id: String, breakpoint: Breakpoint) -> Result<()> {
        self.api
            .update_active_breakpoint(UpdateActiveBreakpointRequest {
                debuggee_id,
                breakpoint: Some(breakpoint),
            })
            .await?;
        Ok(())
    }
}
