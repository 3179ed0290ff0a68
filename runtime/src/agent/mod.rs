//! Agent - top-level orchestration.
//!
//! Registers the debuggee, binds both IPC channels, launches the engine,
//! waits for it to connect on both, then runs one retrying loop per
//! direction until something cancels:
//! - `BreakpointPusher`: control plane -> engine
//! - `HitReporter`: engine -> control plane

mod inbound;
mod outbound;

pub use inbound::HitReporter;
pub use outbound::BreakpointPusher;

use std::sync::Arc;
use std::time::Duration;

use debuglet_core::config::{AgentConfig, RetryConfig};
use debuglet_core::error::{DebugletError, Result};
use debuglet_core::event::events;
use debuglet_core::{DebugletEvent, EventEmitter};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::controller::{build_debuggee, ControllerApi, DebuggerClient};
use crate::engine::{EngineHandle, EngineLauncher, EngineSpec};
use crate::ipc::{ChannelPaths, IpcChannel};
use crate::logpoint::{LogPointSink, TracingLogPointSink};
use crate::reconciler::BreakpointReconciler;
use crate::retry::{LoopAction, RetryLoop};

/// Agent state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    /// Constructed, nothing started
    Created,

    /// Registering the debuggee with the control plane
    Registering,

    /// Engine launched, waiting for it to connect
    Starting,

    /// Both directions running
    Running,

    /// Tearing down loops, channels and engine
    Stopping,

    /// Everything released
    Stopped,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Registering => "registering",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Why the running phase ended.
enum Exit {
    /// Cancelled by a kill frame, a fatal loop error or the caller
    Cancelled,
    /// The engine exited on its own
    EngineExited(Result<Option<i32>>),
}

/// The debugger agent for one application instance.
pub struct Agent {
    config: AgentConfig,
    client: Arc<DebuggerClient>,
    launcher: Arc<dyn EngineLauncher>,
    reconciler: Arc<BreakpointReconciler>,
    log_sink: Arc<dyn LogPointSink>,
    events: EventEmitter,
    cancel: CancellationToken,
    state: watch::Sender<AgentState>,
}

impl Agent {
    /// Create an agent. The debuggee descriptor is built from `config`,
    /// whose project id must already be resolved.
    pub fn new(
        config: AgentConfig,
        api: Arc<dyn ControllerApi>,
        launcher: Arc<dyn EngineLauncher>,
    ) -> Result<Self> {
        config.validate()?;
        let debuggee = build_debuggee(&config)?;
        let (state, _) = watch::channel(AgentState::Created);

        Ok(Self {
            config,
            client: Arc::new(DebuggerClient::new(api, debuggee)),
            launcher,
            reconciler: Arc::new(BreakpointReconciler::new()),
            log_sink: Arc::new(TracingLogPointSink),
            events: EventEmitter::default(),
            cancel: CancellationToken::new(),
            state,
        })
    }

    pub fn with_log_sink(mut self, log_sink: Arc<dyn LogPointSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = events;
        self
    }

    /// Token that shuts the agent down when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request an orderly shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn client(&self) -> &Arc<DebuggerClient> {
        &self.client
    }

    pub fn reconciler(&self) -> &Arc<BreakpointReconciler> {
        &self.reconciler
    }

    /// Run until shutdown.
    ///
    /// Returns `Ok` after an external shutdown or a kill frame from the
    /// engine. A disabled debuggee, a fatal loop error or an engine that
    /// exits on its own are returned as errors.
    pub async fn run(&self) -> Result<()> {
        if self.state() != AgentState::Created {
            return Err(DebugletError::InvalidState(format!(
                "agent cannot run from state {}",
                self.state()
            )));
        }

        self.set_state(AgentState::Registering);
        if let Err(e) = self.register().await {
            self.finish();
            return Err(e);
        }
        if self.cancel.is_cancelled() {
            self.finish();
            return Ok(());
        }

        self.set_state(AgentState::Starting);
        let paths = ChannelPaths::generate(&self.config.channel_dir());
        let (mut outbound, mut inbound) = match bind_channels(&paths) {
            Ok(channels) => channels,
            Err(e) => {
                self.finish();
                return Err(e);
            }
        };

        let spec = EngineSpec {
            pipe_name: paths.base.clone(),
            target: self.config.target.clone(),
            features: self.config.features,
        };
        let mut engine = match self.launcher.launch(&spec).await {
            Ok(engine) => engine,
            Err(e) => {
                self.finish();
                return Err(e);
            }
        };

        enum Handshake {
            Connected,
            Failed(DebugletError),
            Cancelled,
            EngineExited(Result<Option<i32>>),
        }

        let handshake = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Handshake::Cancelled,
            connected = async { tokio::try_join!(outbound.accept(), inbound.accept()) } => {
                match connected {
                    Ok(_) => Handshake::Connected,
                    Err(e) => Handshake::Failed(e),
                }
            }
            exit = engine.wait() => Handshake::EngineExited(exit),
        };

        match handshake {
            Handshake::Connected => {}
            Handshake::Cancelled => {
                self.stop_engine(engine.as_mut()).await;
                self.finish();
                return Ok(());
            }
            Handshake::Failed(e) => {
                self.stop_engine(engine.as_mut()).await;
                self.finish();
                return Err(e);
            }
            Handshake::EngineExited(exit) => {
                self.finish();
                return Err(engine_exit_error(exit, "before connecting"));
            }
        }

        tracing::info!(pipe_name = %paths.base.display(), "Engine connected on both channels");
        self.set_state(AgentState::Running);
        self.events.emit(DebugletEvent::empty(events::AGENT_STARTED));

        let pusher = BreakpointPusher::new(
            self.client.clone(),
            self.reconciler.clone(),
            outbound,
            self.events.clone(),
        );
        let reporter = HitReporter::new(
            self.client.clone(),
            inbound,
            self.log_sink.clone(),
            self.events.clone(),
            self.cancel.clone(),
        );
        let outbound_task = spawn_direction("outbound", pusher, self.config.poll_retry, &self.cancel);
        let inbound_task = spawn_direction("inbound", reporter, self.config.report_retry, &self.cancel);

        let exit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Exit::Cancelled,
            exit = engine.wait() => Exit::EngineExited(exit),
        };

        // Teardown
        self.set_state(AgentState::Stopping);
        self.cancel.cancel();

        let grace = self.config.task_shutdown_timeout();
        let (outbound_done, inbound_done) = tokio::join!(
            join_direction("outbound", outbound_task, grace),
            join_direction("inbound", inbound_task, grace),
        );

        let mut kill_received = false;
        let outbound_result = match outbound_done {
            Some((pusher, result)) => {
                pusher.into_sink().close();
                result
            }
            None => Ok(()),
        };
        let inbound_result = match inbound_done {
            Some((reporter, result)) => {
                kill_received = reporter.kill_received();
                if let Some(pending) = reporter.pending() {
                    tracing::warn!(breakpoint_id = %pending.id, "Dropping unreported breakpoint hit");
                }
                reporter.into_source().close();
                result
            }
            None => Ok(()),
        };

        self.stop_engine(engine.as_mut()).await;
        self.finish();

        outbound_result?;
        inbound_result?;
        match exit {
            Exit::EngineExited(_) if kill_received => Ok(()),
            Exit::EngineExited(exit) => Err(engine_exit_error(exit, "while running")),
            Exit::Cancelled => Ok(()),
        }
    }

    /// Register inside a retrying loop so transport errors are retried.
    async fn register(&self) -> Result<()> {
        let registered = self.cancel.child_token();
        let mut action = {
            let client = self.client.clone();
            let registered = registered.clone();
            let emitter = self.events.clone();
            move || {
                let client = client.clone();
                let registered = registered.clone();
                let emitter = emitter.clone();
                async move {
                    let id = client.register().await?;
                    emitter.emit(DebugletEvent::with_string(events::AGENT_REGISTERED, id));
                    registered.cancel();
                    Ok(())
                }
            }
        };

        RetryLoop::new("register", &self.config.poll_retry)
            .run(&mut action, &registered)
            .await
    }

    async fn stop_engine(&self, engine: &mut dyn EngineHandle) {
        if let Err(e) = engine.stop(self.config.engine_shutdown_timeout()).await {
            tracing::warn!(error = %e, "Failed to stop engine");
        }
    }

    fn set_state(&self, state: AgentState) {
        tracing::debug!(%state, "Agent state changed");
        self.state.send_replace(state);
    }

    fn finish(&self) {
        self.set_state(AgentState::Stopped);
        self.events.emit(DebugletEvent::empty(events::AGENT_STOPPED));
        tracing::info!("Agent stopped");
    }
}

fn bind_channels(paths: &ChannelPaths) -> Result<(IpcChannel, IpcChannel)> {
    let outbound = IpcChannel::bind(&paths.outbound)?;
    let inbound = IpcChannel::bind(&paths.inbound)?;
    Ok((outbound, inbound))
}

fn spawn_direction<A>(
    name: &'static str,
    mut action: A,
    retry: RetryConfig,
    cancel: &CancellationToken,
) -> JoinHandle<(A, Result<()>)>
where
    A: LoopAction + 'static,
{
    let cancel = cancel.clone();
    tokio::spawn(async move {
        let result = RetryLoop::new(name, &retry).run(&mut action, &cancel).await;
        if result.is_err() {
            // A fatal error in one direction stops the whole agent.
            cancel.cancel();
        }
        (action, result)
    })
}

/// Wait for a direction task, aborting it after `grace`. Returns the
/// action when the task finished by itself.
async fn join_direction<A>(
    name: &'static str,
    task: JoinHandle<(A, Result<()>)>,
    grace: Duration,
) -> Option<(A, Result<()>)> {
    let abort = task.abort_handle();
    match tokio::time::timeout(grace, task).await {
        Ok(Ok(done)) => Some(done),
        Ok(Err(e)) => {
            tracing::error!(direction = name, error = %e, "Loop task failed");
            None
        }
        Err(_) => {
            tracing::warn!(
                direction = name,
                grace_ms = grace.as_millis() as u64,
                "Loop task did not stop in time, aborting"
            );
            abort.abort();
            None
        }
    }
}

fn engine_exit_error(exit: Result<Option<i32>>, when: &str) -> DebugletError {
    let message = match exit {
        Ok(Some(code)) => format!("Engine exited {} with code {}", when, code),
        Ok(None) => format!("Engine was terminated by a signal {}", when),
        Err(e) => format!("Lost track of the engine {}: {}", when, e),
    };
    DebugletError::EngineError {
        message,
        hint: Some("Check the engine output above for the cause".to_string()),
    }
}
