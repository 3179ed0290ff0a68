//! Debuglet CLI entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use debuglet_core::{DebugletError, Platform};
use debuglet_runtime::{Agent, CredentialSource, EngineController, GrpcController, MetadataServer};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use debuglet_cli::args::{describe, Cli};
use debuglet_cli::platform;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<DebugletError>() {
            Some(err @ DebugletError::EngineError { .. }) => eprintln!("Error: {}", describe(err)),
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = cli.into_config()?;

    if config.platform == Platform::Unknown {
        config.platform = platform::detect();
    }
    if config.engine_path.as_os_str().is_empty() {
        config.engine_path = EngineController::find_engine()?;
    }
    if config.debuggee.project_id.is_none() {
        let project_id = MetadataServer::from_env()?
            .project_id()
            .await
            .context("No --project-id given and the metadata server did not provide one")?;
        config.debuggee.project_id = Some(project_id);
    }

    tracing::info!(
        version = debuglet_runtime::VERSION,
        platform = %config.platform,
        module = %config.debuggee.module,
        endpoint = %config.service_endpoint,
        "Starting debuglet"
    );

    let engine = EngineController::new(config.engine_path.clone())?;
    let credentials = CredentialSource::from_config(&config.credentials)?;
    let controller = GrpcController::connect_lazy(&config.service_endpoint, credentials)?;
    let agent = Agent::new(config, Arc::new(controller), Arc::new(engine))?;

    spawn_shutdown_listener(agent.cancellation_token())?;
    agent.run().await?;
    Ok(())
}

/// Cancel the agent on Ctrl-C or SIGTERM.
fn spawn_shutdown_listener(cancel: CancellationToken) -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl-C, shutting down"),
            _ = terminate.recv() => tracing::info!("Received SIGTERM, shutting down"),
        }
        cancel.cancel();
    });
    Ok(())
}
