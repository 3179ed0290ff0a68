//! Command-line arguments and their mapping onto `AgentConfig`.

use std::path::PathBuf;

use clap::Parser;
use debuglet_core::config::{
    AgentConfig, Credentials, DebuggeeConfig, EngineFeatures, Platform, RetryConfig, Target,
};
use debuglet_core::error::{DebugletError, Result};

/// Debuglet - cloud debugger agent.
///
/// Flags override values loaded from `--config`.
#[derive(Parser, Debug)]
#[command(name = "debuglet", version, about)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, env = "DEBUGLET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the native debugger engine (searched next to this binary and on PATH when absent)
    #[arg(long, env = "DEBUGLET_ENGINE_PATH")]
    pub engine_path: Option<PathBuf>,

    /// Command line that starts the application under the debugger
    #[arg(long, conflicts_with = "application_id")]
    pub application_start_command: Option<String>,

    /// Attach to an already running process
    #[arg(long)]
    pub application_id: Option<u32>,

    /// Evaluate property getters when capturing variables
    #[arg(long)]
    pub property_evaluation: bool,

    /// Evaluate breakpoint conditions in the engine
    #[arg(long)]
    pub condition_evaluation: bool,

    /// Cloud project id (fetched from the metadata server when absent)
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    pub project_id: Option<String>,

    /// Application module (service) name
    #[arg(long, env = "DEBUGLET_MODULE")]
    pub module: Option<String>,

    /// Application version
    #[arg(long = "app-version", env = "DEBUGLET_VERSION")]
    pub app_version: Option<String>,

    /// Minor version distinguishing instances of one version
    #[arg(long)]
    pub minor_version: Option<String>,

    /// Human readable debuggee description
    #[arg(long)]
    pub description: Option<String>,

    /// Extra debuggee label (KEY=VALUE), can be repeated
    #[arg(long = "label", value_parser = parse_label)]
    pub labels: Vec<(String, String)>,

    /// source-context.json describing the deployed revision
    #[arg(long)]
    pub source_context: Option<PathBuf>,

    /// Hosting platform (detected from the environment when absent)
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Control-plane endpoint URL
    #[arg(long)]
    pub service_endpoint: Option<String>,

    /// Fixed OAuth2 access token instead of the metadata server
    #[arg(long, env = "DEBUGLET_ACCESS_TOKEN", conflicts_with = "no_auth")]
    pub access_token: Option<String>,

    /// Send RPCs without credentials (emulators)
    #[arg(long)]
    pub no_auth: bool,

    /// Lower bound for retry backoff, both directions
    #[arg(long)]
    pub retry_min_interval_ms: Option<u64>,

    /// Upper bound for retry backoff, both directions
    #[arg(long)]
    pub retry_max_interval_ms: Option<u64>,

    /// Directory for the engine IPC sockets
    #[arg(long)]
    pub channel_dir: Option<PathBuf>,

    /// Grace period between SIGTERM and SIGKILL for the engine
    #[arg(long)]
    pub engine_shutdown_timeout_ms: Option<u64>,

    /// Grace period for the agent loops to finish on shutdown
    #[arg(long)]
    pub task_shutdown_timeout_ms: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Build the agent configuration: file values first, then flags.
    ///
    /// The platform is not resolved here; see [`crate::platform::detect`].
    pub fn into_config(self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_file(path)?,
            None => AgentConfig::default(),
        };

        if let Some(path) = self.engine_path {
            config.engine_path = path;
        }
        if let Some(command) = self.application_start_command {
            config.target = Target::StartCommand(command);
        }
        if let Some(pid) = self.application_id {
            config.target = Target::AttachPid(pid);
        }
        config.features = EngineFeatures {
            property_evaluation: config.features.property_evaluation || self.property_evaluation,
            condition_evaluation: config.features.condition_evaluation
                || self.condition_evaluation,
        };

        if self.project_id.is_some() {
            config.debuggee.project_id = self.project_id;
        }
        if let Some(module) = self.module {
            config.debuggee.module = module;
        }
        if let Some(version) = self.app_version {
            config.debuggee.version = version;
        }
        if self.minor_version.is_some() {
            config.debuggee.minor_version = self.minor_version;
        }
        if self.description.is_some() {
            config.debuggee.description = self.description;
        }
        config.debuggee.labels.extend(self.labels);
        if let Some(path) = &self.source_context {
            config.debuggee.source_contexts = DebuggeeConfig::load_source_contexts(path)?;
        }

        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        if let Some(endpoint) = self.service_endpoint {
            config.service_endpoint = endpoint;
        }
        if let Some(token) = self.access_token {
            config.credentials = Credentials::Token(token);
        } else if self.no_auth {
            config.credentials = Credentials::None;
        }

        apply_retry(&mut config.poll_retry, self.retry_min_interval_ms, self.retry_max_interval_ms);
        apply_retry(&mut config.report_retry, self.retry_min_interval_ms, self.retry_max_interval_ms);

        if self.channel_dir.is_some() {
            config.channel_dir = self.channel_dir;
        }
        if let Some(ms) = self.engine_shutdown_timeout_ms {
            config.engine_shutdown_timeout_ms = ms;
        }
        if let Some(ms) = self.task_shutdown_timeout_ms {
            config.task_shutdown_timeout_ms = ms;
        }

        Ok(config)
    }
}

fn apply_retry(retry: &mut RetryConfig, min_ms: Option<u64>, max_ms: Option<u64>) {
    if let Some(ms) = min_ms {
        retry.min_interval_ms = ms;
    }
    if let Some(ms) = max_ms {
        retry.max_interval_ms = ms;
    }
}

fn parse_label(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid label '{}': expected KEY=VALUE", s))?;
    if key.is_empty() {
        return Err(format!("invalid label '{}': empty key", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Format an error for the terminal, with the engine hint when there is one.
pub fn describe(error: &DebugletError) -> String {
    match error {
        DebugletError::EngineError {
            message,
            hint: Some(hint),
        } => format!("{}\n  hint: {}", message, hint),
        other => other.to_string(),
    }
}
