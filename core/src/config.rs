use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DebugletError, Result};

/// Default control-plane endpoint.
pub const DEFAULT_SERVICE_ENDPOINT: &str = "https://clouddebugger.googleapis.com";

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Path to the native debugger engine binary
    pub engine_path: PathBuf,

    /// What the engine should debug
    pub target: Target,

    /// Optional engine features
    pub features: EngineFeatures,

    /// Identity reported to the control plane
    pub debuggee: DebuggeeConfig,

    /// Hosting platform, resolved once at startup by the caller
    pub platform: Platform,

    /// Control-plane endpoint URL
    pub service_endpoint: String,

    /// How RPC credentials are obtained
    pub credentials: Credentials,

    /// Backoff for the list-active-breakpoints direction
    pub poll_retry: RetryConfig,

    /// Backoff for the hit-report direction
    pub report_retry: RetryConfig,

    /// Directory for the IPC sockets (defaults to the temp dir)
    pub channel_dir: Option<PathBuf>,

    /// Grace period between SIGTERM and SIGKILL for the engine
    pub engine_shutdown_timeout_ms: u64,

    /// Grace period for the loop tasks to finish after cancellation
    pub task_shutdown_timeout_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            engine_path: PathBuf::new(),
            target: Target::default(),
            features: EngineFeatures::default(),
            debuggee: DebuggeeConfig::default(),
            platform: Platform::Unknown,
            service_endpoint: DEFAULT_SERVICE_ENDPOINT.to_string(),
            credentials: Credentials::MetadataServer,
            poll_retry: RetryConfig::default(),
            report_retry: RetryConfig::default(),
            channel_dir: None,
            engine_shutdown_timeout_ms: 2000,
            task_shutdown_timeout_ms: 5000,
        }
    }
}

impl AgentConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DebugletError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: AgentConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Check the configuration for values the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.engine_path.as_os_str().is_empty() {
            return Err(DebugletError::ConfigError(
                "engine_path must be set".to_string(),
            ));
        }
        if let Target::StartCommand(command) = &self.target {
            if command.trim().is_empty() {
                return Err(DebugletError::ConfigError(
                    "application start command must not be empty".to_string(),
                ));
            }
        }
        if self.debuggee.module.trim().is_empty() {
            return Err(DebugletError::ConfigError(
                "debuggee module must not be empty".to_string(),
            ));
        }
        if self.service_endpoint.trim().is_empty() {
            return Err(DebugletError::ConfigError(
                "service_endpoint must not be empty".to_string(),
            ));
        }
        self.poll_retry.validate("poll_retry")?;
        self.report_retry.validate("report_retry")?;
        Ok(())
    }

    /// Directory the IPC sockets are created in.
    pub fn channel_dir(&self) -> PathBuf {
        self.channel_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn engine_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.engine_shutdown_timeout_ms)
    }

    pub fn task_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.task_shutdown_timeout_ms)
    }
}

/// What the native engine debugs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Launch the application with this command line
    StartCommand(String),
    /// Attach to an already running process
    AttachPid(u32),
}

impl Default for Target {
    fn default() -> Self {
        Self::StartCommand(String::new())
    }
}

/// Optional engine features
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineFeatures {
    /// Evaluate property getters when capturing variables
    pub property_evaluation: bool,
    /// Evaluate breakpoint conditions in the engine
    pub condition_evaluation: bool,
}

/// Debuggee identity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggeeConfig {
    /// Cloud project id; resolved from the metadata server when absent
    pub project_id: Option<String>,

    /// Application module (service) name
    pub module: String,

    /// Application version
    pub version: String,

    /// Minor version, distinguishing instances of the same version
    pub minor_version: Option<String>,

    /// Human readable description; derived from module/version when absent
    pub description: Option<String>,

    /// Extra labels attached to the debuggee
    pub labels: HashMap<String, String>,

    /// Source revisions the application was built from
    pub source_contexts: Vec<SourceContextConfig>,
}

impl DebuggeeConfig {
    /// Read source contexts from a `source-context.json` style file.
    ///
    /// Accepts either a single context object or an array of them.
    pub fn load_source_contexts(path: &Path) -> Result<Vec<SourceContextConfig>> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DebugletError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        let contexts = match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            other => vec![serde_json::from_value(other)?],
        };
        Ok(contexts)
    }
}

/// A source revision reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceContextConfig {
    #[serde(rename_all = "camelCase")]
    Git { url: String, revision_id: String },
}

/// Hosting platform label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    CloudRun,
    Gke,
    AppEngine,
    ComputeEngine,
    #[default]
    Unknown,
}

impl Platform {
    /// Label value reported to the control plane.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CloudRun => "cloud_run",
            Self::Gke => "gke",
            Self::AppEngine => "app_engine",
            Self::ComputeEngine => "gce",
            Self::Unknown => "default",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cloud_run" => Ok(Self::CloudRun),
            "gke" => Ok(Self::Gke),
            "app_engine" => Ok(Self::AppEngine),
            "gce" => Ok(Self::ComputeEngine),
            "default" | "unknown" => Ok(Self::Unknown),
            _ => Err(format!(
                "unknown platform: '{}' (supported: cloud_run, gke, app_engine, gce, default)",
                s
            )),
        }
    }
}

/// Source of RPC credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    /// No authorization header (emulators, tests)
    None,
    /// A fixed OAuth2 access token
    Token(String),
    /// Fetch tokens from the GCE metadata server
    MetadataServer,
}

/// Backoff configuration for one retrying action loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Sleep after a successful iteration (0 = run again immediately)
    pub initial_interval_ms: u64,
    /// Substituted when doubling would start from zero
    pub min_interval_ms: u64,
    /// Upper bound for the doubled interval
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 0,
            min_interval_ms: 1000,
            max_interval_ms: 60_000,
        }
    }
}

impl RetryConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.max_interval_ms == 0 {
            return Err(DebugletError::ConfigError(format!(
                "{}: max_interval_ms must be greater than 0",
                name
            )));
        }
        if self.min_interval_ms == 0 {
            return Err(DebugletError::ConfigError(format!(
                "{}: min_interval_ms must be greater than 0",
                name
            )));
        }
        if self.min_interval_ms > self.max_interval_ms {
            return Err(DebugletError::ConfigError(format!(
                "{}: min_interval_ms ({}) cannot exceed max_interval_ms ({})",
                name, self.min_interval_ms, self.max_interval_ms
            )));
        }
        if self.initial_interval_ms > self.max_interval_ms {
            return Err(DebugletError::ConfigError(format!(
                "{}: initial_interval_ms ({}) cannot exceed max_interval_ms ({})",
                name, self.initial_interval_ms, self.max_interval_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> AgentConfig {
        AgentConfig {
            engine_path: PathBuf::from("/opt/debuglet/engine"),
            target: Target::StartCommand("dotnet app.dll".to_string()),
            debuggee: DebuggeeConfig {
                module: "shop".to_string(),
                version: "v1".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert_eq!(config.service_endpoint, DEFAULT_SERVICE_ENDPOINT);
        assert_eq!(config.platform, Platform::Unknown);
        assert_eq!(config.credentials, Credentials::MetadataServer);
        assert_eq!(config.engine_shutdown_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_engine_path_rejected() {
        let mut config = valid_config();
        config.engine_path = PathBuf::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("engine_path"));
    }

    #[test]
    fn test_empty_start_command_rejected() {
        let mut config = valid_config();
        config.target = Target::StartCommand("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_attach_target_accepted() {
        let mut config = valid_config();
        config.target = Target::AttachPid(4242);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_module_rejected() {
        let mut config = valid_config();
        config.debuggee.module = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("module"));
    }

    #[test]
    fn test_retry_min_exceeds_max_rejected() {
        let mut config = valid_config();
        config.poll_retry = RetryConfig {
            initial_interval_ms: 0,
            min_interval_ms: 5000,
            max_interval_ms: 1000,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_retry"));
    }

    #[test]
    fn test_retry_zero_max_rejected() {
        let mut config = valid_config();
        config.report_retry = RetryConfig {
            initial_interval_ms: 0,
            min_interval_ms: 0,
            max_interval_ms: 0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_platform_labels_roundtrip() {
        for platform in [
            Platform::CloudRun,
            Platform::Gke,
            Platform::AppEngine,
            Platform::ComputeEngine,
            Platform::Unknown,
        ] {
            let parsed: Platform = platform.label().parse().unwrap();
            assert_eq!(parsed, platform);
        }
        assert!("mainframe".parse::<Platform>().is_err());
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "engine_path": "/usr/bin/engine",
                "target": {{ "attach_pid": 77 }},
                "debuggee": {{ "module": "api", "version": "2" }},
                "credentials": {{ "token": "abc" }}
            }}"#
        )
        .unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.target, Target::AttachPid(77));
        assert_eq!(config.debuggee.module, "api");
        assert_eq!(config.credentials, Credentials::Token("abc".to_string()));
        assert_eq!(config.poll_retry, RetryConfig::default());
    }

    #[test]
    fn test_load_single_source_context() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "git": {{ "url": "https://github.com/acme/shop", "revisionId": "abc123" }} }}"#
        )
        .unwrap();

        let contexts = DebuggeeConfig::load_source_contexts(file.path()).unwrap();
        assert_eq!(
            contexts,
            vec![SourceContextConfig::Git {
                url: "https://github.com/acme/shop".to_string(),
                revision_id: "abc123".to_string(),
            }]
        );
    }

    #[test]
    fn test_load_source_context_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{ "git": {{ "url": "https://a", "revisionId": "1" }} }},
                {{ "git": {{ "url": "https://b", "revisionId": "2" }} }}
            ]"#
        )
        .unwrap();

        let contexts = DebuggeeConfig::load_source_contexts(file.path()).unwrap();
        assert_eq!(contexts.len(), 2);
    }
}
