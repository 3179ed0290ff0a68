//! Registration descriptor for the running application.

use std::collections::{BTreeMap, HashMap};

use debuglet_core::config::{AgentConfig, SourceContextConfig};
use debuglet_core::error::{DebugletError, Result};
use debuglet_core::v2::{source_context, Debuggee, GitSourceContext, SourceContext};
use sha2::{Digest, Sha256};

pub const LABEL_MODULE: &str = "module";
pub const LABEL_VERSION: &str = "version";
pub const LABEL_MINOR_VERSION: &str = "minorversion";
pub const LABEL_PLATFORM: &str = "platform";

/// Build the debuggee sent on registration.
///
/// The project id must already be resolved in `config.debuggee.project_id`.
pub fn build_debuggee(config: &AgentConfig) -> Result<Debuggee> {
    let identity = &config.debuggee;
    let project = identity
        .project_id
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| DebugletError::ConfigError("project id is not set".to_string()))?
        .to_string();

    let labels = labels(config);
    let source_contexts: Vec<SourceContext> = identity
        .source_contexts
        .iter()
        .map(to_source_context)
        .collect();
    let agent_version = agent_version();
    let uniquifier = compute_uniquifier(&project, &labels, &source_contexts, &agent_version);

    let description = identity.description.clone().unwrap_or_else(|| {
        format!("{}-{}-{}", project, identity.module, identity.version)
    });

    Ok(Debuggee {
        project,
        uniquifier,
        description,
        agent_version,
        labels,
        source_contexts,
        ..Default::default()
    })
}

/// Debuggee labels. Reserved keys win over user-supplied extras.
pub fn labels(config: &AgentConfig) -> HashMap<String, String> {
    let identity = &config.debuggee;
    let mut labels = identity.labels.clone();
    labels.insert(LABEL_MODULE.to_string(), identity.module.clone());
    labels.insert(LABEL_VERSION.to_string(), identity.version.clone());
    if let Some(minor) = identity.minor_version.as_ref().filter(|m| !m.is_empty()) {
        labels.insert(LABEL_MINOR_VERSION.to_string(), minor.clone());
    } else {
        labels.remove(LABEL_MINOR_VERSION);
    }
    labels.insert(
        LABEL_PLATFORM.to_string(),
        config.platform.label().to_string(),
    );
    labels
}

/// Stable hex SHA-256 over everything that identifies this debuggee.
pub fn compute_uniquifier(
    project: &str,
    labels: &HashMap<String, String>,
    source_contexts: &[SourceContext],
    agent_version: &str,
) -> String {
    let mut hasher = Sha256::new();
    let mut field = |value: &str| {
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    };

    field(project);
    field(agent_version);
    let sorted: BTreeMap<&String, &String> = labels.iter().collect();
    for (key, value) in sorted {
        field(key);
        field(value);
    }
    for context in source_contexts {
        if let Some(source_context::Context::Git(git)) = &context.context {
            field(&git.url);
            field(&git.revision_id);
        }
    }

    hex::encode(hasher.finalize())
}

fn agent_version() -> String {
    format!("debuglet/rust/v{}", debuglet_core::VERSION)
}

fn to_source_context(config: &SourceContextConfig) -> SourceContext {
    match config {
        SourceContextConfig::Git { url, revision_id } => SourceContext {
            context: Some(source_context::Context::Git(GitSourceContext {
                url: url.clone(),
                revision_id: revision_id.clone(),
            })),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debuglet_core::config::{DebuggeeConfig, Platform};

    fn config() -> AgentConfig {
        AgentConfig {
            platform: Platform::CloudRun,
            debuggee: DebuggeeConfig {
                project_id: Some("acme-prod".to_string()),
                module: "checkout".to_string(),
                version: "v42".to_string(),
                source_contexts: vec![SourceContextConfig::Git {
                    url: "https://github.com/acme/checkout".to_string(),
                    revision_id: "9f1c2e".to_string(),
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_build_debuggee_fields() {
        let debuggee = build_debuggee(&config()).unwrap();

        assert_eq!(debuggee.project, "acme-prod");
        assert_eq!(debuggee.description, "acme-prod-checkout-v42");
        assert!(debuggee.agent_version.starts_with("debuglet/rust/v"));
        assert_eq!(debuggee.uniquifier.len(), 64);
        assert!(debuggee.id.is_empty());
        assert_eq!(debuggee.source_contexts.len(), 1);
        assert_eq!(debuggee.labels[LABEL_MODULE], "checkout");
        assert_eq!(debuggee.labels[LABEL_VERSION], "v42");
        assert_eq!(debuggee.labels[LABEL_PLATFORM], "cloud_run");
        assert!(!debuggee.labels.contains_key(LABEL_MINOR_VERSION));
    }

    #[test]
    fn test_missing_project_is_config_error() {
        let mut config = config();
        config.debuggee.project_id = None;
        assert!(matches!(
            build_debuggee(&config),
            Err(DebugletError::ConfigError(_))
        ));
    }

    #[test]
    fn test_explicit_description_is_kept() {
        let mut config = config();
        config.debuggee.description = Some("checkout canary".to_string());
        assert_eq!(build_debuggee(&config).unwrap().description, "checkout canary");
    }

    #[test]
    fn test_reserved_labels_override_extras() {
        let mut config = config();
        config
            .debuggee
            .labels
            .insert("module".to_string(), "spoofed".to_string());
        config
            .debuggee
            .labels
            .insert("team".to_string(), "payments".to_string());
        config.debuggee.minor_version = Some("20260101t1200".to_string());

        let labels = labels(&config);
        assert_eq!(labels["module"], "checkout");
        assert_eq!(labels["team"], "payments");
        assert_eq!(labels[LABEL_MINOR_VERSION], "20260101t1200");
    }

    #[test]
    fn test_uniquifier_is_stable_and_sensitive() {
        let first = build_debuggee(&config()).unwrap().uniquifier;
        let again = build_debuggee(&config()).unwrap().uniquifier;
        assert_eq!(first, again);

        let mut other = config();
        other.debuggee.version = "v43".to_string();
        assert_ne!(build_debuggee(&other).unwrap().uniquifier, first);

        let mut moved = config();
        moved.platform = Platform::Gke;
        assert_ne!(build_debuggee(&moved).unwrap().uniquifier, first);
    }
}
