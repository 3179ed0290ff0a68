//! Bearer credentials for control-plane calls.

use std::time::Duration;

use debuglet_core::config::Credentials;
use debuglet_core::error::{DebugletError, Result};
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Metadata server host used when `GCE_METADATA_HOST` is not set.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

/// Where access tokens come from.
pub enum CredentialSource {
    /// No authorization metadata.
    None,
    /// A fixed access token.
    Static(String),
    /// The instance metadata server.
    MetadataServer(MetadataServer),
}

impl CredentialSource {
    pub fn from_config(credentials: &Credentials) -> Result<Self> {
        Ok(match credentials {
            Credentials::None => Self::None,
            Credentials::Token(token) => Self::Static(token.clone()),
            Credentials::MetadataServer => Self::MetadataServer(MetadataServer::from_env()?),
        })
    }

    /// Current access token, if this source provides one.
    pub async fn token(&self) -> Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Static(token) => Ok(Some(token.clone())),
            Self::MetadataServer(server) => server.access_token().await.map(Some),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Client for the instance metadata server.
pub struct MetadataServer {
    client: reqwest::Client,
    base_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServer {
    /// Talk to `http://<host>/computeMetadata/v1`.
    pub fn new(host: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| DebugletError::AuthError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: format!("http://{}/computeMetadata/v1", host),
            cached: Mutex::new(None),
        })
    }

    /// Honors `GCE_METADATA_HOST`, the override used by emulators.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("GCE_METADATA_HOST")
            .unwrap_or_else(|_| DEFAULT_METADATA_HOST.to_string());
        Self::new(&host)
    }

    /// Access token for the default service account, cached until shortly
    /// before it expires.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let body = self
            .get("instance/service-accounts/default/token")
            .await?;
        let response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            DebugletError::AuthError(format!("Malformed token response: {}", e))
        })?;

        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!(expires_in = response.expires_in, "Fetched access token");
        *cached = Some(CachedToken {
            value: response.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }

    /// Project id of the instance.
    pub async fn project_id(&self) -> Result<String> {
        let body = self.get("project/project-id").await?;
        let project = body.trim().to_string();
        if project.is_empty() {
            return Err(DebugletError::AuthError(
                "Metadata server returned an empty project id".to_string(),
            ));
        }
        Ok(project)
    }

    async fn get(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| DebugletError::AuthError(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DebugletError::AuthError(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| DebugletError::AuthError(format!("Failed to read {}: {}", url, e)))
    }
}
