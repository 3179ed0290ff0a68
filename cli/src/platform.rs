//! Hosting platform detection.

use debuglet_core::Platform;

/// Detect the hosting platform from the process environment.
pub fn detect() -> Platform {
    detect_with(|name| std::env::var(name).ok())
}

/// Detect the hosting platform using `lookup` to read variables.
///
/// Cloud Run is checked before GKE because Cloud Run for Anthos sets both.
pub fn detect_with(lookup: impl Fn(&str) -> Option<String>) -> Platform {
    let is_set = |name: &str| lookup(name).is_some_and(|v| !v.is_empty());

    if is_set("K_SERVICE") {
        Platform::CloudRun
    } else if is_set("KUBERNETES_SERVICE_HOST") {
        Platform::Gke
    } else if is_set("GAE_SERVICE") {
        Platform::AppEngine
    } else {
        Platform::Unknown
    }
}
