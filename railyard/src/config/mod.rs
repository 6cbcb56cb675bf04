//! Configuration for the orchestrator and its providers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::{CapabilitySet, ProviderKind};

/// Credentials for a provider endpoint.
///
/// Never included in [`crate::providers::ProviderInfo`]; the custom
/// `Debug` impl redacts the token.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    /// Username for basic-auth style vendors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// API token or bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("username", &self.username)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProviderCredentials {
    /// Creates token-only credentials.
    #[must_use]
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            username: None,
            token: Some(token.into()),
        }
    }

    /// Creates username+token credentials.
    #[must_use]
    pub fn basic(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            token: Some(token.into()),
        }
    }
}

/// Static configuration for one backend provider instance.
///
/// Immutable after the provider is constructed; reconfiguration
/// requires re-registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Logical name (unique within the registry).
    pub name: String,
    /// Engine kind.
    pub kind: ProviderKind,
    /// Connection endpoint (base URL).
    pub endpoint: String,
    /// Credentials.
    #[serde(default)]
    pub credentials: ProviderCredentials,
    /// Whether the provider should be constructed at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Capability overrides; adapters fill in their defaults when empty.
    #[serde(default)]
    pub capabilities: CapabilitySet,
    /// Vendor-specific extras (e.g. GitHub owner/repo).
    #[serde(default)]
    pub extra: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    /// Creates a config with the required fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: ProviderKind,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            endpoint: endpoint.into(),
            credentials: ProviderCredentials::default(),
            enabled: true,
            capabilities: CapabilitySet::new(),
            extra: serde_json::Value::Null,
        }
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets a vendor-specific extra field.
    #[must_use]
    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = extra;
        self
    }

    /// Reads a string out of the vendor-specific extras.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Tuning knobs for the orchestrator loops.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum concurrently running executions.
    pub max_concurrent: usize,
    /// Interval between dispatch ticks.
    pub dispatch_interval: Duration,
    /// Interval between status polls per in-flight execution.
    pub monitor_interval: Duration,
    /// Per-request timeout for outbound vendor HTTP calls.
    pub request_timeout: Duration,
    /// Failures within the breaker window before the circuit opens.
    pub breaker_threshold: u32,
    /// Sliding window over which breaker failures are counted.
    pub breaker_window: Duration,
    /// How long an open circuit waits before half-opening.
    pub breaker_reset_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            dispatch_interval: Duration::from_secs(1),
            monitor_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            breaker_threshold: 5,
            breaker_window: Duration::from_secs(60),
            breaker_reset_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency cap.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the dispatch interval.
    #[must_use]
    pub fn with_dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    /// Sets the monitor interval.
    #[must_use]
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Sets the outbound request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the breaker failure threshold.
    #[must_use]
    pub fn with_breaker_threshold(mut self, threshold: u32) -> Self {
        self.breaker_threshold = threshold;
        self
    }

    /// Sets the breaker reset timeout.
    #[must_use]
    pub fn with_breaker_reset_timeout(mut self, timeout: Duration) -> Self {
        self.breaker_reset_timeout = timeout;
        self
    }

    /// Builds a config from `RAILYARD_*` environment variables,
    /// falling back to defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(max) = env_parse::<usize>("RAILYARD_MAX_CONCURRENT") {
            config.max_concurrent = max;
        }
        if let Some(secs) = env_parse::<u64>("RAILYARD_DISPATCH_INTERVAL_SECS") {
            config.dispatch_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("RAILYARD_MONITOR_INTERVAL_SECS") {
            config.monitor_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("RAILYARD_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Builds the static default provider configs from environment
/// variables. A provider is included only when its endpoint variable is
/// set; `*_ENABLED=false` disables it without removing the variables.
#[must_use]
pub fn default_provider_configs() -> Vec<ProviderConfig> {
    let mut configs = Vec::new();

    if let Ok(endpoint) = std::env::var("RAILYARD_JENKINS_URL") {
        configs.push(
            ProviderConfig::new("jenkins-default", ProviderKind::Jenkins, endpoint)
                .with_credentials(ProviderCredentials {
                    username: std::env::var("RAILYARD_JENKINS_USER").ok(),
                    token: std::env::var("RAILYARD_JENKINS_TOKEN").ok(),
                })
                .with_enabled(env_enabled("RAILYARD_JENKINS_ENABLED")),
        );
    }

    if let Ok(endpoint) = std::env::var("RAILYARD_GITHUB_API_URL") {
        let mut config =
            ProviderConfig::new("github-default", ProviderKind::GithubActions, endpoint)
                .with_credentials(ProviderCredentials {
                    username: None,
                    token: std::env::var("RAILYARD_GITHUB_TOKEN").ok(),
                })
                .with_enabled(env_enabled("RAILYARD_GITHUB_ENABLED"));
        if let (Ok(owner), Ok(repo)) = (
            std::env::var("RAILYARD_GITHUB_OWNER"),
            std::env::var("RAILYARD_GITHUB_REPO"),
        ) {
            config = config.with_extra(serde_json::json!({ "owner": owner, "repo": repo }));
        }
        configs.push(config);
    }

    if let Ok(endpoint) = std::env::var("RAILYARD_ARGOCD_URL") {
        configs.push(
            ProviderConfig::new("argocd-default", ProviderKind::ArgoCd, endpoint)
                .with_credentials(ProviderCredentials {
                    username: None,
                    token: std::env::var("RAILYARD_ARGOCD_TOKEN").ok(),
                })
                .with_enabled(env_enabled("RAILYARD_ARGOCD_ENABLED")),
        );
    }

    if let Ok(endpoint) = std::env::var("RAILYARD_NEXUS_URL") {
        configs.push(
            ProviderConfig::new("nexus-default", ProviderKind::Nexus, endpoint)
                .with_credentials(ProviderCredentials {
                    username: std::env::var("RAILYARD_NEXUS_USER").ok(),
                    token: std::env::var("RAILYARD_NEXUS_TOKEN").ok(),
                })
                .with_enabled(env_enabled("RAILYARD_NEXUS_ENABLED")),
        );
    }

    configs
}

fn env_enabled(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_config_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.dispatch_interval, Duration::from_secs(1));
        assert_eq!(config.monitor_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_orchestrator_config_builder() {
        let config = OrchestratorConfig::new()
            .with_max_concurrent(2)
            .with_dispatch_interval(Duration::from_millis(10))
            .with_breaker_threshold(3);

        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.dispatch_interval, Duration::from_millis(10));
        assert_eq!(config.breaker_threshold, 3);
    }

    #[test]
    fn test_provider_config_builder() {
        let config = ProviderConfig::new("jenkins-main", ProviderKind::Jenkins, "https://ci.example.com")
            .with_credentials(ProviderCredentials::basic("admin", "t0ken"))
            .with_extra(serde_json::json!({ "folder": "team-a" }));

        assert_eq!(config.name, "jenkins-main");
        assert!(config.enabled);
        assert_eq!(config.extra_str("folder"), Some("team-a"));
        assert_eq!(config.extra_str("missing"), None);
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let creds = ProviderCredentials::basic("admin", "secret");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_provider_config_serde_defaults() {
        let json = r#"{"name":"n","kind":"jenkins","endpoint":"http://x"}"#;
        let config: ProviderConfig = serde_json::from_str(json).unwrap();
        assert!(config.enabled);
        assert!(config.credentials.token.is_none());
    }
}
