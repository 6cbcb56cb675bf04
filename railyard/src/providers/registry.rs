//! Provider registry and factory.
//!
//! Providers are built from a compile-time kind → constructor match,
//! validated before construction, and connected at registration time.
//! Per-provider failures are logged and broadcast; they never crash the
//! orchestrator. Registration order is preserved because the selection
//! fallback is positional.

use parking_lot::RwLock;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{
    ArgoCdProvider, GitHubActionsProvider, JenkinsProvider, NexusProvider, Provider, ProviderInfo,
    ProviderKind,
};
use crate::config::{ProviderConfig, ProviderCredentials};
use crate::core::PipelineEvent;
use crate::errors::{MissingConfigError, RailyardError};
use crate::events::EventBus;
use crate::store::ProviderRecord;

/// Validates that a config carries every field its kind requires.
///
/// Returns a single error listing all absent fields.
pub fn validate_config(config: &ProviderConfig) -> Result<(), MissingConfigError> {
    let mut missing = Vec::new();

    if config.endpoint.trim().is_empty() {
        missing.push("endpoint".to_string());
    }

    let has_username = config
        .credentials
        .username
        .as_deref()
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    let has_token = config
        .credentials
        .token
        .as_deref()
        .map(|s| !s.is_empty())
        .unwrap_or(false);

    match config.kind {
        ProviderKind::Jenkins | ProviderKind::Nexus => {
            if !has_username {
                missing.push("credentials.username".to_string());
            }
            if !has_token {
                missing.push("credentials.token".to_string());
            }
        }
        ProviderKind::GithubActions => {
            if !has_token {
                missing.push("credentials.token".to_string());
            }
            if config.extra_str("owner").is_none() {
                missing.push("extra.owner".to_string());
            }
            if config.extra_str("repo").is_none() {
                missing.push("extra.repo".to_string());
            }
        }
        ProviderKind::ArgoCd => {
            if !has_token {
                missing.push("credentials.token".to_string());
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingConfigError::new(&config.name, missing))
    }
}

/// Constructs a provider for its kind.
///
/// The explicit match is the compile-time replacement for the source's
/// string-keyed dynamic module loading.
pub fn construct_provider(
    config: ProviderConfig,
    timeout: Duration,
) -> Result<Arc<dyn Provider>, RailyardError> {
    validate_config(&config)?;
    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::Jenkins => Arc::new(JenkinsProvider::new(config, timeout)?),
        ProviderKind::GithubActions => Arc::new(GitHubActionsProvider::new(config, timeout)?),
        ProviderKind::ArgoCd => Arc::new(ArgoCdProvider::new(config, timeout)?),
        ProviderKind::Nexus => Arc::new(NexusProvider::new(config, timeout)?),
    };
    Ok(provider)
}

#[derive(Debug, Deserialize)]
struct RecordConfig {
    endpoint: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    extra: serde_json::Value,
}

/// Converts a persisted provider row into a provider config.
fn config_from_record(record: &ProviderRecord) -> Result<ProviderConfig, RailyardError> {
    let parsed: RecordConfig = serde_json::from_value(record.config.clone())?;
    Ok(ProviderConfig {
        name: record.name.clone(),
        kind: record.provider_type,
        endpoint: parsed.endpoint,
        credentials: ProviderCredentials {
            username: parsed.username,
            token: parsed.token,
        },
        enabled: record.enabled,
        capabilities: Default::default(),
        extra: parsed.extra,
    })
}

/// Ordered registry of live providers.
pub struct ProviderRegistry {
    providers: RwLock<Vec<Arc<dyn Provider>>>,
    bus: EventBus,
    timeout: Duration,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(bus: EventBus, timeout: Duration) -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            bus,
            timeout,
        }
    }

    /// Registers and connects a single provider.
    ///
    /// Construction failures are returned; connection failures are not —
    /// the provider stays registered but disconnected, and selection
    /// only considers connected providers.
    pub async fn register(&self, config: ProviderConfig) -> Result<(), RailyardError> {
        let details = format!("{} @ {}", config.kind, config.endpoint);
        let provider = construct_provider(config, self.timeout)?;
        self.register_instance(provider, details).await;
        Ok(())
    }

    /// Registers an already-constructed provider instance.
    ///
    /// Used by embedders that bring their own [`Provider`] impls.
    pub async fn register_instance(&self, provider: Arc<dyn Provider>, details: String) {
        let name = provider.name().to_string();
        self.providers.write().push(provider.clone());
        self.bus.publish(PipelineEvent::ProviderRegistered {
            provider_name: name.clone(),
            details,
        });

        match provider.connect().await {
            Ok(()) => {
                self.bus.publish(PipelineEvent::ProviderConnected {
                    provider_name: name,
                    details: "connected".to_string(),
                });
            }
            Err(err) => {
                warn!(provider = %name, error = %err, "provider connect failed, leaving disconnected");
                self.bus.publish(PipelineEvent::ProviderError {
                    provider_name: name,
                    details: err.to_string(),
                });
            }
        }
    }

    /// Registers a batch of static configs, skipping disabled entries.
    ///
    /// Invalid configs are logged and omitted; a bad provider never
    /// takes the orchestrator down.
    pub async fn register_defaults(&self, configs: Vec<ProviderConfig>) {
        for config in configs {
            if !config.enabled {
                info!(provider = %config.name, "provider disabled, skipping");
                continue;
            }
            let name = config.name.clone();
            if let Err(err) = self.register(config).await {
                warn!(provider = %name, error = %err, "skipping provider");
                self.bus.publish(PipelineEvent::ProviderError {
                    provider_name: name,
                    details: err.to_string(),
                });
            }
        }
    }

    /// Registers providers from persisted configuration rows.
    pub async fn register_from_records(&self, records: Vec<ProviderRecord>) {
        for record in records {
            if !record.enabled {
                info!(provider = %record.name, "provider row disabled, skipping");
                continue;
            }
            match config_from_record(&record) {
                Ok(config) => {
                    let name = config.name.clone();
                    if let Err(err) = self.register(config).await {
                        warn!(provider = %name, error = %err, "skipping provider row");
                        self.bus.publish(PipelineEvent::ProviderError {
                            provider_name: name,
                            details: err.to_string(),
                        });
                    }
                }
                Err(err) => {
                    warn!(provider = %record.name, error = %err, "malformed provider row, skipping");
                    self.bus.publish(PipelineEvent::ProviderError {
                        provider_name: record.name.clone(),
                        details: err.to_string(),
                    });
                }
            }
        }
    }

    /// Looks up a provider by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Returns all providers in registration order.
    #[must_use]
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers.read().clone()
    }

    /// Returns the first connected provider of the given kind, in
    /// registration order.
    #[must_use]
    pub fn first_connected_of_kind(&self, kind: ProviderKind) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.kind() == kind && p.is_connected())
            .cloned()
    }

    /// Returns the first connected provider in registration order.
    #[must_use]
    pub fn first_connected(&self) -> Option<Arc<dyn Provider>> {
        self.providers
            .read()
            .iter()
            .find(|p| p.is_connected())
            .cloned()
    }

    /// Credential-free descriptions of every registered provider.
    #[must_use]
    pub fn infos(&self) -> Vec<ProviderInfo> {
        self.providers.read().iter().map(|p| p.provider_info()).collect()
    }

    /// Probes every provider's health concurrently.
    pub async fn check_health(&self) -> Vec<(String, bool)> {
        let providers = self.providers();
        let probes = providers.iter().map(|provider| async move {
            (provider.name().to_string(), provider.test_connection().await)
        });
        futures::future::join_all(probes).await
    }

    /// Disconnects every provider at shutdown.
    pub async fn disconnect_all(&self) {
        for provider in self.providers() {
            provider.disconnect().await;
            self.bus.publish(PipelineEvent::ProviderDisconnected {
                provider_name: provider.name().to_string(),
                details: "shutdown".to_string(),
            });
        }
    }

    /// Number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Returns true when no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}
