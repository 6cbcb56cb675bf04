//! The provider contract: one trait every CI/CD backend adapter
//! implements, plus the shared result types.
//!
//! Required operations cover the execution lifecycle; optional
//! capability operations have default implementations that reject with
//! [`CapabilityNotSupportedError`] so callers get a typed error instead
//! of a generic failure.

mod argocd;
mod github;
mod jenkins;
mod nexus;
mod registry;

pub use argocd::ArgoCdProvider;
pub use github::GitHubActionsProvider;
pub use jenkins::JenkinsProvider;
pub use nexus::NexusProvider;
pub use registry::ProviderRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::core::ExecutionStatus;
use crate::errors::{CapabilityNotSupportedError, RailyardError, VendorApiError};
use crate::execution::StageInfo;

/// Default per-request timeout for vendor HTTP calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds a reqwest client with the per-request timeout every vendor
/// call carries.
pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, RailyardError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RailyardError::Internal(format!("failed to build http client: {e}")))
}

/// Maps a non-2xx vendor response onto a `VendorApiError`, capturing a
/// bounded slice of the body for diagnostics.
pub(crate) async fn expect_success(
    provider: &str,
    operation: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, RailyardError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    body.truncate(512);
    Err(VendorApiError::status(provider, operation, status.as_u16(), body).into())
}

/// The kind of engine behind a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Classic build server (Jenkins-style).
    Jenkins,
    /// Hosted workflow runner (GitHub Actions-style).
    GithubActions,
    /// GitOps deployment controller (Argo CD-style).
    ArgoCd,
    /// Artifact repository (Nexus-style).
    Nexus,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jenkins => write!(f, "jenkins"),
            Self::GithubActions => write!(f, "github_actions"),
            Self::ArgoCd => write!(f, "argocd"),
            Self::Nexus => write!(f, "nexus"),
        }
    }
}

/// An optional feature a provider may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Build artifact listing and download references.
    Artifacts,
    /// Vendor-side webhook registration.
    Webhooks,
    /// Environment variable injection into runs.
    EnvInjection,
    /// Branch-scoped pipeline creation.
    BranchPipelines,
    /// Pipeline template listing.
    Templates,
    /// Incremental log streaming.
    Streaming,
    /// Execution statistics.
    Stats,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifacts => write!(f, "artifacts"),
            Self::Webhooks => write!(f, "webhooks"),
            Self::EnvInjection => write!(f, "env_injection"),
            Self::BranchPipelines => write!(f, "branch_pipelines"),
            Self::Templates => write!(f, "templates"),
            Self::Streaming => write!(f, "streaming"),
            Self::Stats => write!(f, "stats"),
        }
    }
}

/// The set of capabilities a provider supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet(HashSet<Capability>);

impl CapabilitySet {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set from a list of capabilities.
    #[must_use]
    pub fn from_caps(caps: &[Capability]) -> Self {
        Self(caps.iter().copied().collect())
    }

    /// Returns true if the capability is supported.
    #[must_use]
    pub fn supports(&self, cap: Capability) -> bool {
        self.0.contains(&cap)
    }

    /// Adds a capability.
    pub fn insert(&mut self, cap: Capability) {
        self.0.insert(cap);
    }

    /// Returns the capabilities as a sorted list of names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        names.sort();
        names
    }
}

/// Result of triggering a vendor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionHandle {
    /// The vendor-side run identifier.
    pub vendor_id: String,
    /// Initial canonical status (usually queued or running).
    pub status: ExecutionStatus,
}

/// A point-in-time view of a vendor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    /// Canonical status.
    pub status: ExecutionStatus,
    /// Stage/job breakdown, when the vendor reports one.
    #[serde(default)]
    pub stages: Vec<StageInfo>,
    /// Raw vendor status label, for diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_status: Option<String>,
}

impl PipelineSnapshot {
    /// Creates a snapshot with no stage breakdown.
    #[must_use]
    pub fn new(status: ExecutionStatus) -> Self {
        Self {
            status,
            stages: Vec::new(),
            vendor_status: None,
        }
    }

    /// Attaches the raw vendor status label.
    #[must_use]
    pub fn with_vendor_status(mut self, label: impl Into<String>) -> Self {
        self.vendor_status = Some(label.into());
        self
    }

    /// Attaches a stage breakdown.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<StageInfo>) -> Self {
        self.stages = stages;
        self
    }
}

/// Options for a log fetch.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Continuation marker from a previous chunk.
    pub marker: Option<String>,
    /// Maximum bytes to return, when the vendor supports it.
    pub limit: Option<usize>,
}

/// A chunk of pipeline logs plus a continuation marker.
#[derive(Debug, Clone)]
pub struct LogChunk {
    /// The log text.
    pub text: String,
    /// Marker to pass on the next fetch; `None` when the log is complete.
    pub next_marker: Option<String>,
}

/// A reference to a build artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Artifact file name.
    pub name: String,
    /// Download URL or repository path.
    pub location: String,
    /// Size in bytes, when reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Credential-free provider description for external inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Logical provider name.
    pub name: String,
    /// Engine kind.
    pub kind: ProviderKind,
    /// Connection endpoint.
    pub endpoint: String,
    /// Whether the provider is currently connected.
    pub connected: bool,
    /// Supported capability names.
    pub capabilities: Vec<String>,
    /// Vendor/server version, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A pipeline definition to register with a vendor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Pipeline name.
    pub name: String,
    /// Target repository.
    pub repository: String,
    /// Target branch.
    pub branch: String,
    /// Vendor-specific definition payload.
    #[serde(default)]
    pub definition: serde_json::Value,
}

/// The contract every backend adapter implements.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Logical provider name.
    fn name(&self) -> &str;

    /// Engine kind.
    fn kind(&self) -> ProviderKind;

    /// Supported capabilities.
    fn capabilities(&self) -> &CapabilitySet;

    /// Whether `connect` has succeeded and the provider is live.
    fn is_connected(&self) -> bool;

    /// Verifies reachability and credentials, setting the live flag.
    ///
    /// Failure is non-fatal to the orchestrator; the provider is simply
    /// marked unavailable.
    async fn connect(&self) -> Result<(), RailyardError>;

    /// Clears the live flag at orchestrator shutdown.
    async fn disconnect(&self);

    /// Cheap idempotent health probe. Never errors.
    async fn test_connection(&self) -> bool;

    /// Registers a pipeline definition; returns a vendor pipeline id.
    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<String, RailyardError>;

    /// Triggers a run of a pipeline.
    ///
    /// Safe to retry at the caller's discretion; the contract does not
    /// guarantee vendor-side deduplication.
    async fn execute_pipeline(
        &self,
        pipeline_id: &str,
        parameters: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ExecutionHandle, RailyardError>;

    /// Returns the canonical status of a run.
    ///
    /// Must tolerate being called before the vendor has materialized
    /// the run; that case is reported as queued.
    async fn get_pipeline_status(&self, pipeline_id: &str) -> Result<PipelineSnapshot, RailyardError>;

    /// Returns a log chunk and a continuation marker.
    async fn get_pipeline_logs(
        &self,
        pipeline_id: &str,
        options: &LogOptions,
    ) -> Result<LogChunk, RailyardError>;

    /// Best-effort stop of a run.
    async fn stop_pipeline(&self, pipeline_id: &str) -> Result<(), RailyardError>;

    /// Best-effort deletion of a pipeline definition.
    async fn delete_pipeline(&self, pipeline_id: &str) -> Result<(), RailyardError>;

    /// Credential-free description for external inspection.
    fn provider_info(&self) -> ProviderInfo;

    /// Lists build artifacts for a run. Capability-gated.
    async fn list_artifacts(&self, _pipeline_id: &str) -> Result<Vec<ArtifactRef>, RailyardError> {
        Err(CapabilityNotSupportedError::new(self.name(), Capability::Artifacts.to_string()).into())
    }

    /// Registers a vendor-side webhook. Capability-gated.
    async fn register_webhook(&self, _url: &str) -> Result<(), RailyardError> {
        Err(CapabilityNotSupportedError::new(self.name(), Capability::Webhooks.to_string()).into())
    }

    /// Injects environment variables into a pipeline. Capability-gated.
    async fn set_environment(
        &self,
        _pipeline_id: &str,
        _env: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), RailyardError> {
        Err(
            CapabilityNotSupportedError::new(self.name(), Capability::EnvInjection.to_string())
                .into(),
        )
    }

    /// Creates a branch-scoped pipeline. Capability-gated.
    async fn create_branch_pipeline(
        &self,
        _spec: &PipelineSpec,
        _branch: &str,
    ) -> Result<String, RailyardError> {
        Err(
            CapabilityNotSupportedError::new(self.name(), Capability::BranchPipelines.to_string())
                .into(),
        )
    }

    /// Lists available pipeline templates. Capability-gated.
    async fn list_templates(&self) -> Result<Vec<String>, RailyardError> {
        Err(CapabilityNotSupportedError::new(self.name(), Capability::Templates.to_string()).into())
    }

    /// Returns vendor-side execution statistics. Capability-gated.
    async fn get_stats(&self) -> Result<serde_json::Value, RailyardError> {
        Err(CapabilityNotSupportedError::new(self.name(), Capability::Stats.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_set_supports() {
        let caps = CapabilitySet::from_caps(&[Capability::Artifacts, Capability::Webhooks]);
        assert!(caps.supports(Capability::Artifacts));
        assert!(!caps.supports(Capability::Templates));
    }

    #[test]
    fn test_capability_set_names_sorted() {
        let caps = CapabilitySet::from_caps(&[Capability::Webhooks, Capability::Artifacts]);
        assert_eq!(caps.names(), vec!["artifacts", "webhooks"]);
    }

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::Jenkins.to_string(), "jenkins");
        assert_eq!(ProviderKind::GithubActions.to_string(), "github_actions");
        assert_eq!(ProviderKind::ArgoCd.to_string(), "argocd");
        assert_eq!(ProviderKind::Nexus.to_string(), "nexus");
    }

    #[test]
    fn test_provider_kind_serde() {
        let json = serde_json::to_string(&ProviderKind::GithubActions).unwrap();
        assert_eq!(json, r#""github_actions""#);
        let back: ProviderKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ProviderKind::GithubActions);
    }

    #[tokio::test]
    async fn test_advertised_capabilities_are_implemented() {
        use crate::config::{ProviderConfig, ProviderCredentials};
        use std::sync::Arc;

        let timeout = Duration::from_millis(100);
        let providers: Vec<Arc<dyn Provider>> = vec![
            Arc::new(
                JenkinsProvider::new(
                    ProviderConfig::new("jenkins", ProviderKind::Jenkins, "http://127.0.0.1:1")
                        .with_credentials(ProviderCredentials::basic("admin", "t")),
                    timeout,
                )
                .unwrap(),
            ),
            Arc::new(
                GitHubActionsProvider::new(
                    ProviderConfig::new(
                        "github",
                        ProviderKind::GithubActions,
                        "http://127.0.0.1:1",
                    )
                    .with_credentials(ProviderCredentials::token("t"))
                    .with_extra(serde_json::json!({ "owner": "acme", "repo": "app" })),
                    timeout,
                )
                .unwrap(),
            ),
            Arc::new(
                ArgoCdProvider::new(
                    ProviderConfig::new("argocd", ProviderKind::ArgoCd, "http://127.0.0.1:1"),
                    timeout,
                )
                .unwrap(),
            ),
            Arc::new(
                NexusProvider::new(
                    ProviderConfig::new("nexus", ProviderKind::Nexus, "http://127.0.0.1:1"),
                    timeout,
                )
                .unwrap(),
            ),
        ];

        let spec = PipelineSpec {
            name: "app".to_string(),
            repository: "host:team/app".to_string(),
            branch: "main".to_string(),
            definition: serde_json::Value::Null,
        };
        let all = [
            Capability::Artifacts,
            Capability::Webhooks,
            Capability::EnvInjection,
            Capability::BranchPipelines,
            Capability::Templates,
            Capability::Streaming,
            Capability::Stats,
        ];
        for provider in providers {
            for cap in all {
                if !provider.capabilities().supports(cap) {
                    continue;
                }
                // The endpoints are unreachable, so an advertised
                // operation fails with a transport error, never with a
                // capability rejection.
                let err = match cap {
                    Capability::Artifacts => provider.list_artifacts("demo/1").await.err(),
                    Capability::Webhooks => provider
                        .register_webhook("https://hooks.example.com")
                        .await
                        .err(),
                    Capability::EnvInjection => provider
                        .set_environment("demo", &serde_json::Map::new())
                        .await
                        .err(),
                    Capability::BranchPipelines => {
                        provider.create_branch_pipeline(&spec, "dev").await.err()
                    }
                    Capability::Templates => provider.list_templates().await.err(),
                    Capability::Streaming => provider
                        .get_pipeline_logs("demo/1", &LogOptions::default())
                        .await
                        .err(),
                    Capability::Stats => provider.get_stats().await.err(),
                };
                if let Some(err) = err {
                    assert!(
                        !matches!(err, RailyardError::CapabilityNotSupported(_)),
                        "{} advertises {cap} but rejects it",
                        provider.name()
                    );
                }
            }
        }
    }

    #[test]
    fn test_snapshot_builder() {
        let snap = PipelineSnapshot::new(ExecutionStatus::Running)
            .with_vendor_status("IN_PROGRESS")
            .with_stages(vec![StageInfo::new("build", ExecutionStatus::Running)]);

        assert_eq!(snap.status, ExecutionStatus::Running);
        assert_eq!(snap.vendor_status.as_deref(), Some("IN_PROGRESS"));
        assert_eq!(snap.stages.len(), 1);
    }
}
