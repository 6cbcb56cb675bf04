//! GitOps deployment-controller adapter (Argo CD-style API).
//!
//! A "pipeline" here is an application; executing it triggers a sync
//! operation, and the run state is the operation's `phase`.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use super::{
    build_http_client, expect_success, CapabilitySet, ExecutionHandle, LogChunk, LogOptions,
    PipelineSnapshot, PipelineSpec, Provider, ProviderInfo, ProviderKind,
};
use crate::config::ProviderConfig;
use crate::core::ExecutionStatus;
use crate::errors::{ConnectivityError, RailyardError, VendorApiError};

/// Folds an operation phase onto the canonical vocabulary. A missing
/// phase means no sync has started yet.
#[must_use]
pub fn fold_operation_phase(phase: Option<&str>) -> ExecutionStatus {
    match phase {
        Some("Running") | Some("Terminating") => ExecutionStatus::Running,
        Some("Succeeded") => ExecutionStatus::Success,
        Some("Failed") | Some("Error") => ExecutionStatus::Failed,
        Some("Suspended") => ExecutionStatus::Paused,
        _ => ExecutionStatus::Queued,
    }
}

#[derive(Debug, Deserialize)]
struct Application {
    status: Option<ApplicationStatus>,
}

#[derive(Debug, Deserialize)]
struct ApplicationStatus {
    #[serde(rename = "operationState")]
    operation_state: Option<OperationState>,
}

#[derive(Debug, Deserialize)]
struct OperationState {
    phase: Option<String>,
    message: Option<String>,
}

/// Adapter for a GitOps deployment controller.
pub struct ArgoCdProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    connected: AtomicBool,
    capabilities: CapabilitySet,
}

impl ArgoCdProvider {
    /// Creates the adapter.
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self, RailyardError> {
        let client = build_http_client(timeout)?;
        Ok(Self {
            config,
            client,
            connected: AtomicBool::new(false),
            // The sync-centric API exposes none of the optional
            // operations; every capability call is rejected.
            capabilities: CapabilitySet::new(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.config.endpoint.trim_end_matches('/'));
        let mut builder = self.client.request(method, url);
        if let Some(token) = self.config.credentials.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn fetch_application(&self, name: &str, operation: &str) -> Result<Application, RailyardError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/api/v1/applications/{name}"))
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, operation, e))?;
        let response = expect_success(&self.config.name, operation, response).await?;
        response
            .json()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, operation, e).into())
    }
}

#[async_trait]
impl Provider for ArgoCdProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::ArgoCd
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), RailyardError> {
        let response = self
            .request(reqwest::Method::GET, "/api/version")
            .send()
            .await
            .map_err(|e| ConnectivityError::new(&self.config.name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectivityError::new(
                &self.config.name,
                format!("version endpoint answered {}", response.status()),
            )
            .into());
        }

        self.connected.store(true, Ordering::SeqCst);
        info!(provider = %self.config.name, "argocd provider connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn test_connection(&self) -> bool {
        self.request(reqwest::Method::GET, "/api/version")
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<String, RailyardError> {
        let body = if spec.definition.is_object() {
            spec.definition.clone()
        } else {
            serde_json::json!({
                "metadata": { "name": spec.name },
                "spec": {
                    "source": { "repoURL": spec.repository, "targetRevision": spec.branch },
                    "project": "default",
                },
            })
        };

        let response = self
            .request(reqwest::Method::POST, "/api/v1/applications")
            .json(&body)
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "create_pipeline", e))?;
        expect_success(&self.config.name, "create_pipeline", response).await?;
        Ok(spec.name.clone())
    }

    async fn execute_pipeline(
        &self,
        pipeline_id: &str,
        parameters: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ExecutionHandle, RailyardError> {
        let prune = parameters
            .get("prune")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/v1/applications/{pipeline_id}/sync"),
            )
            .json(&serde_json::json!({ "prune": prune }))
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "execute_pipeline", e))?;
        expect_success(&self.config.name, "execute_pipeline", response).await?;

        // Sync operations are tracked on the application itself.
        Ok(ExecutionHandle {
            vendor_id: pipeline_id.to_string(),
            status: ExecutionStatus::Running,
        })
    }

    async fn get_pipeline_status(&self, pipeline_id: &str) -> Result<PipelineSnapshot, RailyardError> {
        let app = match self.fetch_application(pipeline_id, "get_pipeline_status").await {
            Ok(app) => app,
            Err(RailyardError::VendorApi(e)) if e.status == Some(404) => {
                return Ok(PipelineSnapshot::new(ExecutionStatus::Queued)
                    .with_vendor_status("NotFound"));
            }
            Err(e) => return Err(e),
        };

        let phase = app
            .status
            .as_ref()
            .and_then(|s| s.operation_state.as_ref())
            .and_then(|op| op.phase.as_deref());
        Ok(PipelineSnapshot::new(fold_operation_phase(phase))
            .with_vendor_status(phase.unwrap_or("NoOperation")))
    }

    async fn get_pipeline_logs(
        &self,
        pipeline_id: &str,
        _options: &LogOptions,
    ) -> Result<LogChunk, RailyardError> {
        // The controller exposes per-resource logs; the operation
        // message is the closest run-level equivalent.
        let app = self.fetch_application(pipeline_id, "get_pipeline_logs").await?;
        let message = app
            .status
            .and_then(|s| s.operation_state)
            .and_then(|op| op.message)
            .unwrap_or_default();
        Ok(LogChunk {
            text: message,
            next_marker: None,
        })
    }

    async fn stop_pipeline(&self, pipeline_id: &str) -> Result<(), RailyardError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/applications/{pipeline_id}/operation"),
            )
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "stop_pipeline", e))?;
        expect_success(&self.config.name, "stop_pipeline", response).await?;
        Ok(())
    }

    async fn delete_pipeline(&self, pipeline_id: &str) -> Result<(), RailyardError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/applications/{pipeline_id}"),
            )
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "delete_pipeline", e))?;
        expect_success(&self.config.name, "delete_pipeline", response).await?;
        Ok(())
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.config.name.clone(),
            kind: ProviderKind::ArgoCd,
            endpoint: self.config.endpoint.clone(),
            connected: self.is_connected(),
            capabilities: self.capabilities.names(),
            version: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ArgoCdProvider {
        let config = ProviderConfig::new("argocd-test", ProviderKind::ArgoCd, "http://127.0.0.1:1");
        ArgoCdProvider::new(config, Duration::from_millis(100)).unwrap()
    }

    #[test]
    fn test_fold_phases() {
        assert_eq!(fold_operation_phase(Some("Running")), ExecutionStatus::Running);
        assert_eq!(fold_operation_phase(Some("Terminating")), ExecutionStatus::Running);
        assert_eq!(fold_operation_phase(Some("Succeeded")), ExecutionStatus::Success);
        assert_eq!(fold_operation_phase(Some("Failed")), ExecutionStatus::Failed);
        assert_eq!(fold_operation_phase(Some("Error")), ExecutionStatus::Failed);
        assert_eq!(fold_operation_phase(Some("Suspended")), ExecutionStatus::Paused);
    }

    #[test]
    fn test_fold_unknown_is_queued() {
        assert_eq!(fold_operation_phase(None), ExecutionStatus::Queued);
        assert_eq!(fold_operation_phase(Some("Pending")), ExecutionStatus::Queued);
        assert_eq!(fold_operation_phase(Some("Brand-New-Phase")), ExecutionStatus::Queued);
    }

    #[test]
    fn test_advertises_no_capabilities() {
        use crate::providers::Capability;
        let p = provider();
        assert!(!p.capabilities().supports(Capability::Webhooks));
        assert!(!p.capabilities().supports(Capability::Artifacts));
        assert!(p.provider_info().capabilities.is_empty());
    }

    #[tokio::test]
    async fn test_artifacts_rejected() {
        let p = provider();
        let err = p.list_artifacts("app").await.unwrap_err();
        assert!(matches!(err, RailyardError::CapabilityNotSupported(_)));
    }

    #[tokio::test]
    async fn test_connect_failure_is_non_fatal_error() {
        let p = provider();
        assert!(matches!(
            p.connect().await.unwrap_err(),
            RailyardError::Connectivity(_)
        ));
        assert!(!p.is_connected());
    }
}
