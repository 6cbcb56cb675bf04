//! Artifact-repository adapter (Nexus-style API).
//!
//! A "pipeline" here is a repository task (publish, move, cleanup);
//! the vendor reports a `currentState` while a task runs and a
//! `lastRunResult` once it finishes.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use super::{
    build_http_client, expect_success, ArtifactRef, Capability, CapabilitySet, ExecutionHandle,
    LogChunk, LogOptions, PipelineSnapshot, PipelineSpec, Provider, ProviderInfo, ProviderKind,
};
use crate::config::ProviderConfig;
use crate::core::ExecutionStatus;
use crate::errors::{ConnectivityError, RailyardError, VendorApiError};

/// Folds a task's `currentState` + `lastRunResult` pair onto the
/// canonical vocabulary.
#[must_use]
pub fn fold_task_status(current_state: &str, last_run_result: Option<&str>) -> ExecutionStatus {
    match current_state {
        "RUNNING" => ExecutionStatus::Running,
        "WAITING" | "OK" => match last_run_result {
            Some("OK") => ExecutionStatus::Success,
            Some("FAILED") | Some("INTERRUPTED") => ExecutionStatus::Failed,
            Some("CANCELED") => ExecutionStatus::Cancelled,
            _ => ExecutionStatus::Queued,
        },
        _ => ExecutionStatus::Queued,
    }
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    #[serde(rename = "currentState")]
    current_state: String,
    #[serde(rename = "lastRunResult")]
    last_run_result: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetListResponse {
    #[serde(default)]
    items: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    path: String,
    #[serde(rename = "downloadUrl")]
    download_url: String,
    #[serde(rename = "fileSize")]
    file_size: Option<u64>,
}

/// Adapter for an artifact repository.
pub struct NexusProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    connected: AtomicBool,
    capabilities: CapabilitySet,
}

impl NexusProvider {
    /// Creates the adapter.
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self, RailyardError> {
        let client = build_http_client(timeout)?;
        Ok(Self {
            config,
            client,
            connected: AtomicBool::new(false),
            capabilities: CapabilitySet::from_caps(&[Capability::Artifacts]),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.config.endpoint.trim_end_matches('/'));
        let mut builder = self.client.request(method, url);
        if let (Some(user), Some(token)) = (
            self.config.credentials.username.as_deref(),
            self.config.credentials.token.as_deref(),
        ) {
            builder = builder.basic_auth(user, Some(token));
        }
        builder
    }

    async fn fetch_task(&self, task_id: &str, operation: &str) -> Result<TaskResponse, RailyardError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/service/rest/v1/tasks/{task_id}"),
            )
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
impl Provider for NexusProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Nexus
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), RailyardError> {
        let response = self
            .request(reqwest::Method::GET, "/service/rest/v1/status")
            .send()
            .await
            .map_err(|e| ConnectivityError::new(&self.config.name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectivityError::new(
                &self.config.name,
                format!("status endpoint answered {}", response.status()),
            )
            .into());
        }

        self.connected.store(true, Ordering::SeqCst);
        info!(provider = %self.config.name, "nexus provider connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn test_connection(&self) -> bool {
        self.request(reqwest::Method::GET, "/service/rest/v1/status")
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<String, RailyardError> {
        // A pipeline maps to a repository task; the definition carries
        // the task type and target repository.
        let body = if spec.definition.is_object() {
            spec.definition.clone()
        } else {
            serde_json::json!({
                "name": spec.name,
                "typeId": "repository.publish",
                "properties": { "repositoryName": spec.repository },
            })
        };

        let response = self
            .request(reqwest::Method::POST, "/service/rest/v1/tasks")
            .json(&body)
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "create_pipeline", e))?;
        let response = expect_success(&self.config.name, "create_pipeline", response).await?;

        #[derive(Debug, Deserialize)]
        struct Created {
            id: String,
        }
        let created: Created = response
            .json()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "create_pipeline", e))?;
        Ok(created.id)
    }

    async fn execute_pipeline(
        &self,
        pipeline_id: &str,
        _parameters: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ExecutionHandle, RailyardError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/service/rest/v1/tasks/{pipeline_id}/run"),
            )
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "execute_pipeline", e))?;
        expect_success(&self.config.name, "execute_pipeline", response).await?;

        Ok(ExecutionHandle {
            vendor_id: pipeline_id.to_string(),
            status: ExecutionStatus::Running,
        })
    }

    async fn get_pipeline_status(&self, pipeline_id: &str) -> Result<PipelineSnapshot, RailyardError> {
        let task = match self.fetch_task(pipeline_id, "get_pipeline_status").await {
            Ok(task) => task,
            Err(RailyardError::VendorApi(e)) if e.status == Some(404) => {
                return Ok(PipelineSnapshot::new(ExecutionStatus::Queued)
                    .with_vendor_status("NOT_FOUND"));
            }
            Err(e) => return Err(e),
        };

        Ok(
            PipelineSnapshot::new(fold_task_status(
                &task.current_state,
                task.last_run_result.as_deref(),
            ))
            .with_vendor_status(task.current_state),
        )
    }

    async fn get_pipeline_logs(
        &self,
        pipeline_id: &str,
        _options: &LogOptions,
    ) -> Result<LogChunk, RailyardError> {
        // Tasks expose no run log; report the last run summary instead.
        let task = self.fetch_task(pipeline_id, "get_pipeline_logs").await?;
        Ok(LogChunk {
            text: format!(
                "task {} state={} result={}",
                task.name.unwrap_or_else(|| pipeline_id.to_string()),
                task.current_state,
                task.last_run_result.unwrap_or_else(|| "none".to_string()),
            ),
            next_marker: None,
        })
    }

    async fn stop_pipeline(&self, pipeline_id: &str) -> Result<(), RailyardError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/service/rest/v1/tasks/{pipeline_id}/stop"),
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
                &format!("/service/rest/v1/tasks/{pipeline_id}"),
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
            kind: ProviderKind::Nexus,
            endpoint: self.config.endpoint.clone(),
            connected: self.is_connected(),
            capabilities: self.capabilities.names(),
            version: None,
        }
    }

    async fn list_artifacts(&self, pipeline_id: &str) -> Result<Vec<ArtifactRef>, RailyardError> {
        let repository = pipeline_id.split('/').next().unwrap_or(pipeline_id);
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/service/rest/v1/assets?repository={repository}"),
            )
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "list_artifacts", e))?;
        let response = expect_success(&self.config.name, "list_artifacts", response).await?;
        let listing: AssetListResponse = response
            .json()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "list_artifacts", e))?;

        Ok(listing
            .items
            .into_iter()
            .map(|a| ArtifactRef {
                name: a.path,
                location: a.download_url,
                size_bytes: a.file_size,
            })
            .collect())
    }
}
