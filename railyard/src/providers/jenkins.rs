//! Classic build-server adapter (Jenkins-style API).
//!
//! Jenkins reports run state on two axes: a `building` flag and a
//! `result` field that is only populated once the build finishes.
//! `fold_build_status` collapses that pair onto the canonical
//! vocabulary; anything unrecognized folds to queued so the monitor
//! loop never stalls.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::{
    build_http_client, expect_success, ArtifactRef, Capability, CapabilitySet, ExecutionHandle,
    LogChunk, LogOptions, PipelineSnapshot, PipelineSpec, Provider, ProviderInfo, ProviderKind,
};
use crate::config::ProviderConfig;
use crate::core::ExecutionStatus;
use crate::errors::{ConnectivityError, RailyardError, VendorApiError};
use crate::execution::StageInfo;
use parking_lot::RwLock;

/// Folds Jenkins' two-axis status (building flag + result) onto the
/// canonical vocabulary.
#[must_use]
pub fn fold_build_status(building: bool, result: Option<&str>) -> ExecutionStatus {
    if building {
        return ExecutionStatus::Running;
    }
    match result {
        Some("SUCCESS") => ExecutionStatus::Success,
        Some("FAILURE") | Some("UNSTABLE") => ExecutionStatus::Failed,
        Some("ABORTED") => ExecutionStatus::Cancelled,
        // NOT_BUILT, null, or anything the server adds later: the build
        // has not produced a result yet.
        _ => ExecutionStatus::Queued,
    }
}

#[derive(Debug, Deserialize)]
struct BuildResponse {
    building: bool,
    result: Option<String>,
    #[serde(default)]
    duration: u64,
}

#[derive(Debug, Deserialize)]
struct QueueItemResponse {
    executable: Option<QueueExecutable>,
    #[serde(default)]
    cancelled: bool,
}

#[derive(Debug, Deserialize)]
struct QueueExecutable {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct ArtifactListResponse {
    #[serde(default)]
    artifacts: Vec<JenkinsArtifact>,
}

#[derive(Debug, Deserialize)]
struct JenkinsArtifact {
    #[serde(rename = "fileName")]
    file_name: String,
    #[serde(rename = "relativePath")]
    relative_path: String,
}

/// Adapter for a Jenkins-style build server.
pub struct JenkinsProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    connected: AtomicBool,
    capabilities: CapabilitySet,
    version: RwLock<Option<String>>,
}

impl JenkinsProvider {
    /// Creates the adapter. Connectivity is not checked here; call
    /// [`Provider::connect`] at registration time.
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self, RailyardError> {
        let client = build_http_client(timeout)?;
        Ok(Self {
            config,
            client,
            connected: AtomicBool::new(false),
            capabilities: CapabilitySet::from_caps(&[Capability::Artifacts, Capability::Stats]),
            version: RwLock::new(None),
        })
    }

    fn auth_header(&self) -> Option<String> {
        let user = self.config.credentials.username.as_deref()?;
        let token = self.config.credentials.token.as_deref()?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{token}"));
        Some(format!("Basic {encoded}"))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.config.endpoint.trim_end_matches('/'));
        let mut builder = self.client.request(method, url);
        if let Some(auth) = self.auth_header() {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth);
        }
        builder
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
    ) -> Result<T, RailyardError> {
        let response = self
            .request(reqwest::Method::GET, path)
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, operation, e))?;
        let response = expect_success(&self.config.name, operation, response).await?;
        response
            .json()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, operation, e).into())
    }

    /// Resolves a queue-phase vendor id ("job@queue/123") to a build
    /// status, or polls the build directly ("job/42").
    async fn build_snapshot(&self, pipeline_id: &str) -> Result<PipelineSnapshot, RailyardError> {
        if let Some((job, queue_id)) = pipeline_id.split_once("@queue/") {
            let item: QueueItemResponse = match self
                .get_json("get_pipeline_status", &format!("/queue/item/{queue_id}/api/json"))
                .await
            {
                Ok(item) => item,
                // The queue item may be gone before the run materializes.
                Err(RailyardError::VendorApi(e)) if e.status == Some(404) => {
                    return Ok(PipelineSnapshot::new(ExecutionStatus::Queued)
                        .with_vendor_status("QUEUE_EXPIRED"));
                }
                Err(e) => return Err(e),
            };

            if item.cancelled {
                return Ok(PipelineSnapshot::new(ExecutionStatus::Cancelled)
                    .with_vendor_status("QUEUE_CANCELLED"));
            }
            match item.executable {
                Some(exec) => self.fetch_build(job, exec.number).await,
                None => Ok(PipelineSnapshot::new(ExecutionStatus::Queued)
                    .with_vendor_status("QUEUED")),
            }
        } else if let Some((job, number)) = pipeline_id.rsplit_once('/') {
            let number: u64 = number.parse().map_err(|_| {
                RailyardError::Internal(format!("malformed jenkins vendor id: {pipeline_id}"))
            })?;
            self.fetch_build(job, number).await
        } else {
            Err(RailyardError::Internal(format!(
                "malformed jenkins vendor id: {pipeline_id}"
            )))
        }
    }

    async fn fetch_build(&self, job: &str, number: u64) -> Result<PipelineSnapshot, RailyardError> {
        let build: BuildResponse = match self
            .get_json("get_pipeline_status", &format!("/job/{job}/{number}/api/json"))
            .await
        {
            Ok(build) => build,
            // The build page lags the queue item briefly after dispatch.
            Err(RailyardError::VendorApi(e)) if e.status == Some(404) => {
                return Ok(PipelineSnapshot::new(ExecutionStatus::Queued)
                    .with_vendor_status("NOT_MATERIALIZED"));
            }
            Err(e) => return Err(e),
        };

        let status = fold_build_status(build.building, build.result.as_deref());
        let mut stage = StageInfo::new(format!("{job} #{number}"), status);
        if build.duration > 0 {
            stage.duration_ms = Some(build.duration);
        }
        Ok(PipelineSnapshot::new(status)
            .with_vendor_status(build.result.unwrap_or_else(|| "BUILDING".to_string()))
            .with_stages(vec![stage]))
    }
}

#[async_trait]
impl Provider for JenkinsProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Jenkins
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), RailyardError> {
        let response = self
            .request(reqwest::Method::GET, "/api/json")
            .send()
            .await
            .map_err(|e| ConnectivityError::new(&self.config.name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectivityError::new(
                &self.config.name,
                format!("server answered {}", response.status()),
            )
            .into());
        }

        if let Some(version) = response
            .headers()
            .get("X-Jenkins")
            .and_then(|v| v.to_str().ok())
        {
            *self.version.write() = Some(version.to_string());
        }

        self.connected.store(true, Ordering::SeqCst);
        info!(provider = %self.config.name, "jenkins provider connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn test_connection(&self) -> bool {
        self.request(reqwest::Method::GET, "/api/json")
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<String, RailyardError> {
        let body = spec
            .definition
            .as_str()
            .map(ToString::to_string)
            .unwrap_or_else(|| {
                format!(
                    "<flow-definition><description>{} ({})</description></flow-definition>",
                    spec.repository, spec.branch
                )
            });

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/createItem?name={}", spec.name),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/xml")
            .body(body)
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
        let mut builder = self.request(
            reqwest::Method::POST,
            &format!("/job/{pipeline_id}/buildWithParameters"),
        );
        for (key, value) in parameters {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            builder = builder.query(&[(key.as_str(), rendered)]);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "execute_pipeline", e))?;
        let response = expect_success(&self.config.name, "execute_pipeline", response).await?;

        // Jenkins answers 201 with a Location header pointing at the
        // queue item for the pending build.
        let queue_id = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| {
                loc.trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .map(ToString::to_string)
            })
            .ok_or_else(|| {
                VendorApiError::status(
                    &self.config.name,
                    "execute_pipeline",
                    201,
                    "missing queue location header",
                )
            })?;

        debug!(provider = %self.config.name, job = %pipeline_id, queue_id = %queue_id, "build queued");
        Ok(ExecutionHandle {
            vendor_id: format!("{pipeline_id}@queue/{queue_id}"),
            status: ExecutionStatus::Queued,
        })
    }

    async fn get_pipeline_status(&self, pipeline_id: &str) -> Result<PipelineSnapshot, RailyardError> {
        self.build_snapshot(pipeline_id).await
    }

    async fn get_pipeline_logs(
        &self,
        pipeline_id: &str,
        options: &LogOptions,
    ) -> Result<LogChunk, RailyardError> {
        let (job, number) = pipeline_id
            .rsplit_once('/')
            .ok_or_else(|| RailyardError::Internal(format!("malformed jenkins vendor id: {pipeline_id}")))?;
        let start = options.marker.as_deref().unwrap_or("0");

        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/job/{job}/{number}/logText/progressiveText?start={start}"),
            )
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "get_pipeline_logs", e))?;
        let response = expect_success(&self.config.name, "get_pipeline_logs", response).await?;

        let more_data = response
            .headers()
            .get("X-More-Data")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let next_marker = if more_data {
            response
                .headers()
                .get("X-Text-Size")
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        } else {
            None
        };

        let text = response
            .text()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "get_pipeline_logs", e))?;
        Ok(LogChunk { text, next_marker })
    }

    async fn stop_pipeline(&self, pipeline_id: &str) -> Result<(), RailyardError> {
        let path = if let Some((_, queue_id)) = pipeline_id.split_once("@queue/") {
            format!("/queue/cancelItem?id={queue_id}")
        } else if let Some((job, number)) = pipeline_id.rsplit_once('/') {
            format!("/job/{job}/{number}/stop")
        } else {
            return Err(RailyardError::Internal(format!(
                "malformed jenkins vendor id: {pipeline_id}"
            )));
        };

        let response = self
            .request(reqwest::Method::POST, &path)
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "stop_pipeline", e))?;
        expect_success(&self.config.name, "stop_pipeline", response).await?;
        Ok(())
    }

    async fn delete_pipeline(&self, pipeline_id: &str) -> Result<(), RailyardError> {
        let job = pipeline_id
            .split(['@', '/'])
            .next()
            .unwrap_or(pipeline_id);
        let response = self
            .request(reqwest::Method::POST, &format!("/job/{job}/doDelete"))
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "delete_pipeline", e))?;
        expect_success(&self.config.name, "delete_pipeline", response).await?;
        Ok(())
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.config.name.clone(),
            kind: ProviderKind::Jenkins,
            endpoint: self.config.endpoint.clone(),
            connected: self.is_connected(),
            capabilities: self.capabilities.names(),
            version: self.version.read().clone(),
        }
    }

    async fn list_artifacts(&self, pipeline_id: &str) -> Result<Vec<ArtifactRef>, RailyardError> {
        let (job, number) = pipeline_id
            .rsplit_once('/')
            .ok_or_else(|| RailyardError::Internal(format!("malformed jenkins vendor id: {pipeline_id}")))?;
        let listing: ArtifactListResponse = self
            .get_json(
                "list_artifacts",
                &format!("/job/{job}/{number}/api/json?tree=artifacts[fileName,relativePath]"),
            )
            .await?;

        Ok(listing
            .artifacts
            .into_iter()
            .map(|a| ArtifactRef {
                location: format!(
                    "{}/job/{job}/{number}/artifact/{}",
                    self.config.endpoint.trim_end_matches('/'),
                    a.relative_path
                ),
                name: a.file_name,
                size_bytes: None,
            })
            .collect())
    }

    async fn get_stats(&self) -> Result<serde_json::Value, RailyardError> {
        #[derive(Debug, Deserialize)]
        struct JobListing {
            #[serde(default)]
            jobs: Vec<JobRef>,
        }
        #[derive(Debug, Deserialize)]
        struct JobRef {
            color: Option<String>,
        }

        let listing: JobListing = self
            .get_json("get_stats", "/api/json?tree=jobs[name,color]")
            .await?;
        // A building job's ball icon carries the _anime suffix.
        let building = listing
            .jobs
            .iter()
            .filter(|j| {
                j.color
                    .as_deref()
                    .map(|c| c.ends_with("_anime"))
                    .unwrap_or(false)
            })
            .count();
        Ok(serde_json::json!({
            "jobs": listing.jobs.len(),
            "building": building,
        }))
    }
}
