//! Hosted workflow-runner adapter (GitHub Actions-style API).
//!
//! Runs report a `status` field while in flight and a `conclusion`
//! field once finished; `fold_run_status` collapses the pair onto the
//! canonical vocabulary.

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

/// Folds a workflow run's `status` + `conclusion` pair onto the
/// canonical vocabulary. Unknown values fold to queued.
#[must_use]
pub fn fold_run_status(status: &str, conclusion: Option<&str>) -> ExecutionStatus {
    match status {
        "queued" | "requested" | "pending" => ExecutionStatus::Queued,
        "in_progress" => ExecutionStatus::Running,
        "waiting" => ExecutionStatus::Paused,
        "completed" => match conclusion {
            Some("success") | Some("neutral") | Some("skipped") => ExecutionStatus::Success,
            Some("failure") | Some("timed_out") | Some("startup_failure") => ExecutionStatus::Failed,
            Some("cancelled") => ExecutionStatus::Cancelled,
            Some("action_required") => ExecutionStatus::Paused,
            _ => ExecutionStatus::Queued,
        },
        _ => ExecutionStatus::Queued,
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    status: String,
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunList {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    jobs: Vec<WorkflowJob>,
}

#[derive(Debug, Deserialize)]
struct WorkflowJob {
    name: String,
    status: String,
    conclusion: Option<String>,
}

/// Adapter for a hosted workflow runner.
pub struct GitHubActionsProvider {
    config: ProviderConfig,
    client: reqwest::Client,
    connected: AtomicBool,
    capabilities: CapabilitySet,
    owner: String,
    repo: String,
}

impl GitHubActionsProvider {
    /// Creates the adapter. Requires `owner` and `repo` in the config
    /// extras; the registry validates that before construction.
    pub fn new(config: ProviderConfig, timeout: Duration) -> Result<Self, RailyardError> {
        let client = build_http_client(timeout)?;
        let owner = config.extra_str("owner").unwrap_or_default().to_string();
        let repo = config.extra_str("repo").unwrap_or_default().to_string();
        Ok(Self {
            config,
            client,
            connected: AtomicBool::new(false),
            capabilities: CapabilitySet::from_caps(&[
                Capability::Artifacts,
                Capability::Webhooks,
                Capability::BranchPipelines,
                Capability::Templates,
            ]),
            owner,
            repo,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.config.endpoint.trim_end_matches('/'));
        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, "railyard");
        if let Some(token) = self.config.credentials.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    fn repo_path(&self, suffix: &str) -> String {
        format!("/repos/{}/{}{suffix}", self.owner, self.repo)
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
}

#[async_trait]
impl Provider for GitHubActionsProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::GithubActions
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), RailyardError> {
        let response = self
            .request(reqwest::Method::GET, &self.repo_path(""))
            .send()
            .await
            .map_err(|e| ConnectivityError::new(&self.config.name, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectivityError::new(
                &self.config.name,
                format!("repository lookup answered {}", response.status()),
            )
            .into());
        }

        self.connected.store(true, Ordering::SeqCst);
        info!(provider = %self.config.name, owner = %self.owner, repo = %self.repo, "github provider connected");
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn test_connection(&self) -> bool {
        self.request(reqwest::Method::GET, &self.repo_path(""))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<String, RailyardError> {
        // A pipeline definition is a workflow file committed through the
        // contents API; the payload must be base64-encoded.
        let content = spec
            .definition
            .as_str()
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("name: {}\non: workflow_dispatch\n", spec.name));
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);

        let path = self.repo_path(&format!("/contents/.github/workflows/{}.yml", spec.name));
        let body = serde_json::json!({
            "message": format!("add workflow {}", spec.name),
            "content": encoded,
            "branch": spec.branch,
        });

        let response = self
            .request(reqwest::Method::PUT, &path)
            .json(&body)
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "create_pipeline", e))?;
        expect_success(&self.config.name, "create_pipeline", response).await?;
        Ok(format!("{}.yml", spec.name))
    }

    async fn execute_pipeline(
        &self,
        pipeline_id: &str,
        parameters: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ExecutionHandle, RailyardError> {
        let branch = parameters
            .get("ref")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("main");
        let inputs: serde_json::Map<String, serde_json::Value> = parameters
            .iter()
            .filter(|(k, _)| k.as_str() != "ref")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let path = self.repo_path(&format!("/actions/workflows/{pipeline_id}/dispatches"));
        let body = serde_json::json!({ "ref": branch, "inputs": inputs });
        let response = self
            .request(reqwest::Method::POST, &path)
            .json(&body)
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "execute_pipeline", e))?;
        expect_success(&self.config.name, "execute_pipeline", response).await?;

        // The dispatch endpoint answers 204 with no run id; pick up the
        // newest run for the workflow.
        let list: WorkflowRunList = self
            .get_json(
                "execute_pipeline",
                &self.repo_path(&format!(
                    "/actions/workflows/{pipeline_id}/runs?per_page=1"
                )),
            )
            .await?;

        match list.workflow_runs.into_iter().next() {
            Some(run) => {
                debug!(provider = %self.config.name, run_id = run.id, "workflow run located");
                Ok(ExecutionHandle {
                    vendor_id: run.id.to_string(),
                    status: fold_run_status(&run.status, run.conclusion.as_deref()),
                })
            }
            // Dispatch accepted but the run has not materialized yet.
            None => Ok(ExecutionHandle {
                vendor_id: format!("pending:{pipeline_id}"),
                status: ExecutionStatus::Queued,
            }),
        }
    }

    async fn get_pipeline_status(&self, pipeline_id: &str) -> Result<PipelineSnapshot, RailyardError> {
        // A dispatch whose run had not materialized is re-resolved here.
        if let Some(workflow) = pipeline_id.strip_prefix("pending:") {
            let list: WorkflowRunList = self
                .get_json(
                    "get_pipeline_status",
                    &self.repo_path(&format!("/actions/workflows/{workflow}/runs?per_page=1")),
                )
                .await?;
            return Ok(match list.workflow_runs.into_iter().next() {
                Some(run) => PipelineSnapshot::new(fold_run_status(&run.status, run.conclusion.as_deref()))
                    .with_vendor_status(run.status),
                None => PipelineSnapshot::new(ExecutionStatus::Queued).with_vendor_status("pending"),
            });
        }

        let run: WorkflowRun = match self
            .get_json(
                "get_pipeline_status",
                &self.repo_path(&format!("/actions/runs/{pipeline_id}")),
            )
            .await
        {
            Ok(run) => run,
            Err(RailyardError::VendorApi(e)) if e.status == Some(404) => {
                return Ok(PipelineSnapshot::new(ExecutionStatus::Queued)
                    .with_vendor_status("not_materialized"));
            }
            Err(e) => return Err(e),
        };

        let status = fold_run_status(&run.status, run.conclusion.as_deref());
        let mut snapshot = PipelineSnapshot::new(status).with_vendor_status(run.status.clone());

        // Job breakdown is best-effort; a failure here must not fail the poll.
        if let Ok(jobs) = self
            .get_json::<JobList>(
                "get_pipeline_status",
                &self.repo_path(&format!("/actions/runs/{pipeline_id}/jobs")),
            )
            .await
        {
            snapshot = snapshot.with_stages(
                jobs.jobs
                    .into_iter()
                    .map(|j| StageInfo::new(j.name, fold_run_status(&j.status, j.conclusion.as_deref())))
                    .collect(),
            );
        }

        Ok(snapshot)
    }

    async fn get_pipeline_logs(
        &self,
        pipeline_id: &str,
        _options: &LogOptions,
    ) -> Result<LogChunk, RailyardError> {
        // The logs endpoint redirects to a short-lived archive URL; the
        // URL itself is the chunk, there is no incremental marker.
        let response = self
            .request(
                reqwest::Method::GET,
                &self.repo_path(&format!("/actions/runs/{pipeline_id}/logs")),
            )
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "get_pipeline_logs", e))?;
        let response = expect_success(&self.config.name, "get_pipeline_logs", response).await?;

        Ok(LogChunk {
            text: response.url().to_string(),
            next_marker: None,
        })
    }

    async fn stop_pipeline(&self, pipeline_id: &str) -> Result<(), RailyardError> {
        let response = self
            .request(
                reqwest::Method::POST,
                &self.repo_path(&format!("/actions/runs/{pipeline_id}/cancel")),
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
                &self.repo_path(&format!("/actions/runs/{pipeline_id}")),
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
            kind: ProviderKind::GithubActions,
            endpoint: self.config.endpoint.clone(),
            connected: self.is_connected(),
            capabilities: self.capabilities.names(),
            version: None,
        }
    }

    async fn list_artifacts(&self, pipeline_id: &str) -> Result<Vec<ArtifactRef>, RailyardError> {
        #[derive(Debug, Deserialize)]
        struct ArtifactList {
            #[serde(default)]
            artifacts: Vec<RunArtifact>,
        }
        #[derive(Debug, Deserialize)]
        struct RunArtifact {
            name: String,
            size_in_bytes: u64,
            archive_download_url: String,
        }

        let listing: ArtifactList = self
            .get_json(
                "list_artifacts",
                &self.repo_path(&format!("/actions/runs/{pipeline_id}/artifacts")),
            )
            .await?;
        Ok(listing
            .artifacts
            .into_iter()
            .map(|a| ArtifactRef {
                name: a.name,
                location: a.archive_download_url,
                size_bytes: Some(a.size_in_bytes),
            })
            .collect())
    }

    async fn register_webhook(&self, url: &str) -> Result<(), RailyardError> {
        let body = serde_json::json!({
            "config": { "url": url, "content_type": "json" },
            "events": ["workflow_run"],
        });
        let response = self
            .request(reqwest::Method::POST, &self.repo_path("/hooks"))
            .json(&body)
            .send()
            .await
            .map_err(|e| VendorApiError::transport(&self.config.name, "register_webhook", e))?;
        expect_success(&self.config.name, "register_webhook", response).await?;
        Ok(())
    }

    async fn create_branch_pipeline(
        &self,
        spec: &PipelineSpec,
        branch: &str,
    ) -> Result<String, RailyardError> {
        let mut branch_spec = spec.clone();
        branch_spec.branch = branch.to_string();
        branch_spec.name = format!("{}-{branch}", spec.name);
        self.create_pipeline(&branch_spec).await
    }

    async fn list_templates(&self) -> Result<Vec<String>, RailyardError> {
        #[derive(Debug, Deserialize)]
        struct Workflows {
            #[serde(default)]
            workflows: Vec<Workflow>,
        }
        #[derive(Debug, Deserialize)]
        struct Workflow {
            path: String,
        }

        let listing: Workflows = self
            .get_json("list_templates", &self.repo_path("/actions/workflows"))
            .await?;
        Ok(listing.workflows.into_iter().map(|w| w.path).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderCredentials;

    fn provider() -> GitHubActionsProvider {
        let config = ProviderConfig::new(
            "github-test",
            ProviderKind::GithubActions,
            "http://127.0.0.1:1",
        )
        .with_credentials(ProviderCredentials::token("ghp_test"))
        .with_extra(serde_json::json!({ "owner": "acme", "repo": "widgets" }));
        GitHubActionsProvider::new(config, Duration::from_millis(100)).unwrap()
    }

    #[test]
    fn test_fold_in_flight_states() {
        assert_eq!(fold_run_status("queued", None), ExecutionStatus::Queued);
        assert_eq!(fold_run_status("requested", None), ExecutionStatus::Queued);
        assert_eq!(fold_run_status("in_progress", None), ExecutionStatus::Running);
        assert_eq!(fold_run_status("waiting", None), ExecutionStatus::Paused);
    }

    #[test]
    fn test_fold_completed_conclusions() {
        assert_eq!(fold_run_status("completed", Some("success")), ExecutionStatus::Success);
        assert_eq!(fold_run_status("completed", Some("neutral")), ExecutionStatus::Success);
        assert_eq!(fold_run_status("completed", Some("skipped")), ExecutionStatus::Success);
        assert_eq!(fold_run_status("completed", Some("failure")), ExecutionStatus::Failed);
        assert_eq!(fold_run_status("completed", Some("timed_out")), ExecutionStatus::Failed);
        assert_eq!(fold_run_status("completed", Some("cancelled")), ExecutionStatus::Cancelled);
        assert_eq!(
            fold_run_status("completed", Some("action_required")),
            ExecutionStatus::Paused
        );
    }

    #[test]
    fn test_fold_unknown_is_queued() {
        assert_eq!(fold_run_status("some_new_state", None), ExecutionStatus::Queued);
        assert_eq!(fold_run_status("completed", None), ExecutionStatus::Queued);
        assert_eq!(
            fold_run_status("completed", Some("some_new_conclusion")),
            ExecutionStatus::Queued
        );
    }

    #[test]
    fn test_fold_is_total() {
        for status in ["queued", "in_progress", "waiting", "completed", "pending", "requested"] {
            for conclusion in [
                None,
                Some("success"),
                Some("failure"),
                Some("cancelled"),
                Some("skipped"),
                Some("timed_out"),
                Some("action_required"),
                Some("neutral"),
            ] {
                let folded = fold_run_status(status, conclusion);
                assert!(!folded.to_string().is_empty());
            }
        }
    }

    #[test]
    fn test_repo_path() {
        let p = provider();
        assert_eq!(p.repo_path("/actions/runs/7"), "/repos/acme/widgets/actions/runs/7");
    }

    #[test]
    fn test_provider_info_has_no_token() {
        let p = provider();
        let json = serde_json::to_string(&p.provider_info()).unwrap();
        assert!(!json.contains("ghp_test"));
    }

    #[tokio::test]
    async fn test_connect_failure_marks_disconnected() {
        let p = provider();
        assert!(p.connect().await.is_err());
        assert!(!p.is_connected());
        assert!(!p.test_connection().await);
    }

    #[tokio::test]
    async fn test_env_injection_unsupported() {
        let p = provider();
        let err = p
            .set_environment("wf.yml", &serde_json::Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RailyardError::CapabilityNotSupported(_)));
    }
}
