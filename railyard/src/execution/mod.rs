//! Execution request and context types.
//!
//! [`ExecutionContext`] is the orchestrator's unit of work: created when
//! a request is accepted, mutated only by the dispatch and monitor
//! routines, removed from the live map once terminal and persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{ExecutionStatus, PipelineKind};

/// An immutable request to execute a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Target repository.
    pub repository: String,
    /// Target branch.
    pub branch: String,
    /// Target environment (e.g. "staging").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Explicit provider preference, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_preference: Option<String>,
    /// Pipeline-kind hint used by provider selection.
    #[serde(default)]
    pub pipeline_kind: PipelineKind,
    /// Vendor-specific pipeline configuration payload.
    #[serde(default)]
    pub pipeline_config: serde_json::Value,
    /// Invocation parameters passed to the vendor run.
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionRequest {
    /// Creates a request with the minimum required fields.
    #[must_use]
    pub fn new(repository: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: branch.into(),
            environment: None,
            provider_preference: None,
            pipeline_kind: PipelineKind::default(),
            pipeline_config: serde_json::Value::Null,
            parameters: serde_json::Map::new(),
        }
    }

    /// Sets the target environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Sets an explicit provider preference.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider_preference = Some(provider.into());
        self
    }

    /// Sets the pipeline-kind hint.
    #[must_use]
    pub fn with_kind(mut self, kind: PipelineKind) -> Self {
        self.pipeline_kind = kind;
        self
    }

    /// Sets the vendor-specific pipeline configuration.
    #[must_use]
    pub fn with_pipeline_config(mut self, config: serde_json::Value) -> Self {
        self.pipeline_config = config;
        self
    }

    /// Adds a single invocation parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// A stage observed on the vendor side of an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInfo {
    /// Stage name as reported by the vendor.
    pub name: String,
    /// Canonical status of the stage.
    pub status: ExecutionStatus,
    /// Stage duration in milliseconds, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl StageInfo {
    /// Creates a new stage info.
    #[must_use]
    pub fn new(name: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            name: name.into(),
            status,
            duration_ms: None,
        }
    }
}

/// The orchestrator's per-execution state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Process-unique execution id.
    pub execution_id: Uuid,
    /// The originating request.
    pub request: ExecutionRequest,
    /// Current canonical status.
    pub status: ExecutionStatus,
    /// Bound provider name, set once a provider is chosen and never
    /// reassigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Vendor-side pipeline/run id, set once execution starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_pipeline_id: Option<String>,
    /// Ordered stage list as last reported by the vendor.
    #[serde(default)]
    pub stages: Vec<StageInfo>,
    /// Accumulated log continuation markers.
    #[serde(default)]
    pub log_markers: Vec<String>,
    /// When the request was accepted.
    pub created_at: DateTime<Utc>,
    /// When the vendor run started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When a terminal status was reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Terminal error message when the execution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ExecutionContext {
    /// Creates a queued context for an accepted request.
    #[must_use]
    pub fn new(execution_id: Uuid, request: ExecutionRequest) -> Self {
        Self {
            execution_id,
            request,
            status: ExecutionStatus::Queued,
            provider: None,
            vendor_pipeline_id: None,
            stages: Vec::new(),
            log_markers: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failure_reason: None,
        }
    }

    /// Binds a provider and vendor run id, flipping the execution to
    /// running. The provider is bound exactly once.
    pub fn mark_started(&mut self, provider: impl Into<String>, vendor_pipeline_id: impl Into<String>) {
        debug_assert!(self.provider.is_none(), "provider bound twice");
        self.provider = Some(provider.into());
        self.vendor_pipeline_id = Some(vendor_pipeline_id.into());
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Records a non-terminal status change from the monitor.
    ///
    /// Terminal statuses are sticky, and a queue-phase report after the
    /// run has started is ignored: the vendor has simply not
    /// materialized the run yet.
    pub fn record_status(&mut self, status: ExecutionStatus) {
        if self.status.is_terminal() {
            return;
        }
        if status == ExecutionStatus::Queued && self.started_at.is_some() {
            return;
        }
        self.status = status;
    }

    /// Marks the execution terminal with the given status.
    pub fn mark_terminal(&mut self, status: ExecutionStatus, failure_reason: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        if failure_reason.is_some() {
            self.failure_reason = failure_reason;
        }
    }

    /// Total duration in milliseconds, from creation to completion.
    #[must_use]
    pub fn duration_ms(&self) -> Option<u64> {
        self.completed_at.map(|done| {
            (done - self.created_at)
                .num_milliseconds()
                .max(0)
                .unsigned_abs()
        })
    }
}
