//! Lifecycle event contract consumed by dashboards and notifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::ExecutionStatus;
use crate::execution::ExecutionRequest;

/// A lifecycle event broadcast by the orchestrator.
///
/// Per-execution events are delivered in submission order
/// (`Queued → Started → StatusChanged* → Completed/Failed/Cancelled`)
/// because each execution is driven by a single monitor loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// An execution request was accepted and enqueued.
    PipelineQueued {
        /// The execution id.
        execution_id: Uuid,
        /// The originating request.
        request: ExecutionRequest,
    },
    /// A provider accepted the execution and returned a vendor run id.
    PipelineStarted {
        /// The execution id.
        execution_id: Uuid,
        /// The bound provider.
        provider_name: String,
        /// The vendor-side run id.
        vendor_pipeline_id: String,
    },
    /// The monitor observed a canonical status change.
    PipelineStatusChanged {
        /// The execution id.
        execution_id: Uuid,
        /// The new canonical status.
        status: ExecutionStatus,
        /// The bound provider.
        provider_name: String,
    },
    /// The execution reached a successful terminal status.
    PipelineCompleted {
        /// The execution id.
        execution_id: Uuid,
        /// The terminal status.
        status: ExecutionStatus,
        /// Total duration in milliseconds.
        duration_ms: u64,
        /// The bound provider.
        provider_name: String,
    },
    /// The execution failed.
    PipelineFailed {
        /// The execution id.
        execution_id: Uuid,
        /// The failure reason.
        error: String,
    },
    /// The execution was cancelled.
    PipelineCancelled {
        /// The execution id.
        execution_id: Uuid,
    },
    /// A provider was added to the registry.
    ProviderRegistered {
        /// The provider name.
        provider_name: String,
        /// Detail (kind, endpoint).
        details: String,
    },
    /// A provider connected successfully.
    ProviderConnected {
        /// The provider name.
        provider_name: String,
        /// Detail.
        details: String,
    },
    /// A provider operation failed.
    ProviderError {
        /// The provider name.
        provider_name: String,
        /// Detail.
        details: String,
    },
    /// A provider was disconnected at shutdown.
    ProviderDisconnected {
        /// The provider name.
        provider_name: String,
        /// Detail.
        details: String,
    },
}

impl PipelineEvent {
    /// Returns the wire name of the event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PipelineQueued { .. } => "pipeline_queued",
            Self::PipelineStarted { .. } => "pipeline_started",
            Self::PipelineStatusChanged { .. } => "pipeline_status_changed",
            Self::PipelineCompleted { .. } => "pipeline_completed",
            Self::PipelineFailed { .. } => "pipeline_failed",
            Self::PipelineCancelled { .. } => "pipeline_cancelled",
            Self::ProviderRegistered { .. } => "provider_registered",
            Self::ProviderConnected { .. } => "provider_connected",
            Self::ProviderError { .. } => "provider_error",
            Self::ProviderDisconnected { .. } => "provider_disconnected",
        }
    }

    /// Returns the execution id for execution-scoped events.
    #[must_use]
    pub fn execution_id(&self) -> Option<Uuid> {
        match self {
            Self::PipelineQueued { execution_id, .. }
            | Self::PipelineStarted { execution_id, .. }
            | Self::PipelineStatusChanged { execution_id, .. }
            | Self::PipelineCompleted { execution_id, .. }
            | Self::PipelineFailed { execution_id, .. }
            | Self::PipelineCancelled { execution_id } => Some(*execution_id),
            _ => None,
        }
    }

    /// Converts the event payload to a JSON value for sinks.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
