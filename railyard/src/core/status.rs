//! Canonical execution status and pipeline kind enums.
//!
//! Every provider adapter folds its vendor's native status vocabulary
//! onto [`ExecutionStatus`]; the orchestrator and monitor loops only ever
//! see canonical values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical execution status shared by every provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Accepted but not yet running (also the fold target for any
    /// unrecognized vendor state).
    Queued,
    /// The vendor is actively executing the pipeline.
    Running,
    /// Terminal: the pipeline completed successfully.
    Success,
    /// Terminal: the pipeline failed.
    Failed,
    /// Terminal: the pipeline was cancelled.
    Cancelled,
    /// Suspended awaiting external input (e.g. a manual approval gate).
    Paused,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Queued
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

impl ExecutionStatus {
    /// Returns true if the status is terminal; the monitor loop stops
    /// polling once a terminal status is observed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the execution still occupies a concurrency slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The kind of pipeline an execution request targets.
///
/// Used by provider selection to pick a kind-appropriate default when
/// the request carries no explicit provider preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// Compile/test/package pipelines (build servers).
    Build,
    /// Deployment pipelines (GitOps controllers).
    Deploy,
    /// Artifact publication pipelines (artifact repositories).
    Artifact,
    /// Standalone test pipelines.
    Test,
}

impl Default for PipelineKind {
    fn default() -> Self {
        Self::Build
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Deploy => write!(f, "deploy"),
            Self::Artifact => write!(f, "artifact"),
            Self::Test => write!(f, "test"),
        }
    }
}
