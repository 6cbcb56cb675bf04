//! Core vocabulary shared by providers and the orchestrator.

mod event;
mod status;

pub use event::PipelineEvent;
pub use status::{ExecutionStatus, PipelineKind};
