//! # Railyard
//!
//! A CI/CD pipeline orchestration core that drives heterogeneous
//! engines behind one provider contract.
//!
//! Railyard provides:
//!
//! - **A polymorphic provider contract**: one async trait over Jenkins,
//!   GitHub Actions, Argo CD and Nexus style engines
//! - **Canonical statuses**: every vendor vocabulary folds onto one
//!   six-state enum, unknown labels included
//! - **Bounded-concurrency dispatch**: a FIFO queue drained on a fixed
//!   interval, capped by a concurrency limit
//! - **Per-provider circuit breakers**: a failing vendor fails fast
//!   without starving healthy ones
//! - **Typed lifecycle events**: queued/started/status-changed/completed
//!   broadcast to any number of subscribers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use railyard::prelude::*;
//!
//! let orchestrator = PipelineOrchestrator::new(OrchestratorConfig::default());
//! orchestrator.load_providers().await;
//! orchestrator.start();
//!
//! let id = orchestrator
//!     .execute_pipeline(ExecutionRequest::new("git@host:team/app.git", "main"))
//!     .await?;
//! let record = orchestrator.get_pipeline_status(id).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod breaker;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod execution;
pub mod orchestrator;
pub mod providers;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::breaker::{CircuitBreaker, CircuitState};
    pub use crate::config::{
        OrchestratorConfig, ProviderConfig, ProviderCredentials,
    };
    pub use crate::core::{ExecutionStatus, PipelineEvent, PipelineKind};
    pub use crate::errors::{
        CapabilityNotSupportedError, CircuitOpenError, ConnectivityError,
        MissingConfigError, NoProviderAvailableError, RailyardError,
        VendorApiError,
    };
    pub use crate::events::{EventBus, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::execution::{ExecutionContext, ExecutionRequest, StageInfo};
    pub use crate::orchestrator::PipelineOrchestrator;
    pub use crate::providers::{
        Capability, CapabilitySet, ExecutionHandle, PipelineSnapshot,
        PipelineSpec, Provider, ProviderInfo, ProviderKind, ProviderRegistry,
    };
    pub use crate::store::{
        ExecutionRecord, ExecutionStore, InMemoryExecutionStore, ProviderRecord,
    };
    pub use crate::utils::{generate_uuid, init_tracing, iso_timestamp};
}
