//! Shared fixtures for orchestrator tests.

use std::sync::Arc;
use std::time::Duration;

use crate::config::OrchestratorConfig;
use crate::events::{CollectingEventSink, EventBus};
use crate::execution::ExecutionRequest;

/// A build request against a sample repository.
#[must_use]
pub fn sample_request() -> ExecutionRequest {
    ExecutionRequest::new("git@example.com:team/app.git", "main")
}

/// A request pinned to a named provider.
#[must_use]
pub fn request_for(provider: &str) -> ExecutionRequest {
    sample_request().with_provider(provider)
}

/// Orchestrator tuning with millisecond-scale loops so tests finish
/// quickly.
#[must_use]
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig::new()
        .with_dispatch_interval(Duration::from_millis(5))
        .with_monitor_interval(Duration::from_millis(5))
        .with_request_timeout(Duration::from_millis(200))
}

/// An event bus wired to a collecting sink, returning both.
#[must_use]
pub fn collecting_bus() -> (EventBus, Arc<CollectingEventSink>) {
    let sink = Arc::new(CollectingEventSink::new());
    let bus = EventBus::with_sink(64, sink.clone());
    (bus, sink)
}
