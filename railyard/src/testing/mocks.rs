//! Mock providers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::ExecutionStatus;
use crate::errors::{ConnectivityError, RailyardError, VendorApiError};
use crate::providers::{
    Capability, CapabilitySet, ExecutionHandle, LogChunk, LogOptions, PipelineSnapshot,
    PipelineSpec, Provider, ProviderInfo, ProviderKind,
};

/// A mock provider that records calls and walks a scripted status
/// sequence.
///
/// Each status poll pops the front of the script; once drained, the
/// final status repeats. The default script is empty with a `Success`
/// final status, so an execution completes on the first poll.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    kind: ProviderKind,
    capabilities: CapabilitySet,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_execute: AtomicBool,
    execute_delay: Mutex<Option<Duration>>,
    statuses: Mutex<VecDeque<ExecutionStatus>>,
    final_status: Mutex<ExecutionStatus>,
    execute_calls: AtomicUsize,
    status_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    executed_pipelines: Mutex<Vec<String>>,
    next_vendor_id: AtomicUsize,
}

impl MockProvider {
    /// Creates a connected mock provider.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            capabilities: CapabilitySet::new(),
            connected: AtomicBool::new(true),
            fail_connect: AtomicBool::new(false),
            fail_execute: AtomicBool::new(false),
            execute_delay: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            final_status: Mutex::new(ExecutionStatus::Success),
            execute_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            executed_pipelines: Mutex::new(Vec::new()),
            next_vendor_id: AtomicUsize::new(1),
        }
    }

    /// Sets the scripted status sequence.
    #[must_use]
    pub fn with_statuses(self, statuses: &[ExecutionStatus]) -> Self {
        *self.statuses.lock() = statuses.iter().copied().collect();
        self
    }

    /// Sets the status returned once the script is drained.
    #[must_use]
    pub fn with_final_status(self, status: ExecutionStatus) -> Self {
        *self.final_status.lock() = status;
        self
    }

    /// Overrides the capability set.
    #[must_use]
    pub fn with_capabilities(mut self, caps: &[Capability]) -> Self {
        self.capabilities = CapabilitySet::from_caps(caps);
        self
    }

    /// Starts the provider disconnected.
    #[must_use]
    pub fn disconnected(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    /// Makes every `execute_pipeline` call sleep before answering.
    #[must_use]
    pub fn with_execute_delay(self, delay: Duration) -> Self {
        *self.execute_delay.lock() = Some(delay);
        self
    }

    /// Makes `connect` fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes `execute_pipeline` fail with a vendor 500.
    pub fn set_fail_execute(&self, fail: bool) {
        self.fail_execute.store(fail, Ordering::SeqCst);
    }

    /// Replaces the remaining status script.
    pub fn set_statuses(&self, statuses: &[ExecutionStatus]) {
        *self.statuses.lock() = statuses.iter().copied().collect();
    }

    /// Number of `execute_pipeline` calls.
    #[must_use]
    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_pipeline_status` calls.
    #[must_use]
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Number of `stop_pipeline` calls.
    #[must_use]
    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Pipeline ids passed to `execute_pipeline`, in call order.
    #[must_use]
    pub fn executed_pipelines(&self) -> Vec<String> {
        self.executed_pipelines.lock().clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), RailyardError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectivityError::new(&self.name, "injected connect failure").into());
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn test_connection(&self) -> bool {
        self.is_connected()
    }

    async fn create_pipeline(&self, spec: &PipelineSpec) -> Result<String, RailyardError> {
        Ok(spec.name.clone())
    }

    async fn execute_pipeline(
        &self,
        pipeline_id: &str,
        _parameters: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ExecutionHandle, RailyardError> {
        // Copy the delay out so no guard is held across the await.
        let delay = *self.execute_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_execute.load(Ordering::SeqCst) {
            return Err(
                VendorApiError::status(&self.name, "execute_pipeline", 500, "injected failure")
                    .into(),
            );
        }
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        self.executed_pipelines.lock().push(pipeline_id.to_string());
        let n = self.next_vendor_id.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutionHandle {
            vendor_id: format!("mock-{n}"),
            status: ExecutionStatus::Running,
        })
    }

    async fn get_pipeline_status(&self, _pipeline_id: &str) -> Result<PipelineSnapshot, RailyardError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let status = self
            .statuses
            .lock()
            .pop_front()
            .unwrap_or(*self.final_status.lock());
        Ok(PipelineSnapshot::new(status).with_vendor_status(status.to_string()))
    }

    async fn get_pipeline_logs(
        &self,
        pipeline_id: &str,
        _options: &LogOptions,
    ) -> Result<LogChunk, RailyardError> {
        Ok(LogChunk {
            text: format!("mock log for {pipeline_id}"),
            next_marker: None,
        })
    }

    async fn stop_pipeline(&self, _pipeline_id: &str) -> Result<(), RailyardError> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock();
        statuses.clear();
        *self.final_status.lock() = ExecutionStatus::Cancelled;
        drop(statuses);
        Ok(())
    }

    async fn delete_pipeline(&self, _pipeline_id: &str) -> Result<(), RailyardError> {
        Ok(())
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            kind: self.kind,
            endpoint: "mock://".to_string(),
            connected: self.is_connected(),
            capabilities: self.capabilities.names(),
            version: Some("mock".to_string()),
        }
    }
}
