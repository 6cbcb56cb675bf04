//! The pipeline orchestration engine.
//!
//! One dispatcher task drains a FIFO queue on a fixed interval, bounded
//! by the concurrency cap; each started execution gets its own monitor
//! task that polls the bound provider until a terminal status. All
//! provider-bound calls go through a per-provider circuit breaker, so a
//! failing vendor cannot block dispatch to healthy ones.
//!
//! Live executions are held in a concurrent map keyed by execution id
//! and removed exactly once on completion; completed executions remain
//! readable through the store.

#[cfg(test)]
mod integration_tests;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::breaker::CircuitBreaker;
use crate::config::{default_provider_configs, OrchestratorConfig};
use crate::core::{ExecutionStatus, PipelineEvent, PipelineKind};
use crate::errors::{NoProviderAvailableError, RailyardError};
use crate::events::{EventBus, LoggingEventSink, DEFAULT_BUS_CAPACITY};
use crate::execution::{ExecutionContext, ExecutionRequest};
use crate::providers::{
    ExecutionHandle, LogChunk, LogOptions, PipelineSpec, Provider, ProviderInfo, ProviderKind,
    ProviderRegistry,
};
use crate::store::{ExecutionRecord, ExecutionStore, InMemoryExecutionStore};

/// Derives a vendor pipeline name from the repository path.
#[must_use]
fn derive_pipeline_name(request: &ExecutionRequest) -> String {
    let repo = request.repository.trim_end_matches(".git");
    repo.rsplit(|c| c == '/' || c == ':')
        .next()
        .unwrap_or(repo)
        .to_string()
}

/// Maps a pipeline-kind hint to its default engine kind.
#[must_use]
fn default_kind_for(kind: PipelineKind) -> ProviderKind {
    match kind {
        PipelineKind::Build => ProviderKind::Jenkins,
        PipelineKind::Deploy => ProviderKind::ArgoCd,
        PipelineKind::Artifact => ProviderKind::Nexus,
        PipelineKind::Test => ProviderKind::GithubActions,
    }
}

enum DispatchOutcome {
    /// A monitor now owns the execution; the slot stays reserved.
    Started,
    /// The execution failed or vanished; the slot is free again.
    Released,
}

struct Inner {
    config: OrchestratorConfig,
    registry: Arc<ProviderRegistry>,
    bus: EventBus,
    store: Arc<dyn ExecutionStore>,
    executions: DashMap<Uuid, ExecutionContext>,
    queue: Mutex<VecDeque<Uuid>>,
    running: AtomicUsize,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Inner {
    fn breaker_for(&self, provider_name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(provider_name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    provider_name,
                    self.config.breaker_threshold,
                    self.config.breaker_window,
                    self.config.breaker_reset_timeout,
                ))
            })
            .clone()
    }

    /// Selection precedence: explicit preference, then the kind default,
    /// then the first connected provider in registration order.
    ///
    /// A preference that is unregistered or disconnected falls through
    /// to the remaining rules rather than failing outright.
    fn select_provider(&self, request: &ExecutionRequest) -> Result<Arc<dyn Provider>, RailyardError> {
        if let Some(name) = &request.provider_preference {
            match self.registry.get(name) {
                Some(p) if p.is_connected() => return Ok(p),
                Some(_) => {
                    debug!(provider = %name, "preferred provider not connected, falling through");
                }
                None => {
                    debug!(provider = %name, "preferred provider not registered, falling through");
                }
            }
        }

        let kind = default_kind_for(request.pipeline_kind);
        if let Some(provider) = self.registry.first_connected_of_kind(kind) {
            return Ok(provider);
        }
        self.registry.first_connected().ok_or_else(|| {
            NoProviderAvailableError::new("no connected providers registered").into()
        })
    }

    async fn persist(&self, ctx: &ExecutionContext) {
        if let Err(err) = self
            .store
            .save_execution(ExecutionRecord::from_context(ctx))
            .await
        {
            warn!(execution_id = %ctx.execution_id, error = %err, "failed to persist execution");
        }
    }

    /// One pass over the queue, dispatching until the cap is hit or
    /// the queue drains.
    async fn dispatch_tick(self: &Arc<Self>) {
        loop {
            if self.running.load(Ordering::SeqCst) >= self.config.max_concurrent {
                return;
            }
            let Some(id) = self.queue.lock().pop_front() else {
                return;
            };

            // The slot is reserved before the vendor call and released
            // by the finalizer once the execution is terminal.
            self.running.fetch_add(1, Ordering::SeqCst);
            match self.start_execution(id).await {
                DispatchOutcome::Started => {}
                DispatchOutcome::Released => {
                    self.running.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
    }

    async fn start_execution(self: &Arc<Self>, id: Uuid) -> DispatchOutcome {
        // The execution may have been stopped while queued.
        let Some(ctx) = self.executions.get(&id) else {
            return DispatchOutcome::Released;
        };
        let request = ctx.request.clone();
        drop(ctx);

        let provider = match self.select_provider(&request) {
            Ok(provider) => provider,
            Err(err) => {
                warn!(execution_id = %id, error = %err, "no provider for execution");
                self.finalize(id, ExecutionStatus::Failed, Some(err.to_string()))
                    .await;
                return DispatchOutcome::Released;
            }
        };

        match self.start_on_provider(provider.as_ref(), &request).await {
            Ok(handle) => {
                let provider_name = provider.name().to_string();
                {
                    let Some(mut ctx) = self.executions.get_mut(&id) else {
                        // Stopped during the vendor call; best effort
                        // stop of the orphaned run.
                        let _ = provider.stop_pipeline(&handle.vendor_id).await;
                        return DispatchOutcome::Released;
                    };
                    ctx.mark_started(&provider_name, &handle.vendor_id);
                }
                let snapshot = self.executions.get(&id).map(|ctx| ctx.clone());
                if let Some(ctx) = snapshot {
                    self.persist(&ctx).await;
                }
                info!(
                    execution_id = %id,
                    provider = %provider_name,
                    vendor_id = %handle.vendor_id,
                    "execution started"
                );
                self.bus.publish(PipelineEvent::PipelineStarted {
                    execution_id: id,
                    provider_name,
                    vendor_pipeline_id: handle.vendor_id,
                });
                self.spawn_monitor(id);
                DispatchOutcome::Started
            }
            // An open circuit is a start failure like any other, not a
            // queue retry.
            Err(err) => {
                warn!(execution_id = %id, error = %err, "execution start failed");
                self.bus.publish(PipelineEvent::ProviderError {
                    provider_name: provider.name().to_string(),
                    details: err.to_string(),
                });
                self.finalize(id, ExecutionStatus::Failed, Some(err.to_string()))
                    .await;
                DispatchOutcome::Released
            }
        }
    }

    /// Materializes the pipeline (when a definition payload is present)
    /// and triggers the run, both behind the provider's breaker.
    async fn start_on_provider(
        &self,
        provider: &dyn Provider,
        request: &ExecutionRequest,
    ) -> Result<ExecutionHandle, RailyardError> {
        let breaker = self.breaker_for(provider.name());
        let spec = PipelineSpec {
            name: derive_pipeline_name(request),
            repository: request.repository.clone(),
            branch: request.branch.clone(),
            definition: request.pipeline_config.clone(),
        };

        let pipeline_id = if request.pipeline_config.is_object() {
            breaker.call(provider.create_pipeline(&spec)).await?
        } else {
            spec.name.clone()
        };

        breaker
            .call(provider.execute_pipeline(&pipeline_id, &request.parameters))
            .await
    }

    fn spawn_monitor(self: &Arc<Self>, id: Uuid) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            inner.monitor_loop(id).await;
        });
        self.tasks.lock().push(handle);
    }

    async fn monitor_loop(self: Arc<Self>, id: Uuid) {
        let mut interval = tokio::time::interval(self.config.monitor_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown_rx.clone();
        let mut failures: u32 = 0;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {
                    debug!(execution_id = %id, "monitor stopping at shutdown");
                    return;
                }
            }

            let Some(ctx) = self.executions.get(&id) else {
                return;
            };
            let (Some(provider_name), Some(vendor_id)) =
                (ctx.provider.clone(), ctx.vendor_pipeline_id.clone())
            else {
                return;
            };
            drop(ctx);

            let Some(provider) = self.registry.get(&provider_name) else {
                self.finalize(
                    id,
                    ExecutionStatus::Failed,
                    Some(format!("provider '{provider_name}' no longer registered")),
                )
                .await;
                return;
            };

            let breaker = self.breaker_for(&provider_name);
            match breaker.call(provider.get_pipeline_status(&vendor_id)).await {
                Ok(snapshot) => {
                    failures = 0;
                    let status = snapshot.status;
                    let mut changed = false;
                    {
                        let Some(mut ctx) = self.executions.get_mut(&id) else {
                            return;
                        };
                        if !snapshot.stages.is_empty() {
                            ctx.stages = snapshot.stages;
                        }
                        if !status.is_terminal() {
                            // The context enforces monotonicity; only an
                            // accepted transition is broadcast.
                            let before = ctx.status;
                            ctx.record_status(status);
                            changed = ctx.status != before;
                        }
                    }

                    if status.is_terminal() {
                        self.finalize(id, status, None).await;
                        return;
                    }
                    if changed {
                        debug!(execution_id = %id, status = %status, "status changed");
                        self.bus.publish(PipelineEvent::PipelineStatusChanged {
                            execution_id: id,
                            status,
                            provider_name: provider_name.clone(),
                        });
                        let snapshot = self.executions.get(&id).map(|ctx| ctx.clone());
                        if let Some(ctx) = snapshot {
                            self.persist(&ctx).await;
                        }
                    }
                }
                Err(err) if err.is_transient() => {
                    failures += 1;
                    debug!(
                        execution_id = %id,
                        error = %err,
                        consecutive = failures,
                        "transient poll failure, retrying next tick"
                    );
                }
                Err(err) => {
                    warn!(execution_id = %id, error = %err, "monitor giving up");
                    self.finalize(id, ExecutionStatus::Failed, Some(err.to_string()))
                        .await;
                    return;
                }
            }
        }
    }

    /// Removes the execution from the live map, persists the terminal
    /// state and releases the concurrency slot.
    ///
    /// The map removal is the exactly-once guard: whichever caller wins
    /// the removal does the bookkeeping, later callers are no-ops.
    async fn finalize(&self, id: Uuid, status: ExecutionStatus, failure_reason: Option<String>) {
        let Some((_, mut ctx)) = self.executions.remove(&id) else {
            return;
        };
        let held_slot = ctx.started_at.is_some();
        ctx.mark_terminal(status, failure_reason);
        self.persist(&ctx).await;
        if held_slot {
            self.running.fetch_sub(1, Ordering::SeqCst);
        }

        info!(
            execution_id = %id,
            status = %ctx.status,
            duration_ms = ctx.duration_ms().unwrap_or(0),
            "execution finished"
        );
        match ctx.status {
            ExecutionStatus::Success => self.bus.publish(PipelineEvent::PipelineCompleted {
                execution_id: id,
                status: ctx.status,
                duration_ms: ctx.duration_ms().unwrap_or(0),
                provider_name: ctx.provider.clone().unwrap_or_default(),
            }),
            ExecutionStatus::Failed => self.bus.publish(PipelineEvent::PipelineFailed {
                execution_id: id,
                error: ctx
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "pipeline failed".to_string()),
            }),
            ExecutionStatus::Cancelled => {
                self.bus
                    .publish(PipelineEvent::PipelineCancelled { execution_id: id });
            }
            _ => {}
        }
    }
}

/// The orchestration engine.
///
/// Cheap to share behind an `Arc`; all state lives in concurrent
/// structures inside.
pub struct PipelineOrchestrator {
    inner: Arc<Inner>,
    shutdown_tx: watch::Sender<bool>,
    started: AtomicBool,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator with an in-memory store and a bus that
    /// logs every lifecycle event.
    #[must_use]
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_parts(
            config,
            EventBus::with_sink(DEFAULT_BUS_CAPACITY, Arc::new(LoggingEventSink::default())),
            Arc::new(InMemoryExecutionStore::new()),
        )
    }

    /// Creates an orchestrator with an explicit bus and store.
    #[must_use]
    pub fn with_parts(
        config: OrchestratorConfig,
        bus: EventBus,
        store: Arc<dyn ExecutionStore>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = Arc::new(ProviderRegistry::new(bus.clone(), config.request_timeout));
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                bus,
                store,
                executions: DashMap::new(),
                queue: Mutex::new(VecDeque::new()),
                running: AtomicUsize::new(0),
                breakers: DashMap::new(),
                tasks: Mutex::new(Vec::new()),
                shutdown_rx,
            }),
            shutdown_tx,
            started: AtomicBool::new(false),
        }
    }

    /// The provider registry, for registration and inspection.
    #[must_use]
    pub fn registry(&self) -> Arc<ProviderRegistry> {
        Arc::clone(&self.inner.registry)
    }

    /// The event bus, for subscribing to lifecycle events.
    #[must_use]
    pub fn event_bus(&self) -> EventBus {
        self.inner.bus.clone()
    }

    /// Registers providers from environment configuration and persisted
    /// provider rows.
    pub async fn load_providers(&self) {
        self.inner
            .registry
            .register_defaults(default_provider_configs())
            .await;
        match self.inner.store.load_provider_records().await {
            Ok(records) => self.inner.registry.register_from_records(records).await,
            Err(err) => warn!(error = %err, "failed to load provider records"),
        }
    }

    /// Starts the dispatch loop. Idempotent.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let mut shutdown = inner.shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(inner.config.dispatch_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => inner.dispatch_tick().await,
                    _ = shutdown.changed() => {
                        debug!("dispatcher stopping at shutdown");
                        return;
                    }
                }
            }
        });
        self.inner.tasks.lock().push(handle);
        info!(
            max_concurrent = self.inner.config.max_concurrent,
            dispatch_interval_ms = self.inner.config.dispatch_interval.as_millis() as u64,
            "orchestrator started"
        );
    }

    /// Accepts an execution request, returning its id immediately.
    ///
    /// The execution is queued; the dispatch loop binds a provider and
    /// starts it when a concurrency slot is free.
    pub async fn execute_pipeline(&self, request: ExecutionRequest) -> Result<Uuid, RailyardError> {
        if request.repository.trim().is_empty() {
            return Err(RailyardError::Internal(
                "execution request has an empty repository".to_string(),
            ));
        }

        let id = crate::utils::generate_uuid();
        let ctx = ExecutionContext::new(id, request.clone());
        self.inner.persist(&ctx).await;
        self.inner.executions.insert(id, ctx);
        self.inner.queue.lock().push_back(id);
        info!(execution_id = %id, repository = %request.repository, "execution queued");
        self.inner.bus.publish(PipelineEvent::PipelineQueued {
            execution_id: id,
            request,
        });
        Ok(id)
    }

    /// Returns the current state of an execution, live or completed.
    pub async fn get_pipeline_status(&self, id: Uuid) -> Result<ExecutionRecord, RailyardError> {
        if let Some(ctx) = self.inner.executions.get(&id) {
            return Ok(ExecutionRecord::from_context(&ctx));
        }
        self.inner
            .store
            .load_execution(id)
            .await?
            .ok_or_else(|| RailyardError::unknown_execution(id.to_string()))
    }

    /// Fetches the next log chunk for a running execution, resuming
    /// from the last continuation marker.
    pub async fn get_pipeline_logs(&self, id: Uuid) -> Result<LogChunk, RailyardError> {
        let Some(ctx) = self.inner.executions.get(&id) else {
            return Err(RailyardError::unknown_execution(id.to_string()));
        };
        let (Some(provider_name), Some(vendor_id)) =
            (ctx.provider.clone(), ctx.vendor_pipeline_id.clone())
        else {
            return Err(RailyardError::execution_not_started(id.to_string()));
        };
        let marker = ctx.log_markers.last().cloned();
        drop(ctx);

        let provider = self.inner.registry.get(&provider_name).ok_or_else(|| {
            RailyardError::Internal(format!("provider '{provider_name}' no longer registered"))
        })?;
        let options = LogOptions {
            marker,
            limit: None,
        };
        let chunk = provider.get_pipeline_logs(&vendor_id, &options).await?;
        if let Some(next) = &chunk.next_marker {
            if let Some(mut ctx) = self.inner.executions.get_mut(&id) {
                ctx.log_markers.push(next.clone());
            }
        }
        Ok(chunk)
    }

    /// All live (queued, running or paused) executions.
    #[must_use]
    pub fn get_active_executions(&self) -> Vec<ExecutionContext> {
        self.inner
            .executions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Stops an execution.
    ///
    /// Fails with [`RailyardError::ExecutionNotStarted`] when no
    /// provider is bound yet; a vendor-side stop failure is returned
    /// without cancelling the local state.
    pub async fn stop_pipeline(&self, id: Uuid) -> Result<(), RailyardError> {
        let Some(ctx) = self.inner.executions.get(&id) else {
            return Err(RailyardError::unknown_execution(id.to_string()));
        };
        let provider_name = ctx.provider.clone();
        let vendor_id = ctx.vendor_pipeline_id.clone();
        drop(ctx);

        let (Some(provider_name), Some(vendor_id)) = (provider_name, vendor_id) else {
            return Err(RailyardError::execution_not_started(id.to_string()));
        };

        if let Some(provider) = self.inner.registry.get(&provider_name) {
            let breaker = self.inner.breaker_for(&provider_name);
            breaker.call(provider.stop_pipeline(&vendor_id)).await?;
        }
        self.inner
            .finalize(id, ExecutionStatus::Cancelled, None)
            .await;
        Ok(())
    }

    /// Credential-free descriptions of all registered providers.
    #[must_use]
    pub fn get_providers(&self) -> Vec<ProviderInfo> {
        self.inner.registry.infos()
    }

    /// Probes every registered provider's health.
    pub async fn check_providers_health(&self) -> Vec<(String, bool)> {
        self.inner.registry.check_health().await
    }

    /// Number of executions currently holding a concurrency slot.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Stops the dispatcher and monitors, then disconnects providers.
    ///
    /// Queued executions stay persisted as queued and are not failed.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = self.inner.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.inner.registry.disconnect_all().await;
        info!("orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PipelineKind;
    use crate::testing::{fast_config, sample_request, MockProvider};

    fn inner_for(config: OrchestratorConfig) -> (PipelineOrchestrator, Arc<Inner>) {
        let orchestrator = PipelineOrchestrator::new(config);
        let inner = Arc::clone(&orchestrator.inner);
        (orchestrator, inner)
    }

    #[test]
    fn test_derive_pipeline_name() {
        let req = ExecutionRequest::new("git@example.com:team/app.git", "main");
        assert_eq!(derive_pipeline_name(&req), "app");

        let req = ExecutionRequest::new("https://example.com/team/service.git", "main");
        assert_eq!(derive_pipeline_name(&req), "service");

        let req = ExecutionRequest::new("bare-name", "main");
        assert_eq!(derive_pipeline_name(&req), "bare-name");
    }

    #[test]
    fn test_default_kind_map() {
        assert_eq!(default_kind_for(PipelineKind::Build), ProviderKind::Jenkins);
        assert_eq!(default_kind_for(PipelineKind::Deploy), ProviderKind::ArgoCd);
        assert_eq!(default_kind_for(PipelineKind::Artifact), ProviderKind::Nexus);
        assert_eq!(
            default_kind_for(PipelineKind::Test),
            ProviderKind::GithubActions
        );
    }

    #[tokio::test]
    async fn test_select_prefers_explicit_provider() {
        let (orchestrator, inner) = inner_for(fast_config());
        let registry = orchestrator.registry();
        registry
            .register_instance(
                Arc::new(MockProvider::new("jenkins-a", ProviderKind::Jenkins)),
                "mock".to_string(),
            )
            .await;
        registry
            .register_instance(
                Arc::new(MockProvider::new("jenkins-b", ProviderKind::Jenkins)),
                "mock".to_string(),
            )
            .await;

        let request = sample_request().with_provider("jenkins-b");
        let provider = inner.select_provider(&request).unwrap();
        assert_eq!(provider.name(), "jenkins-b");
    }

    #[tokio::test]
    async fn test_select_disconnected_preference_without_fallback_errors() {
        let (orchestrator, inner) = inner_for(fast_config());
        let provider = Arc::new(
            MockProvider::new("jenkins-a", ProviderKind::Jenkins).disconnected(),
        );
        provider.set_fail_connect(true);
        orchestrator
            .registry()
            .register_instance(provider, "mock".to_string())
            .await;

        let request = sample_request().with_provider("jenkins-a");
        let Err(err) = inner.select_provider(&request) else {
            panic!("selection should fail with no connected providers");
        };
        assert!(matches!(err, RailyardError::NoProviderAvailable(_)));
    }

    #[tokio::test]
    async fn test_select_disconnected_preference_falls_through() {
        let (orchestrator, inner) = inner_for(fast_config());
        let registry = orchestrator.registry();
        let preferred = Arc::new(
            MockProvider::new("jenkins-a", ProviderKind::Jenkins).disconnected(),
        );
        preferred.set_fail_connect(true);
        registry
            .register_instance(preferred, "mock".to_string())
            .await;
        registry
            .register_instance(
                Arc::new(MockProvider::new("jenkins-b", ProviderKind::Jenkins)),
                "mock".to_string(),
            )
            .await;

        // The preferred provider is down; the kind default takes over.
        let request = sample_request().with_provider("jenkins-a");
        let provider = inner.select_provider(&request).unwrap();
        assert_eq!(provider.name(), "jenkins-b");
    }

    #[tokio::test]
    async fn test_select_falls_back_by_kind_then_order() {
        let (orchestrator, inner) = inner_for(fast_config());
        let registry = orchestrator.registry();
        registry
            .register_instance(
                Arc::new(MockProvider::new("argocd-a", ProviderKind::ArgoCd)),
                "mock".to_string(),
            )
            .await;
        registry
            .register_instance(
                Arc::new(MockProvider::new("jenkins-a", ProviderKind::Jenkins)),
                "mock".to_string(),
            )
            .await;

        // Build requests map to the jenkins kind even though argocd
        // registered first.
        let provider = inner.select_provider(&sample_request()).unwrap();
        assert_eq!(provider.name(), "jenkins-a");

        // With no provider of the default kind, the first connected
        // provider wins.
        let request = sample_request().with_kind(PipelineKind::Artifact);
        let provider = inner.select_provider(&request).unwrap();
        assert_eq!(provider.name(), "argocd-a");
    }

    #[tokio::test]
    async fn test_select_empty_registry_errors() {
        let (_orchestrator, inner) = inner_for(fast_config());
        let Err(err) = inner.select_provider(&sample_request()) else {
            panic!("empty registry should yield no provider");
        };
        assert!(matches!(err, RailyardError::NoProviderAvailable(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_repository() {
        let (orchestrator, _inner) = inner_for(fast_config());
        let err = orchestrator
            .execute_pipeline(ExecutionRequest::new("", "main"))
            .await
            .unwrap_err();
        assert!(matches!(err, RailyardError::Internal(_)));
    }

    #[tokio::test]
    async fn test_status_of_unknown_execution() {
        let (orchestrator, _inner) = inner_for(fast_config());
        let err = orchestrator
            .get_pipeline_status(crate::utils::generate_uuid())
            .await
            .unwrap_err();
        assert!(matches!(err, RailyardError::UnknownExecution { .. }));
    }

    #[tokio::test]
    async fn test_stop_before_start_errors() {
        let (orchestrator, _inner) = inner_for(fast_config());
        // Dispatcher never started; the execution stays queued.
        let id = orchestrator
            .execute_pipeline(sample_request())
            .await
            .unwrap();

        let err = orchestrator.stop_pipeline(id).await.unwrap_err();
        assert!(matches!(err, RailyardError::ExecutionNotStarted { .. }));

        // Still queued and still visible.
        let record = orchestrator.get_pipeline_status(id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Queued);
    }
}
