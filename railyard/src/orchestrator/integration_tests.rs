//! End-to-end tests driving the orchestrator with mock providers.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{ExecutionStatus, PipelineEvent, PipelineKind};
use crate::errors::RailyardError;
use crate::orchestrator::PipelineOrchestrator;
use crate::providers::ProviderKind;
use crate::testing::{collecting_bus, fast_config, request_for, sample_request, MockProvider};

async fn orchestrator_with(
    providers: Vec<Arc<MockProvider>>,
    config: crate::config::OrchestratorConfig,
) -> PipelineOrchestrator {
    let (bus, _sink) = collecting_bus();
    let orchestrator = PipelineOrchestrator::with_parts(
        config,
        bus,
        Arc::new(crate::store::InMemoryExecutionStore::new()),
    );
    for provider in providers {
        orchestrator
            .registry()
            .register_instance(provider, "mock".to_string())
            .await;
    }
    orchestrator
}

/// Polls until the predicate holds or the deadline passes.
async fn wait_until<F: Fn() -> bool>(predicate: F, deadline: Duration) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    predicate()
}

#[tokio::test]
async fn test_end_to_end_lifecycle() {
    let provider = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins).with_statuses(&[
            ExecutionStatus::Running,
            ExecutionStatus::Running,
            ExecutionStatus::Success,
        ]),
    );
    let orchestrator = orchestrator_with(vec![provider.clone()], fast_config()).await;
    let mut events = orchestrator.event_bus().subscribe();
    orchestrator.start();

    let id = orchestrator
        .execute_pipeline(sample_request())
        .await
        .unwrap();

    // Follow the lifecycle on the bus until the terminal event.
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event stream stalled")
            .unwrap();
        if event.execution_id() != Some(id) {
            continue;
        }
        seen.push(event.event_type());
        if matches!(event, PipelineEvent::PipelineCompleted { .. }) {
            break;
        }
    }
    assert_eq!(seen.first(), Some(&"pipeline_queued"));
    assert!(seen.contains(&"pipeline_started"));
    assert_eq!(seen.last(), Some(&"pipeline_completed"));

    // Terminal state is readable from the store after removal.
    let record = orchestrator.get_pipeline_status(id).await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Success);
    assert!(record.completed_at.is_some());
    assert!(orchestrator.get_active_executions().is_empty());
    assert_eq!(provider.executed_pipelines(), vec!["app".to_string()]);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_concurrency_cap_holds() {
    // Executions that never finish on their own keep both slots busy.
    let provider = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins)
            .with_statuses(&[ExecutionStatus::Running; 200])
            .with_final_status(ExecutionStatus::Running),
    );
    let config = fast_config().with_max_concurrent(2);
    let orchestrator = orchestrator_with(vec![provider.clone()], config).await;
    orchestrator.start();

    for _ in 0..5 {
        orchestrator
            .execute_pipeline(sample_request())
            .await
            .unwrap();
    }

    assert!(
        wait_until(|| provider.execute_calls() == 2, Duration::from_secs(1)).await,
        "two executions should start"
    );
    // Give the dispatcher more ticks; the cap must still hold.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.execute_calls(), 2);
    assert_eq!(orchestrator.running_count(), 2);

    let active = orchestrator.get_active_executions();
    assert_eq!(active.len(), 5);
    let running = active
        .iter()
        .filter(|ctx| ctx.status == ExecutionStatus::Running)
        .count();
    let queued = active
        .iter()
        .filter(|ctx| ctx.status == ExecutionStatus::Queued)
        .count();
    assert_eq!(running, 2);
    assert_eq!(queued, 3);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_queue_is_fifo() {
    let provider = Arc::new(MockProvider::new("jenkins-main", ProviderKind::Jenkins));
    let config = fast_config().with_max_concurrent(1);
    let orchestrator = orchestrator_with(vec![provider.clone()], config).await;
    orchestrator.start();

    for repo in ["host:team/first", "host:team/second", "host:team/third"] {
        orchestrator
            .execute_pipeline(crate::execution::ExecutionRequest::new(repo, "main"))
            .await
            .unwrap();
    }

    assert!(
        wait_until(|| provider.execute_calls() == 3, Duration::from_secs(2)).await,
        "all executions should run"
    );
    assert_eq!(
        provider.executed_pipelines(),
        vec!["first", "second", "third"]
    );

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_slot_released_on_completion() {
    let provider = Arc::new(MockProvider::new("jenkins-main", ProviderKind::Jenkins));
    let config = fast_config().with_max_concurrent(1);
    let orchestrator = orchestrator_with(vec![provider.clone()], config).await;
    orchestrator.start();

    let a = orchestrator
        .execute_pipeline(sample_request())
        .await
        .unwrap();
    let b = orchestrator
        .execute_pipeline(sample_request())
        .await
        .unwrap();

    let orch = &orchestrator;
    assert!(
        wait_until(|| orch.get_active_executions().is_empty(), Duration::from_secs(2)).await,
        "both executions should finish through the single slot"
    );
    assert_eq!(orchestrator.running_count(), 0);
    for id in [a, b] {
        let record = orchestrator.get_pipeline_status(id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Success);
    }

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_status_change_events_follow_vendor() {
    let provider = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins).with_statuses(&[
            ExecutionStatus::Running,
            ExecutionStatus::Paused,
            ExecutionStatus::Running,
            ExecutionStatus::Success,
        ]),
    );
    let orchestrator = orchestrator_with(vec![provider], fast_config()).await;
    let mut events = orchestrator.event_bus().subscribe();
    orchestrator.start();

    let id = orchestrator
        .execute_pipeline(sample_request())
        .await
        .unwrap();

    let mut statuses = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event stream stalled")
            .unwrap();
        match event {
            PipelineEvent::PipelineStatusChanged {
                execution_id,
                status,
                ..
            } if execution_id == id => statuses.push(status),
            PipelineEvent::PipelineCompleted { execution_id, .. } if execution_id == id => break,
            _ => {}
        }
    }
    // Started flips the context to running, so the monitor reports the
    // pause and the resume.
    assert_eq!(
        statuses,
        vec![ExecutionStatus::Paused, ExecutionStatus::Running]
    );

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_queue_phase_polls_do_not_regress_status() {
    // A build server may report queue-phase state for a while after the
    // run is triggered; the execution must stay running and no queued
    // transition may reach the bus.
    let provider = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins).with_statuses(&[
            ExecutionStatus::Queued,
            ExecutionStatus::Queued,
            ExecutionStatus::Success,
        ]),
    );
    let orchestrator = orchestrator_with(vec![provider], fast_config()).await;
    let mut events = orchestrator.event_bus().subscribe();
    orchestrator.start();

    let id = orchestrator
        .execute_pipeline(sample_request())
        .await
        .unwrap();

    let mut statuses = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event stream stalled")
            .unwrap();
        match event {
            PipelineEvent::PipelineStatusChanged {
                execution_id,
                status,
                ..
            } if execution_id == id => statuses.push(status),
            PipelineEvent::PipelineCompleted { execution_id, .. } if execution_id == id => break,
            _ => {}
        }
    }
    assert!(
        !statuses.contains(&ExecutionStatus::Queued),
        "a started execution must not report queued again"
    );

    let record = orchestrator.get_pipeline_status(id).await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Success);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_preferred_provider_wins_over_kind_default() {
    let jenkins = Arc::new(MockProvider::new("jenkins-main", ProviderKind::Jenkins));
    let github = Arc::new(MockProvider::new("github-hosted", ProviderKind::GithubActions));
    let orchestrator =
        orchestrator_with(vec![jenkins.clone(), github.clone()], fast_config()).await;
    orchestrator.start();

    // A build request would default to jenkins; the preference overrides.
    let id = orchestrator
        .execute_pipeline(request_for("github-hosted"))
        .await
        .unwrap();

    let orch = &orchestrator;
    assert!(
        wait_until(|| orch.get_active_executions().is_empty(), Duration::from_secs(2)).await
    );
    assert_eq!(jenkins.execute_calls(), 0);
    assert_eq!(github.execute_calls(), 1);

    let record = orchestrator.get_pipeline_status(id).await.unwrap();
    assert_eq!(record.provider.as_deref(), Some("github-hosted"));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_deploy_requests_route_to_gitops_provider() {
    let jenkins = Arc::new(MockProvider::new("jenkins-main", ProviderKind::Jenkins));
    let argocd = Arc::new(MockProvider::new("argocd-prod", ProviderKind::ArgoCd));
    let orchestrator =
        orchestrator_with(vec![jenkins.clone(), argocd.clone()], fast_config()).await;
    orchestrator.start();

    orchestrator
        .execute_pipeline(sample_request().with_kind(PipelineKind::Deploy))
        .await
        .unwrap();

    assert!(
        wait_until(|| argocd.execute_calls() == 1, Duration::from_secs(2)).await,
        "deploy should land on the gitops provider"
    );
    assert_eq!(jenkins.execute_calls(), 0);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_disconnected_preference_without_fallback_fails() {
    let provider = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins).disconnected(),
    );
    provider.set_fail_connect(true);
    let orchestrator = orchestrator_with(vec![provider], fast_config()).await;
    let mut events = orchestrator.event_bus().subscribe();
    orchestrator.start();

    let id = orchestrator
        .execute_pipeline(request_for("jenkins-main"))
        .await
        .unwrap();

    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event stream stalled")
            .unwrap();
        if let PipelineEvent::PipelineFailed {
            execution_id,
            error,
        } = event
        {
            assert_eq!(execution_id, id);
            assert!(error.contains("no connected providers"));
            break;
        }
    }

    let record = orchestrator.get_pipeline_status(id).await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_disconnected_preference_falls_through_to_connected() {
    let preferred = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins).disconnected(),
    );
    preferred.set_fail_connect(true);
    let fallback = Arc::new(MockProvider::new("jenkins-backup", ProviderKind::Jenkins));
    let orchestrator =
        orchestrator_with(vec![preferred.clone(), fallback.clone()], fast_config()).await;
    orchestrator.start();

    let id = orchestrator
        .execute_pipeline(request_for("jenkins-main"))
        .await
        .unwrap();

    let orch = &orchestrator;
    assert!(
        wait_until(|| orch.get_active_executions().is_empty(), Duration::from_secs(2)).await,
        "execution should complete on the fallback provider"
    );
    assert_eq!(preferred.execute_calls(), 0);
    assert_eq!(fallback.execute_calls(), 1);

    let record = orchestrator.get_pipeline_status(id).await.unwrap();
    assert_eq!(record.provider.as_deref(), Some("jenkins-backup"));
    assert_eq!(record.status, ExecutionStatus::Success);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_repeated_start_failures_open_circuit() {
    let provider = Arc::new(MockProvider::new("jenkins-main", ProviderKind::Jenkins));
    provider.set_fail_execute(true);
    let config = fast_config()
        .with_max_concurrent(5)
        .with_breaker_threshold(2)
        .with_breaker_reset_timeout(Duration::from_secs(30));
    let orchestrator = orchestrator_with(vec![provider.clone()], config).await;
    orchestrator.start();

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(
            orchestrator
                .execute_pipeline(sample_request())
                .await
                .unwrap(),
        );
    }

    // Two vendor failures trip the breaker; the third start
    // short-circuits without reaching the vendor at all.
    let orch = &orchestrator;
    assert!(
        wait_until(
            || orch.get_active_executions().is_empty(),
            Duration::from_secs(2)
        )
        .await,
        "all three executions should fail"
    );

    let mut reasons = Vec::new();
    for id in ids {
        let record = orchestrator.get_pipeline_status(id).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Failed);
        reasons.push(record.failure_reason.unwrap_or_default());
    }
    assert!(reasons[0].contains("injected failure"));
    assert!(reasons[1].contains("injected failure"));
    assert!(reasons[2].contains("circuit open"));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_stop_running_execution() {
    let provider = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins)
            .with_statuses(&[ExecutionStatus::Running; 200])
            .with_final_status(ExecutionStatus::Running),
    );
    let orchestrator = orchestrator_with(vec![provider.clone()], fast_config()).await;
    let mut events = orchestrator.event_bus().subscribe();
    orchestrator.start();

    let id = orchestrator
        .execute_pipeline(sample_request())
        .await
        .unwrap();
    assert!(
        wait_until(|| provider.execute_calls() == 1, Duration::from_secs(2)).await,
        "execution should start"
    );

    orchestrator.stop_pipeline(id).await.unwrap();
    assert_eq!(provider.stop_calls(), 1);
    assert!(orchestrator.get_active_executions().is_empty());
    assert_eq!(orchestrator.running_count(), 0);

    let record = orchestrator.get_pipeline_status(id).await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Cancelled);

    // A cancelled event was broadcast.
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("event stream stalled")
            .unwrap();
        if matches!(event, PipelineEvent::PipelineCancelled { execution_id } if execution_id == id)
        {
            break;
        }
    }

    // Stopping again reports the execution as unknown to the live map.
    let err = orchestrator.stop_pipeline(id).await.unwrap_err();
    assert!(matches!(err, RailyardError::UnknownExecution { .. }));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_vendor_failure_marks_execution_failed() {
    let provider = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins).with_statuses(&[
            ExecutionStatus::Running,
            ExecutionStatus::Failed,
        ]),
    );
    let orchestrator = orchestrator_with(vec![provider], fast_config()).await;
    orchestrator.start();

    let id = orchestrator
        .execute_pipeline(sample_request())
        .await
        .unwrap();

    let orch = &orchestrator;
    assert!(
        wait_until(|| orch.get_active_executions().is_empty(), Duration::from_secs(2)).await
    );
    let record = orchestrator.get_pipeline_status(id).await.unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.completed_at.is_some());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_logs_resume_from_marker() {
    let provider = Arc::new(
        MockProvider::new("jenkins-main", ProviderKind::Jenkins)
            .with_statuses(&[ExecutionStatus::Running; 200])
            .with_final_status(ExecutionStatus::Running),
    );
    let orchestrator = orchestrator_with(vec![provider.clone()], fast_config()).await;
    orchestrator.start();

    let id = orchestrator
        .execute_pipeline(sample_request())
        .await
        .unwrap();
    assert!(
        wait_until(|| provider.execute_calls() == 1, Duration::from_secs(2)).await
    );

    let chunk = orchestrator.get_pipeline_logs(id).await.unwrap();
    assert!(chunk.text.contains("mock log"));

    orchestrator.shutdown().await;
}
