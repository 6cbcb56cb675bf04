//! Persistence boundary for execution records and provider rows.
//!
//! The relational store is an external collaborator; this module only
//! defines the boundary trait and an in-memory implementation used for
//! single-process operation and tests. Records mirror the logical
//! `pipeline_executions` / `pipeline_providers` schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::ExecutionStatus;
use crate::errors::RailyardError;
use crate::execution::ExecutionContext;
use crate::providers::ProviderKind;

/// One row of the `pipeline_executions` table, upserted on every
/// status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Execution id (primary key).
    pub pipeline_id: Uuid,
    /// Target repository.
    pub repository: String,
    /// Target branch.
    pub branch: String,
    /// Target environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Canonical status.
    pub status: ExecutionStatus,
    /// Bound provider, once chosen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// When the request was accepted.
    pub created_at: DateTime<Utc>,
    /// When the vendor run started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When a terminal status was reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Invocation parameters.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Vendor pipeline configuration.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Failure reason for failed executions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ExecutionRecord {
    /// Projects an execution context onto its persisted row.
    #[must_use]
    pub fn from_context(ctx: &ExecutionContext) -> Self {
        Self {
            pipeline_id: ctx.execution_id,
            repository: ctx.request.repository.clone(),
            branch: ctx.request.branch.clone(),
            environment: ctx.request.environment.clone(),
            status: ctx.status,
            provider: ctx.provider.clone(),
            created_at: ctx.created_at,
            started_at: ctx.started_at,
            completed_at: ctx.completed_at,
            parameters: serde_json::Value::Object(ctx.request.parameters.clone()),
            config: ctx.request.pipeline_config.clone(),
            failure_reason: ctx.failure_reason.clone(),
        }
    }
}

/// One row of the `pipeline_providers` table, read at startup to
/// construct dynamically configured providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Logical provider name.
    pub name: String,
    /// Engine kind.
    pub provider_type: ProviderKind,
    /// Provider configuration JSON (endpoint, credentials, extras).
    pub config: serde_json::Value,
    /// Whether the row should be constructed.
    pub enabled: bool,
}

/// The persistence sink for execution state.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Upserts an execution row.
    async fn save_execution(&self, record: ExecutionRecord) -> Result<(), RailyardError>;

    /// Loads one execution row.
    async fn load_execution(&self, pipeline_id: Uuid) -> Result<Option<ExecutionRecord>, RailyardError>;

    /// Lists all execution rows.
    async fn list_executions(&self) -> Result<Vec<ExecutionRecord>, RailyardError>;

    /// Loads the dynamically configured provider rows.
    async fn load_provider_records(&self) -> Result<Vec<ProviderRecord>, RailyardError>;
}

/// In-memory store for single-process operation and tests.
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<Uuid, ExecutionRecord>>,
    providers: RwLock<Vec<ProviderRecord>>,
}

impl InMemoryExecutionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the provider rows returned by `load_provider_records`.
    pub fn seed_providers(&self, records: Vec<ProviderRecord>) {
        *self.providers.write() = records;
    }

    /// Returns the number of stored execution rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executions.read().len()
    }

    /// Returns true if no executions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executions.read().is_empty()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn save_execution(&self, record: ExecutionRecord) -> Result<(), RailyardError> {
        self.executions.write().insert(record.pipeline_id, record);
        Ok(())
    }

    async fn load_execution(&self, pipeline_id: Uuid) -> Result<Option<ExecutionRecord>, RailyardError> {
        Ok(self.executions.read().get(&pipeline_id).cloned())
    }

    async fn list_executions(&self) -> Result<Vec<ExecutionRecord>, RailyardError> {
        Ok(self.executions.read().values().cloned().collect())
    }

    async fn load_provider_records(&self) -> Result<Vec<ProviderRecord>, RailyardError> {
        Ok(self.providers.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionRequest;
    use crate::utils::generate_uuid;

    fn context() -> ExecutionContext {
        ExecutionContext::new(generate_uuid(), ExecutionRequest::new("org/repo", "main"))
    }

    #[tokio::test]
    async fn test_save_and_load_execution() {
        let store = InMemoryExecutionStore::new();
        let ctx = context();
        let id = ctx.execution_id;

        store
            .save_execution(ExecutionRecord::from_context(&ctx))
            .await
            .unwrap();

        let loaded = store.load_execution(id).await.unwrap().unwrap();
        assert_eq!(loaded.pipeline_id, id);
        assert_eq!(loaded.status, ExecutionStatus::Queued);
        assert_eq!(loaded.repository, "org/repo");
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = InMemoryExecutionStore::new();
        let mut ctx = context();
        let id = ctx.execution_id;

        store
            .save_execution(ExecutionRecord::from_context(&ctx))
            .await
            .unwrap();

        ctx.mark_started("jenkins-main", "demo/1");
        store
            .save_execution(ExecutionRecord::from_context(&ctx))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let loaded = store.load_execution(id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Running);
        assert_eq!(loaded.provider.as_deref(), Some("jenkins-main"));
    }

    #[tokio::test]
    async fn test_load_missing_execution() {
        let store = InMemoryExecutionStore::new();
        assert!(store.load_execution(generate_uuid()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seeded_provider_records() {
        let store = InMemoryExecutionStore::new();
        store.seed_providers(vec![ProviderRecord {
            name: "jenkins-team-a".to_string(),
            provider_type: ProviderKind::Jenkins,
            config: serde_json::json!({ "endpoint": "https://ci.example.com" }),
            enabled: true,
        }]);

        let records = store.load_provider_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "jenkins-team-a");
    }

    #[test]
    fn test_record_captures_failure_reason() {
        let mut ctx = context();
        ctx.mark_terminal(ExecutionStatus::Failed, Some("no provider".to_string()));

        let record = ExecutionRecord::from_context(&ctx);
        assert_eq!(record.failure_reason.as_deref(), Some("no provider"));
        assert!(record.completed_at.is_some());
    }
}
