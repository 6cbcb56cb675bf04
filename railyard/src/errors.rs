//! Error types for the railyard orchestration core.
//!
//! The taxonomy distinguishes construction-time failures (missing
//! configuration), connectivity failures (non-fatal, the provider is
//! marked unavailable), caller errors (unsupported capability, stopping
//! an unstarted execution) and runtime failures (vendor API errors,
//! open circuits, no eligible provider).

use thiserror::Error;

/// The main error type for railyard operations.
#[derive(Debug, Error)]
pub enum RailyardError {
    /// Required configuration fields were absent at provider construction.
    #[error("{0}")]
    MissingConfig(#[from] MissingConfigError),

    /// A provider could not be reached or authenticated.
    #[error("{0}")]
    Connectivity(#[from] ConnectivityError),

    /// An optional capability was invoked on a provider that lacks it.
    #[error("{0}")]
    CapabilityNotSupported(#[from] CapabilityNotSupportedError),

    /// No connected provider was eligible for an execution request.
    #[error("{0}")]
    NoProviderAvailable(#[from] NoProviderAvailableError),

    /// A call was short-circuited by an open circuit breaker.
    #[error("{0}")]
    CircuitOpen(#[from] CircuitOpenError),

    /// A vendor API call failed with a non-2xx status or transport error.
    #[error("{0}")]
    VendorApi(#[from] VendorApiError),

    /// `stop_pipeline` was called before a provider was bound.
    #[error("execution '{execution_id}' has not started: no provider bound")]
    ExecutionNotStarted {
        /// The execution id.
        execution_id: String,
    },

    /// The referenced execution is unknown to the orchestrator.
    #[error("unknown execution: {execution_id}")]
    UnknownExecution {
        /// The execution id.
        execution_id: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RailyardError {
    /// Creates an execution-not-started error.
    #[must_use]
    pub fn execution_not_started(execution_id: impl Into<String>) -> Self {
        Self::ExecutionNotStarted {
            execution_id: execution_id.into(),
        }
    }

    /// Creates an unknown-execution error.
    #[must_use]
    pub fn unknown_execution(execution_id: impl Into<String>) -> Self {
        Self::UnknownExecution {
            execution_id: execution_id.into(),
        }
    }

    /// Returns true if the error indicates a transient condition worth
    /// retrying on the next monitor tick.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::VendorApi(e) => e.is_transient(),
            Self::CircuitOpen(_) => true,
            _ => false,
        }
    }
}

/// Error raised when a provider config is missing required fields.
///
/// Lists every absent field so a single validation pass surfaces the
/// complete fix.
#[derive(Debug, Clone, Error)]
#[error("provider '{provider}' is missing required config fields: {}", missing_fields.join(", "))]
pub struct MissingConfigError {
    /// The provider name.
    pub provider: String,
    /// All required fields that were absent.
    pub missing_fields: Vec<String>,
}

impl MissingConfigError {
    /// Creates a new missing config error.
    #[must_use]
    pub fn new(provider: impl Into<String>, missing_fields: Vec<String>) -> Self {
        Self {
            provider: provider.into(),
            missing_fields,
        }
    }
}

/// Error raised when a provider cannot be reached or authenticated.
#[derive(Debug, Clone, Error)]
#[error("provider '{provider}' connectivity failure: {reason}")]
pub struct ConnectivityError {
    /// The provider name.
    pub provider: String,
    /// What went wrong.
    pub reason: String,
}

impl ConnectivityError {
    /// Creates a new connectivity error.
    #[must_use]
    pub fn new(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised when invoking a capability a provider does not support.
#[derive(Debug, Clone, Error)]
#[error("provider '{provider}' does not support capability '{capability}'")]
pub struct CapabilityNotSupportedError {
    /// The provider name.
    pub provider: String,
    /// The unsupported capability.
    pub capability: String,
}

impl CapabilityNotSupportedError {
    /// Creates a new capability error.
    #[must_use]
    pub fn new(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            capability: capability.into(),
        }
    }
}

/// Error raised when no connected provider can serve a request.
#[derive(Debug, Clone, Error)]
#[error("no provider available for execution: {reason}")]
pub struct NoProviderAvailableError {
    /// Why no provider matched.
    pub reason: String,
}

impl NoProviderAvailableError {
    /// Creates a new no-provider error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Error raised when a circuit breaker short-circuits a call.
#[derive(Debug, Clone, Error)]
#[error("circuit open for '{scope}': retry after {retry_after_ms}ms")]
pub struct CircuitOpenError {
    /// The protected scope (provider name).
    pub scope: String,
    /// Milliseconds until the breaker half-opens.
    pub retry_after_ms: u64,
}

impl CircuitOpenError {
    /// Creates a new circuit open error.
    #[must_use]
    pub fn new(scope: impl Into<String>, retry_after_ms: u64) -> Self {
        Self {
            scope: scope.into(),
            retry_after_ms,
        }
    }
}

/// Error wrapping a failed vendor API call.
#[derive(Debug, Error)]
#[error("vendor API error from '{provider}' during {operation}: {message}")]
pub struct VendorApiError {
    /// The provider name.
    pub provider: String,
    /// The operation that failed (e.g. "execute_pipeline").
    pub operation: String,
    /// HTTP status code, when the vendor responded at all.
    pub status: Option<u16>,
    /// Human-readable failure detail.
    pub message: String,
    /// Underlying transport error, when present.
    #[source]
    pub source: Option<reqwest::Error>,
}

impl VendorApiError {
    /// Creates an error from a non-2xx vendor response.
    #[must_use]
    pub fn status(
        provider: impl Into<String>,
        operation: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation: operation.into(),
            status: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error from a transport failure.
    #[must_use]
    pub fn transport(
        provider: impl Into<String>,
        operation: impl Into<String>,
        source: reqwest::Error,
    ) -> Self {
        Self {
            provider: provider.into(),
            operation: operation.into(),
            status: source.status().map(|s| s.as_u16()),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Returns true if the failure looks transient (timeout, connect
    /// failure, or a 5xx/429 vendor response).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        if let Some(code) = self.status {
            return code >= 500 || code == 429;
        }
        self.source
            .as_ref()
            .map(|e| e.is_timeout() || e.is_connect())
            .unwrap_or(true)
    }
}
