use thiserror::Error;

use crate::model::asset::AssetKind;
use crate::store::{Channel, ImportStage};

/// Central error type for kubegraph operations.
#[derive(Error, Debug)]
pub enum KubeGraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Listing one resource kind failed. The collector recovers from this
    /// locally; it never reaches callers of `collect_all_assets`.
    #[error("Failed to collect {kind} resources: {message}")]
    Collection { kind: AssetKind, message: String },

    #[error("Graph store unavailable via {channel} channel: {message}")]
    StoreUnavailable { channel: Channel, message: String },

    #[error("Timed out after {elapsed_ms}ms during {operation} on {channel} channel")]
    Timeout {
        channel: Channel,
        operation: &'static str,
        elapsed_ms: u64,
    },

    #[error(
        "Partial import via {channel} channel: {nodes_written} nodes and \
         {relationships_written} relationships written before failure: {message}"
    )]
    PartialImport {
        channel: Channel,
        nodes_written: usize,
        relationships_written: usize,
        message: String,
    },

    #[error("Import rolled back during {stage} stage on {channel} channel: {message}")]
    ImportRolledBack {
        channel: Channel,
        stage: ImportStage,
        message: String,
    },

    /// Diagnostic reported by the store, passed through verbatim.
    #[error("Query failed: {message}")]
    QueryFailed {
        code: Option<String>,
        message: String,
    },

    #[error("Duplicate asset identity: {0}")]
    DuplicateIdentity(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl KubeGraphError {
    /// Failures worth retrying after a pause.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KubeGraphError::Timeout { .. } | KubeGraphError::StoreUnavailable { .. }
        )
    }

    /// Failures caused by the request rather than the store.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, KubeGraphError::InvalidRequest(_))
    }

    pub fn query(code: Option<String>, message: impl Into<String>) -> Self {
        KubeGraphError::QueryFailed {
            code,
            message: message.into(),
        }
    }

    pub fn unavailable(channel: Channel, message: impl Into<String>) -> Self {
        KubeGraphError::StoreUnavailable {
            channel,
            message: message.into(),
        }
    }
}

/// Convenience type alias for kubegraph results.
pub type KubeGraphResult<T> = Result<T, KubeGraphError>;
