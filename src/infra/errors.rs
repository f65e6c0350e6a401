// src/infra/errors.rs — Error types for the harvester

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    // Upstream errors
    #[error("Quota exhausted after {attempts} attempts (server refill hint {refill_in_ms}ms)")]
    QuotaExhausted { attempts: u32, refill_in_ms: i64 },

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("Upstream returned HTTP {status}: {message}")]
    Protocol { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode upstream response: {0}")]
    Decode(String),

    // Cache and persistence (soft, never abort an item)
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Cache write failed for '{key}': {message}")]
    CacheWriteFailed { key: String, message: String },

    #[error("Persisting {collection}/{id} failed: {message}")]
    PersistenceFailed {
        collection: String,
        id: String,
        message: String,
    },

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HarvestError {
    /// Transport and decode failures may be retried; everything else is terminal
    /// for the attempt loop (429s are classified before they become errors).
    pub fn is_retriable(&self) -> bool {
        matches!(self, HarvestError::Transport(_) | HarvestError::Decode(_))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            HarvestError::QuotaExhausted { .. } => FailureKind::QuotaExhausted,
            HarvestError::RetryExhausted { .. } => FailureKind::RetryExhausted,
            HarvestError::Protocol { .. } => FailureKind::Protocol,
            HarvestError::Transport(_) | HarvestError::Decode(_) => FailureKind::Transport,
            _ => FailureKind::Internal,
        }
    }
}

/// Serializable classification of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    QuotaExhausted,
    RetryExhausted,
    Protocol,
    Transport,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&HarvestError> for FailureReason {
    fn from(err: &HarvestError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
