use std::fmt;

use thiserror::Error;

use crate::orchestrator::progress_percent;

pub type Result<T> = std::result::Result<T, BalancerError>;

/// Failure reported by a telemetry provider or message transfer service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("not found: {description}")]
    NotFound {
        code: Option<i64>,
        description: String,
    },

    #[error("unauthorized: {description}")]
    Unauthorized { description: String },

    #[error("{description} ({status})")]
    Other {
        status: String,
        code: Option<i64>,
        description: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unable to decode broker response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Stable numeric error code, when the broker supplied one.
    pub fn code(&self) -> Option<i64> {
        match self {
            ProviderError::NotFound { code, .. } | ProviderError::Other { code, .. } => *code,
            _ => None,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            ProviderError::NotFound { description, .. }
            | ProviderError::Unauthorized { description }
            | ProviderError::Other { description, .. } => description,
            ProviderError::Transport(message) | ProviderError::Decode(message) => message,
        }
    }
}

/// Broker interaction a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    QueueStatus,
    SelectMessage,
    MoveMessage,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::QueueStatus => write!(f, "queue status query"),
            Operation::SelectMessage => write!(f, "message selection"),
            Operation::MoveMessage => write!(f, "message move"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("{operation} failed for queue {queue}: {source}")]
    Fatal {
        operation: Operation,
        queue: String,
        #[source]
        source: ProviderError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BalancerError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            BalancerError::Fatal {
                source: ProviderError::Unauthorized { .. },
                ..
            }
        )
    }
}

/// A pass that stopped on a fatal failure, with the progress made before it.
#[derive(Debug, Error)]
#[error("rebalance aborted after {progress}% of planned moves ({completed}/{planned}): {source}")]
pub struct RebalanceAborted {
    pub completed: u64,
    pub planned: u64,
    pub progress: u64,
    #[source]
    pub source: BalancerError,
}

impl RebalanceAborted {
    pub fn new(completed: u64, planned: u64, source: BalancerError) -> Self {
        Self {
            completed,
            planned,
            progress: progress_percent(completed, planned),
            source,
        }
    }
}

/// Failure of a full check-then-rebalance pass.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Planning(#[from] BalancerError),

    #[error(transparent)]
    Aborted(#[from] RebalanceAborted),
}
