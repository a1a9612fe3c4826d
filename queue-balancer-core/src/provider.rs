use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;
use crate::queue::{MessageRef, MoveOperation};

/// Depth and consumer binding of one queue as reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueStatus {
    pub depth: u64,
    /// Number of bound consumer flows, `None` when the broker does not report it
    pub bound_clients: Option<u64>,
}

impl QueueStatus {
    /// Unknown bind counts come from older brokers and are assumed bound.
    pub fn clients_bound(&self) -> bool {
        self.bound_clients.map_or(true, |count| count > 0)
    }
}

/// Source of queue depth and bind state.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    async fn queue_status(&self, queue: &str) -> Result<QueueStatus, ProviderError>;
}

/// Moves messages between queues, one message per call.
#[async_trait]
pub trait MessageTransfer: Send + Sync {
    /// Returns one candidate message from `queue`, or `None` when the queue has nothing to give.
    ///
    /// With `prefer_undelivered` the candidate is a message never dispatched to a consumer
    /// when one exists, otherwise the oldest message.
    async fn select_message(
        &self,
        queue: &str,
        prefer_undelivered: bool,
    ) -> Result<Option<MessageRef>, ProviderError>;

    /// Copies the message to the target queue, then deletes it from the source queue.
    async fn move_message(&self, operation: &MoveOperation) -> Result<(), ProviderError>;
}
