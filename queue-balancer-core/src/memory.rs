use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::ProviderError;
use crate::provider::{MessageTransfer, QueueStatus, TelemetryProvider};
use crate::queue::{MessageRef, MoveOperation};

/// A message held by the in-memory broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub replication_group_msg_id: String,
    pub msg_id: u64,
    pub undelivered: bool,
}

#[derive(Debug, Default)]
struct MemoryQueue {
    messages: VecDeque<StoredMessage>,
    bound_clients: Option<u64>,
}

/// MemoryBroker is an in-memory set of queues implementing both provider traits.
/// Failures can be injected per queue status query, per selection or per move attempt.
/// SHOULD BE USED ONLY FOR TESTING AND DRY RUNS
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<DashMap<String, MemoryQueue>>,
    status_faults: Arc<DashMap<String, ProviderError>>,
    select_faults: Arc<DashMap<u64, ProviderError>>,
    move_faults: Arc<DashMap<u64, ProviderError>>,
    next_msg_id: Arc<AtomicU64>,
    select_attempts: Arc<AtomicU64>,
    move_attempts: Arc<AtomicU64>,
    moves_completed: Arc<AtomicU64>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or resets) a queue with the given number of bound consumer flows.
    pub fn add_queue(&self, name: &str, bound_clients: Option<u64>) {
        self.queues.insert(
            name.to_string(),
            MemoryQueue {
                messages: VecDeque::new(),
                bound_clients,
            },
        );
    }

    pub fn set_bound_clients(&self, name: &str, bound_clients: Option<u64>) {
        if let Some(mut queue) = self.queues.get_mut(name) {
            queue.bound_clients = bound_clients;
        }
    }

    /// Appends `count` never-delivered messages to the tail of the queue.
    pub fn publish(&self, name: &str, count: u64) {
        if let Some(mut queue) = self.queues.get_mut(name) {
            for _ in 0..count {
                let message = self.new_message();
                queue.messages.push_back(message);
            }
        }
    }

    /// Marks the `count` oldest messages as already dispatched to a consumer.
    pub fn mark_delivered(&self, name: &str, count: usize) {
        if let Some(mut queue) = self.queues.get_mut(name) {
            for message in queue.messages.iter_mut().take(count) {
                message.undelivered = false;
            }
        }
    }

    /// Removes the `count` oldest messages, as a consumer would.
    pub fn consume(&self, name: &str, count: usize) {
        if let Some(mut queue) = self.queues.get_mut(name) {
            let count = count.min(queue.messages.len());
            queue.messages.drain(..count);
        }
    }

    pub fn depth(&self, name: &str) -> Option<u64> {
        self.queues
            .get(name)
            .map(|queue| queue.messages.len() as u64)
    }

    pub fn messages(&self, name: &str) -> Vec<StoredMessage> {
        self.queues
            .get(name)
            .map(|queue| queue.messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every status query for `name` fails with `error` until cleared.
    pub fn fail_status(&self, name: &str, error: ProviderError) {
        self.status_faults.insert(name.to_string(), error);
    }

    pub fn clear_status_fault(&self, name: &str) {
        self.status_faults.remove(name);
    }

    /// The selection with the given zero-based sequence number fails with `error`.
    pub fn fail_select_attempt(&self, attempt: u64, error: ProviderError) {
        self.select_faults.insert(attempt, error);
    }

    /// The next move attempt fails with `error` and leaves both queues untouched.
    pub fn fail_next_move(&self, error: ProviderError) {
        self.fail_move_attempt(self.move_attempts.load(Ordering::SeqCst), error);
    }

    /// The move attempt with the given zero-based sequence number fails with `error`.
    pub fn fail_move_attempt(&self, attempt: u64, error: ProviderError) {
        self.move_faults.insert(attempt, error);
    }

    pub fn moves_completed(&self) -> u64 {
        self.moves_completed.load(Ordering::SeqCst)
    }

    fn new_message(&self) -> StoredMessage {
        let msg_id = self.next_msg_id.fetch_add(1, Ordering::SeqCst) + 1;
        StoredMessage {
            replication_group_msg_id: format!("rmid1:mem-{msg_id:08}"),
            msg_id,
            undelivered: true,
        }
    }

    fn unknown_queue(name: &str) -> ProviderError {
        ProviderError::NotFound {
            code: Some(6),
            description: format!("Could not find match for queue {name}"),
        }
    }
}

#[async_trait]
impl TelemetryProvider for MemoryBroker {
    async fn queue_status(&self, queue: &str) -> Result<QueueStatus, ProviderError> {
        if let Some(fault) = self.status_faults.get(queue) {
            return Err(fault.value().clone());
        }

        let entry = self
            .queues
            .get(queue)
            .ok_or_else(|| Self::unknown_queue(queue))?;

        Ok(QueueStatus {
            depth: entry.messages.len() as u64,
            bound_clients: entry.bound_clients,
        })
    }
}

#[async_trait]
impl MessageTransfer for MemoryBroker {
    async fn select_message(
        &self,
        queue: &str,
        prefer_undelivered: bool,
    ) -> Result<Option<MessageRef>, ProviderError> {
        let attempt = self.select_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some((_, fault)) = self.select_faults.remove(&attempt) {
            return Err(fault);
        }

        let entry = self
            .queues
            .get(queue)
            .ok_or_else(|| Self::unknown_queue(queue))?;

        let preferred = if prefer_undelivered {
            entry.messages.iter().find(|m| m.undelivered)
        } else {
            None
        };

        Ok(preferred
            .or_else(|| entry.messages.front())
            .map(|message| MessageRef {
                transfer_id: message.replication_group_msg_id.clone(),
                delete_id: message.msg_id.to_string(),
                undelivered: Some(message.undelivered),
            }))
    }

    async fn move_message(&self, operation: &MoveOperation) -> Result<(), ProviderError> {
        let attempt = self.move_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some((_, fault)) = self.move_faults.remove(&attempt) {
            return Err(fault);
        }

        if !self.queues.contains_key(&operation.target_queue) {
            return Err(Self::unknown_queue(&operation.target_queue));
        }

        // Copy and delete are applied as one step; the source entry is released
        // before the target entry is locked.
        {
            let mut source = self
                .queues
                .get_mut(&operation.source_queue)
                .ok_or_else(|| Self::unknown_queue(&operation.source_queue))?;

            let position = source
                .messages
                .iter()
                .position(|m| m.replication_group_msg_id == operation.transfer_id)
                .ok_or_else(|| ProviderError::NotFound {
                    code: None,
                    description: format!(
                        "Source Message Not Found: {}",
                        operation.transfer_id
                    ),
                })?;

            if source.messages[position].msg_id.to_string() != operation.delete_id {
                return Err(ProviderError::NotFound {
                    code: None,
                    description: format!("Could not find match for msg {}", operation.delete_id),
                });
            }

            source.messages.remove(position);
        }

        let copy = self.new_message();
        if let Some(mut target) = self.queues.get_mut(&operation.target_queue) {
            target.messages.push_back(copy);
        }

        self.moves_completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
