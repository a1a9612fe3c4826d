use serde::{Deserialize, Serialize};

/// A monitored queue as observed at the start of a pass, plus the planner's verdict on it.
///
/// The observed fields are written once per pass from the telemetry snapshot.
/// `target_delta` is set by the planner and then decays toward zero as moves complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoredQueue {
    /// Queue name, unique within the monitored set
    name: String,
    /// Message count at snapshot time
    observed_depth: u64,
    /// At least one consumer attached (legacy brokers that do not report flows count as bound)
    clients_bound: bool,
    /// Positive: messages to receive. Negative: messages to give away.
    target_delta: i64,
    /// Imbalance is outside tolerance for this queue
    rebalance_flag: bool,
}

impl MonitoredQueue {
    /// Creates an unobserved queue: depth 0, unbound, nothing planned.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observed_depth: 0,
            clients_bound: false,
            target_delta: 0,
            rebalance_flag: false,
        }
    }

    /// Creates a queue with an already known observation.
    pub fn observed(name: impl Into<String>, depth: u64, clients_bound: bool) -> Self {
        let mut queue = Self::new(name);
        queue.observe(depth, clients_bound);
        queue
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn observed_depth(&self) -> u64 {
        self.observed_depth
    }

    pub fn clients_bound(&self) -> bool {
        self.clients_bound
    }

    pub fn target_delta(&self) -> i64 {
        self.target_delta
    }

    pub fn rebalance_flag(&self) -> bool {
        self.rebalance_flag
    }

    /// Negative target delta, the queue has to give messages away.
    pub fn is_reducing(&self) -> bool {
        self.target_delta < 0
    }

    pub(crate) fn observe(&mut self, depth: u64, clients_bound: bool) {
        self.observed_depth = depth;
        self.clients_bound = clients_bound;
    }

    pub(crate) fn reset_plan(&mut self) {
        self.target_delta = 0;
        self.rebalance_flag = false;
    }

    pub(crate) fn set_target_delta(&mut self, delta: i64) {
        self.target_delta = delta;
    }

    pub(crate) fn flag_for_rebalance(&mut self) {
        self.rebalance_flag = true;
    }

    /// Records one completed move: both positive and negative targets converge to zero.
    pub(crate) fn record_move(&mut self) {
        if self.target_delta > 0 {
            self.target_delta -= 1;
        } else if self.target_delta < 0 {
            self.target_delta += 1;
        }
    }

    /// Stops any further moves involving this queue for the rest of the pass.
    pub(crate) fn abandon(&mut self) {
        self.target_delta = 0;
    }
}

/// Broker identifiers of one candidate message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Replication group message id, used by the copy
    pub transfer_id: String,
    /// Message id, used by the delete
    pub delete_id: String,
    /// Whether the message was never dispatched to a consumer, when the broker reports it
    pub undelivered: Option<bool>,
}

/// A single planned message transfer, alive only for the duration of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveOperation {
    pub transfer_id: String,
    pub delete_id: String,
    pub source_queue: String,
    pub target_queue: String,
}

impl MoveOperation {
    pub fn new(message: MessageRef, source_queue: &str, target_queue: &str) -> Self {
        Self {
            transfer_id: message.transfer_id,
            delete_id: message.delete_id,
            source_queue: source_queue.to_string(),
            target_queue: target_queue.to_string(),
        }
    }
}
