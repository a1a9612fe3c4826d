//! # Queue Balancer Core
//!
//! Rebalances message backlog across a fixed set of broker queues by moving
//! individual messages from overloaded queues to underloaded ones.
//!
//! ## Core Responsibilities
//!
//! - **Snapshot**: Reads depth and bind state of every monitored queue
//! - **Planning**: Computes the fair share per bound queue and each queue's target delta
//! - **Execution**: Moves messages one at a time until the reducing queues reach their target
//! - **Failure Classification**: Separates expected broker races from failures that abort a pass
//!
//! ## Architecture
//!
//! A pass is a small state machine driven by [`QueueBalancer`]:
//! 1. `determine_balanced_status` collects a fresh snapshot and plans it into a [`BalancePlan`]
//! 2. `perform_rebalancing` consumes the plan and executes the moves when the plan requires it
//!
//! Broker access goes through the [`TelemetryProvider`] and [`MessageTransfer`] traits.

pub mod balancer;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod memory;
pub mod orchestrator;
pub mod planner;
pub mod provider;
pub mod queue;
pub mod snapshot;

// Re-export main types
pub use balancer::{BalancePlan, ExecutedPass, PassOutcome, QueueBalancer, RebalanceStatus};
pub use classifier::{Classification, ErrorClassifier, CONSUMED_MESSAGE_DESCRIPTIONS};
pub use config::{BalancerPolicy, DEFAULT_TOLERANCE_PERCENT};
pub use errors::{BalancerError, Operation, PassError, ProviderError, RebalanceAborted, Result};
pub use memory::MemoryBroker;
pub use orchestrator::{progress_percent, Outcome, RebalanceReport};
pub use planner::PlanSummary;
pub use provider::{MessageTransfer, QueueStatus, TelemetryProvider};
pub use queue::{MessageRef, MonitoredQueue, MoveOperation};
