use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::classifier::ErrorClassifier;
use crate::config::BalancerPolicy;
use crate::errors::{BalancerError, PassError, RebalanceAborted, Result};
use crate::orchestrator::{self, RebalanceReport};
use crate::planner::{self, PlanSummary};
use crate::provider::{MessageTransfer, TelemetryProvider};
use crate::queue::MonitoredQueue;
use crate::snapshot::collect_snapshot;

/// A planned pass: the snapshot it was computed from and the planner's verdict.
///
/// Executing consumes the plan, so a plan is executed at most once.
#[derive(Debug, Clone)]
pub struct BalancePlan {
    queues: Vec<MonitoredQueue>,
    summary: PlanSummary,
}

impl BalancePlan {
    /// Plans an already collected snapshot.
    pub fn from_snapshot(mut queues: Vec<MonitoredQueue>, policy: &BalancerPolicy) -> Self {
        let summary = planner::plan(&mut queues, policy);
        Self { queues, summary }
    }

    pub fn rebalance_needed(&self) -> bool {
        self.summary.rebalance_needed
    }

    pub fn queues(&self) -> &[MonitoredQueue] {
        &self.queues
    }

    pub fn summary(&self) -> &PlanSummary {
        &self.summary
    }

    /// Runs the moves when the plan needs them, otherwise reports that there is nothing to move.
    pub async fn execute<M>(
        mut self,
        transfer: &M,
        classifier: &ErrorClassifier,
        prefer_undelivered: bool,
    ) -> std::result::Result<ExecutedPass, RebalanceAborted>
    where
        M: MessageTransfer + ?Sized,
    {
        if !self.summary.rebalance_needed {
            info!("rebalance requested while no rebalancing is required, nothing to do");
            return Ok(ExecutedPass {
                queues: self.queues,
                report: RebalanceReport::nothing_to_move(),
            });
        }

        let report =
            orchestrator::execute(&mut self.queues, transfer, classifier, prefer_undelivered)
                .await?;

        Ok(ExecutedPass {
            queues: self.queues,
            report,
        })
    }
}

/// An executed pass: the queue records after execution and the execution report.
#[derive(Debug, Clone)]
pub struct ExecutedPass {
    pub queues: Vec<MonitoredQueue>,
    pub report: RebalanceReport,
}

/// Outcome of one check-then-rebalance pass.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    /// Balanced enough, the plan was not executed
    Balanced(BalancePlan),
    /// The plan required rebalancing and was executed to completion
    Rebalanced(ExecutedPass),
}

/// Read-only view of the published "rebalance required" flag, for other threads to poll.
#[derive(Debug, Clone)]
pub struct RebalanceStatus(Arc<AtomicBool>);

impl RebalanceStatus {
    pub fn is_rebalance_required(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// QueueBalancer - balances message backlog across a fixed set of queues
///
/// ## Pass Lifecycle:
/// `determine_balanced_status` → `BalancePlan` (Planned) → `perform_rebalancing` → `ExecutedPass`
///
/// Passes must not overlap for the same queue set; the caller serializes them.
/// The "rebalance required" flag is published atomically after planning and cleared
/// after a fully successful execution.
pub struct QueueBalancer<T, M> {
    telemetry: T,
    transfer: M,
    policy: BalancerPolicy,
    classifier: ErrorClassifier,
    queue_names: Vec<String>,
    rebalance_required: Arc<AtomicBool>,
}

impl<T, M> std::fmt::Debug for QueueBalancer<T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueBalancer")
            .field("policy", &self.policy)
            .field("queue_names", &self.queue_names)
            .field(
                "rebalance_required",
                &self.rebalance_required.load(Ordering::Acquire),
            )
            .finish()
    }
}

impl<T, M> QueueBalancer<T, M>
where
    T: TelemetryProvider,
    M: MessageTransfer,
{
    pub fn new(
        telemetry: T,
        transfer: M,
        queue_names: Vec<String>,
        policy: BalancerPolicy,
    ) -> Result<Self> {
        policy.validate()?;
        validate_queue_names(&queue_names)?;

        Ok(Self {
            telemetry,
            transfer,
            classifier: ErrorClassifier::from_policy(&policy),
            policy,
            queue_names,
            rebalance_required: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Names of the monitored queues, in configured order.
    pub fn monitored_queues(&self) -> &[String] {
        &self.queue_names
    }

    /// Replaces the whole monitored set with `queue_names`.
    pub fn set_monitored_queues(&mut self, queue_names: Vec<String>) -> Result<()> {
        validate_queue_names(&queue_names)?;
        info!(queues = ?queue_names, "monitored queues replaced");
        self.queue_names = queue_names;
        Ok(())
    }

    pub fn policy(&self) -> &BalancerPolicy {
        &self.policy
    }

    /// Result of the latest planning; false after a failed check or a successful rebalance.
    pub fn is_rebalance_required(&self) -> bool {
        self.rebalance_required.load(Ordering::Acquire)
    }

    pub fn status_handle(&self) -> RebalanceStatus {
        RebalanceStatus(Arc::clone(&self.rebalance_required))
    }

    /// Collects a fresh snapshot of every monitored queue and plans it.
    ///
    /// A failed check clears the published flag, pollers never see a verdict
    /// from an earlier pass.
    pub async fn determine_balanced_status(&self) -> Result<BalancePlan> {
        let queues =
            match collect_snapshot(&self.telemetry, &self.queue_names, &self.classifier).await {
                Ok(queues) => queues,
                Err(e) => {
                    self.rebalance_required.store(false, Ordering::Release);
                    return Err(e);
                }
            };
        let plan = BalancePlan::from_snapshot(queues, &self.policy);

        self.rebalance_required
            .store(plan.rebalance_needed(), Ordering::Release);
        info!(
            rebalance_needed = plan.rebalance_needed(),
            "queue balance status determined"
        );

        Ok(plan)
    }

    /// Executes a plan produced by `determine_balanced_status`.
    pub async fn perform_rebalancing(
        &self,
        plan: BalancePlan,
    ) -> std::result::Result<ExecutedPass, RebalanceAborted> {
        let needed = plan.rebalance_needed();
        let executed = plan
            .execute(
                &self.transfer,
                &self.classifier,
                self.policy.prefer_undelivered,
            )
            .await?;

        if needed {
            self.rebalance_required.store(false, Ordering::Release);
        }
        Ok(executed)
    }

    /// One pass: check the balance, then rebalance if required.
    pub async fn run_pass(&self) -> std::result::Result<PassOutcome, PassError> {
        let plan = self.determine_balanced_status().await?;
        if !plan.rebalance_needed() {
            return Ok(PassOutcome::Balanced(plan));
        }

        let executed = self.perform_rebalancing(plan).await?;
        Ok(PassOutcome::Rebalanced(executed))
    }
}

fn validate_queue_names(queue_names: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(queue_names.len());
    for name in queue_names {
        if name.trim().is_empty() {
            return Err(BalancerError::InvalidConfig(
                "queue names must not be empty".to_string(),
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(BalancerError::InvalidConfig(format!(
                "queue {name} is listed more than once"
            )));
        }
    }
    Ok(())
}
