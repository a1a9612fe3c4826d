use serde::Serialize;
use tracing::{debug, info};

use crate::config::BalancerPolicy;
use crate::queue::MonitoredQueue;

/// Figures of one planning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Messages across all monitored queues
    pub total_msgs: u64,
    /// Queues with at least one consumer bound
    pub ready_queues: u64,
    /// Fair share per bound queue, truncated
    pub average_target: u64,
    /// `total_msgs mod ready_queues`
    pub remainder: u64,
    /// Queue that took the remainder on top of its own target
    pub remainder_recipient: Option<String>,
    /// At least one queue is flagged for rebalancing
    pub rebalance_needed: bool,
}

/// Computes the target delta and rebalance flag of every queue in place.
///
/// ## Algorithm:
/// 1. Sum all depths and count bound queues; with no messages or no bound queue there is nothing to do
/// 2. Fair share = total / bound queues (truncated), remainder = total mod bound queues
/// 3. Unbound queues are scheduled for a full drain and take no part in the average
/// 4. Bound queues get `average - depth`; they are flagged when the deviation exceeds
///    the tolerance and is larger than the remaining remainder
/// 5. The first bound queue with a positive target takes the remainder
///
/// ## Returns:
/// `PlanSummary` whose `rebalance_needed` is true iff at least one queue was flagged
pub fn plan(queues: &mut [MonitoredQueue], policy: &BalancerPolicy) -> PlanSummary {
    for queue in queues.iter_mut() {
        queue.reset_plan();
    }

    let total_msgs: u64 = queues.iter().map(MonitoredQueue::observed_depth).sum();
    let ready_queues = queues.iter().filter(|q| q.clients_bound()).count() as u64;

    info!(total_msgs, ready_queues, "planning queue balance");

    let mut summary = PlanSummary {
        total_msgs,
        ready_queues,
        average_target: 0,
        remainder: 0,
        remainder_recipient: None,
        rebalance_needed: false,
    };

    if total_msgs == 0 || ready_queues == 0 {
        info!("no messages or no bound queues, nothing to balance");
        return summary;
    }

    let average_target = total_msgs / ready_queues;
    let mut remainder = total_msgs % ready_queues;
    summary.average_target = average_target;
    summary.remainder = remainder;

    info!(average_target, remainder, "fair share per bound queue");

    for queue in queues.iter_mut() {
        if !queue.clients_bound() {
            queue.set_target_delta(-to_signed(queue.observed_depth()));
            info!(
                queue = %queue.name(),
                target_delta = queue.target_delta(),
                "unbound queue scheduled for full drain"
            );
            continue;
        }

        let diff = to_signed(average_target) - to_signed(queue.observed_depth());
        queue.set_target_delta(diff);

        if exceeds_tolerance(diff, average_target, remainder, policy) {
            queue.flag_for_rebalance();
        }

        if remainder > 0 && queue.target_delta() > 0 {
            info!(queue = %queue.name(), remainder, "allocating the remainder");
            queue.set_target_delta(queue.target_delta() + to_signed(remainder));
            summary.remainder_recipient = Some(queue.name().to_string());
            remainder = 0;
        }

        debug!(
            queue = %queue.name(),
            target_delta = queue.target_delta(),
            flagged = queue.rebalance_flag(),
            "depth change target set"
        );
    }

    summary.rebalance_needed = queues.iter().any(MonitoredQueue::rebalance_flag);
    summary
}

/// Whether a bound queue's deviation from the fair share warrants moving messages.
///
/// The remainder guard compares the magnitude of the deviation, so an overloaded
/// queue is flagged just like an underloaded one; a signed comparison would never
/// flag a queue above its fair share.
pub(crate) fn exceeds_tolerance(
    diff: i64,
    average_target: u64,
    remainder: u64,
    policy: &BalancerPolicy,
) -> bool {
    if diff == 0 {
        return false;
    }

    // a zero fair share makes any non-zero deviation infinitely large
    let diff_percent = if average_target == 0 {
        f64::INFINITY
    } else {
        diff as f64 / average_target as f64 * 100.0
    };

    let outside_tolerance = diff_percent.abs() > policy.tolerance_percent;
    let beyond_remainder = !policy.remainder_guard || diff.unsigned_abs() > remainder;

    outside_tolerance && beyond_remainder
}

fn to_signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// Tests for the planner are in planner_test.rs
#[cfg(test)]
#[path = "planner_test.rs"]
mod tests;
