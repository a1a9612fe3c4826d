//! Unit Tests for the Move Orchestrator
//!
//! Executes plans against the in-memory broker and checks move accounting,
//! abandonment of drained or raced queues and the abort path with partial progress.

use super::*;
use crate::config::BalancerPolicy;
use crate::memory::MemoryBroker;
use crate::planner::plan;

fn broker_with(layout: &[(&str, u64)]) -> MemoryBroker {
    let broker = MemoryBroker::new();
    for (name, depth) in layout {
        broker.add_queue(name, Some(1));
        broker.publish(name, *depth);
    }
    broker
}

fn planned(layout: &[(&str, u64)]) -> Vec<MonitoredQueue> {
    let mut queues: Vec<MonitoredQueue> = layout
        .iter()
        .map(|(name, depth)| MonitoredQueue::observed(*name, *depth, true))
        .collect();
    plan(&mut queues, &BalancerPolicy::default());
    queues
}

fn consumed_error() -> ProviderError {
    ProviderError::Other {
        status: "NOT_FOUND".to_string(),
        code: Some(6),
        description: "Source Message Not Found".to_string(),
    }
}

/// **Test:** Full Rebalance of Two Queues
///
/// **Expectation:** 100/0 converges to 50/50 through 50 single moves, every target
/// delta ends at zero and progress reports 100%.
#[tokio::test]
async fn test_two_queues_converge() {
    let broker = broker_with(&[("a", 100), ("b", 0)]);
    let mut queues = planned(&[("a", 100), ("b", 0)]);

    let report = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap();

    assert_eq!(report.completed_moves, 50);
    assert_eq!(report.planned_moves, 50);
    assert_eq!(report.progress_percent(), 100);
    assert_eq!(report.outcome, Outcome::Completed);
    assert!(report.abandoned_queues.is_empty());
    assert!(queues.iter().all(|q| q.target_delta() == 0));
    assert_eq!(broker.depth("a"), Some(50));
    assert_eq!(broker.depth("b"), Some(50));
}

/// **Test:** Message Consumed Mid-Move
///
/// **Reason:** Consumers keep running during a rebalance; a vanished message is expected.
///
/// **Expectation:** The first reducing queue is abandoned without any move, the second
/// one still moves its full share.
#[tokio::test]
async fn test_consumed_message_abandons_source_only() {
    let broker = broker_with(&[("a", 30), ("b", 30), ("c", 0)]);
    let mut queues = planned(&[("a", 30), ("b", 30), ("c", 0)]);
    broker.fail_next_move(consumed_error());

    let report = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap();

    assert_eq!(report.planned_moves, 20);
    assert_eq!(report.completed_moves, 10);
    assert_eq!(report.abandoned_queues, vec!["a".to_string()]);
    assert_eq!(queues[0].target_delta(), 0);
    assert_eq!(queues[1].target_delta(), 0);
    assert_eq!(queues[2].target_delta(), 10);
    assert_eq!(broker.depth("a"), Some(30));
    assert_eq!(broker.depth("b"), Some(20));
    assert_eq!(broker.depth("c"), Some(10));
}

/// **Test:** Unauthorized on the First Move
///
/// **Expectation:** The execution aborts immediately with 0 completed moves and 0% progress.
#[tokio::test]
async fn test_unauthorized_aborts_immediately() {
    let broker = broker_with(&[("a", 100), ("b", 0)]);
    let mut queues = planned(&[("a", 100), ("b", 0)]);
    broker.fail_next_move(ProviderError::Unauthorized {
        description: "Unauthorized".to_string(),
    });

    let aborted = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap_err();

    assert_eq!(aborted.completed, 0);
    assert_eq!(aborted.planned, 50);
    assert_eq!(aborted.progress, 0);
    assert!(aborted.source.is_unauthorized());
    assert_eq!(broker.depth("a"), Some(100));
    assert_eq!(broker.moves_completed(), 0);
}

/// **Test:** Fatal Failure After Partial Progress
///
/// **Expectation:** Five of twenty planned moves complete before an unknown broker error,
/// the abort reports 25% and no further move is attempted.
#[tokio::test]
async fn test_fatal_error_reports_partial_progress() {
    let broker = broker_with(&[("a", 40), ("b", 0)]);
    let mut queues = planned(&[("a", 40), ("b", 0)]);
    broker.fail_move_attempt(
        5,
        ProviderError::Other {
            status: "INTERNAL_ERROR".to_string(),
            code: Some(11),
            description: "Message spool quota exceeded".to_string(),
        },
    );

    let aborted = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap_err();

    assert_eq!(aborted.completed, 5);
    assert_eq!(aborted.planned, 20);
    assert_eq!(aborted.progress, 25);
    assert_eq!(broker.moves_completed(), 5);
    assert_eq!(broker.depth("b"), Some(5));
}

/// **Test:** Selection Failure After Partial Progress
///
/// **Reason:** Only a missing queue makes a selection failure recoverable; any other
/// broker error while picking a message must stop the execution.
///
/// **Expectation:** The sixth selection fails, five moves are kept and the abort reports 25%.
#[tokio::test]
async fn test_selection_failure_aborts_with_progress() {
    let broker = broker_with(&[("a", 40), ("b", 0)]);
    let mut queues = planned(&[("a", 40), ("b", 0)]);
    broker.fail_select_attempt(
        5,
        ProviderError::Other {
            status: "INTERNAL_ERROR".to_string(),
            code: Some(11),
            description: "Service unavailable".to_string(),
        },
    );

    let aborted = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap_err();

    assert_eq!(aborted.completed, 5);
    assert_eq!(aborted.planned, 20);
    assert_eq!(aborted.progress, 25);
    assert!(matches!(
        aborted.source,
        BalancerError::Fatal {
            operation: Operation::SelectMessage,
            ref queue,
            ..
        } if queue == "a"
    ));
    assert_eq!(broker.moves_completed(), 5);
    assert_eq!(broker.depth("a"), Some(35));
}

/// **Test:** Source Drained Before Execution
///
/// **Reason:** The plan is computed from a snapshot; consumers may empty the queue first.
///
/// **Expectation:** Moves stop when no candidate message is left and the queue is abandoned.
#[tokio::test]
async fn test_drained_source_is_abandoned() {
    let broker = broker_with(&[("a", 30), ("b", 0)]);
    let mut queues = planned(&[("a", 30), ("b", 0)]);
    broker.consume("a", 20);

    let report = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap();

    assert_eq!(report.planned_moves, 15);
    assert_eq!(report.completed_moves, 10);
    assert_eq!(report.abandoned_queues, vec!["a".to_string()]);
    assert_eq!(queues[0].target_delta(), 0);
    assert_eq!(broker.depth("a"), Some(0));
}

/// **Test:** Source Queue Deleted Before Execution
///
/// **Expectation:** A selection answered with "not found" abandons the queue instead of aborting.
#[tokio::test]
async fn test_missing_source_queue_is_abandoned() {
    let broker = broker_with(&[("b", 0)]);
    let mut ghost = MonitoredQueue::observed("ghost", 3, true);
    ghost.set_target_delta(-3);
    let mut receiver = MonitoredQueue::observed("b", 0, true);
    receiver.set_target_delta(3);
    let mut queues = vec![ghost, receiver];

    let report = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap();

    assert_eq!(report.completed_moves, 0);
    assert_eq!(report.abandoned_queues, vec!["ghost".to_string()]);
}

/// **Test:** No Receiving Capacity Left
///
/// **Reason:** When the positive targets do not cover the negative ones the reducing queue
/// would otherwise wait for room forever.
///
/// **Expectation:** After filling the only receiver the reducing queue is abandoned.
#[tokio::test]
async fn test_reducing_queue_without_receivers_terminates() {
    let broker = broker_with(&[("a", 10), ("b", 0)]);
    let mut giver = MonitoredQueue::observed("a", 10, true);
    giver.set_target_delta(-10);
    let mut receiver = MonitoredQueue::observed("b", 0, true);
    receiver.set_target_delta(4);
    let mut queues = vec![giver, receiver];

    let report = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap();

    assert_eq!(report.completed_moves, 4);
    assert_eq!(report.planned_moves, 10);
    assert_eq!(report.progress_percent(), 40);
    assert_eq!(report.abandoned_queues, vec!["a".to_string()]);
    assert_eq!(broker.depth("b"), Some(4));
}

/// **Test:** Undelivered Messages Move First
///
/// **Reason:** Messages already handed to a consumer risk being processed twice if moved.
///
/// **Expectation:** With the preference on, the delivered messages stay behind; with it off,
/// the oldest (delivered) ones move.
#[tokio::test]
async fn test_undelivered_messages_preferred() {
    let broker = broker_with(&[("a", 4), ("b", 0)]);
    broker.mark_delivered("a", 2);
    let mut queues = planned(&[("a", 4), ("b", 0)]);

    execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap();
    assert!(broker.messages("a").iter().all(|m| !m.undelivered));

    let broker = broker_with(&[("a", 4), ("b", 0)]);
    broker.mark_delivered("a", 2);
    let mut queues = planned(&[("a", 4), ("b", 0)]);

    execute(&mut queues, &broker, &ErrorClassifier::default(), false)
        .await
        .unwrap();
    assert!(broker.messages("a").iter().all(|m| m.undelivered));
}

/// **Test:** Unbound Queue Drained Across Receivers
///
/// **Expectation:** The unbound queue empties completely and the two bound receivers
/// end up level.
#[tokio::test]
async fn test_unbound_queue_drained() {
    let broker = broker_with(&[("idle", 10), ("b", 50), ("c", 10)]);
    broker.set_bound_clients("idle", Some(0));

    let mut queues = vec![
        MonitoredQueue::observed("idle", 10, false),
        MonitoredQueue::observed("b", 50, true),
        MonitoredQueue::observed("c", 10, true),
    ];
    plan(&mut queues, &BalancerPolicy::default());

    let report = execute(&mut queues, &broker, &ErrorClassifier::default(), true)
        .await
        .unwrap();

    assert_eq!(report.completed_moves, 25);
    assert_eq!(broker.depth("idle"), Some(0));
    assert_eq!(broker.depth("b"), Some(35));
    assert_eq!(broker.depth("c"), Some(35));
    assert!(queues.iter().all(|q| q.target_delta() == 0));
}

#[test]
fn test_progress_percent() {
    assert_eq!(progress_percent(0, 50), 0);
    assert_eq!(progress_percent(1, 3), 33);
    assert_eq!(progress_percent(3, 3), 100);
    assert_eq!(progress_percent(0, 0), 100);
}
