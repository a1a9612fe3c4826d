use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::classifier::{Classification, ErrorClassifier};
use crate::errors::{BalancerError, Operation, ProviderError, RebalanceAborted};
use crate::provider::MessageTransfer;
use crate::queue::{MonitoredQueue, MoveOperation};

/// How an execution finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The plan did not require rebalancing
    NothingToMove,
    /// Every reducing queue reached zero, through moves or by being abandoned
    Completed,
}

/// Result of executing one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebalanceReport {
    pub completed_moves: u64,
    /// Sum of the reducing queues' target magnitudes at the start of execution
    pub planned_moves: u64,
    /// Reducing queues given up on before reaching their target
    pub abandoned_queues: Vec<String>,
    pub outcome: Outcome,
}

impl RebalanceReport {
    pub fn nothing_to_move() -> Self {
        Self {
            completed_moves: 0,
            planned_moves: 0,
            abandoned_queues: vec![],
            outcome: Outcome::NothingToMove,
        }
    }

    pub fn progress_percent(&self) -> u64 {
        progress_percent(self.completed_moves, self.planned_moves)
    }
}

/// Completed moves as a truncated percentage of the planned ones; 100 when nothing was planned.
pub fn progress_percent(completed: u64, planned: u64) -> u64 {
    if planned == 0 {
        return 100;
    }
    completed.saturating_mul(100) / planned
}

/// Executes the planned moves, one message at a time.
///
/// ## Algorithm:
/// Queues with a negative target are reducing, all others increasing. For each reducing
/// queue, walk the increasing queues and move single messages while the reducing queue
/// still has to give and the increasing queue still has room:
/// 1. Ask for a candidate message from the reducing queue
/// 2. No candidate → the queue drained on its own, abandon it
/// 3. Move it; on success both targets step one closer to zero
/// 4. Message consumed during the move → abandon the reducing queue, go on with the next one
/// 5. Anything else → abort the whole execution
///
/// A reducing queue still short of its target once every increasing queue is full is abandoned.
///
/// ## Returns:
/// `RebalanceReport` on completion, `RebalanceAborted` with the partial progress otherwise
pub async fn execute<M>(
    queues: &mut [MonitoredQueue],
    transfer: &M,
    classifier: &ErrorClassifier,
    prefer_undelivered: bool,
) -> Result<RebalanceReport, RebalanceAborted>
where
    M: MessageTransfer + ?Sized,
{
    let reducing: Vec<usize> = (0..queues.len())
        .filter(|&i| queues[i].is_reducing())
        .collect();
    let increasing: Vec<usize> = (0..queues.len())
        .filter(|&i| !queues[i].is_reducing())
        .collect();

    let planned_moves: u64 = reducing
        .iter()
        .map(|&i| queues[i].target_delta().unsigned_abs())
        .sum();

    info!(
        reducing_queues = reducing.len(),
        increasing_queues = increasing.len(),
        planned_moves,
        "rebalance operation started"
    );

    let mut completed_moves: u64 = 0;
    let mut abandoned_queues = Vec::new();

    for &r in &reducing {
        let source = queues[r].name().to_string();

        'receivers: for &i in &increasing {
            while queues[r].target_delta() < 0 && queues[i].target_delta() > 0 {
                let candidate = match transfer.select_message(&source, prefer_undelivered).await {
                    Ok(candidate) => candidate,
                    Err(e) => match classifier.classify(Operation::SelectMessage, &e) {
                        Classification::Fatal => {
                            error!(queue = %source, error = %e, "unable to select a message to move");
                            return Err(abort(
                                completed_moves,
                                planned_moves,
                                Operation::SelectMessage,
                                &source,
                                e,
                            ));
                        }
                        _ => {
                            warn!(queue = %source, error = %e, "message selection failed");
                            None
                        }
                    },
                };

                let Some(message) = candidate else {
                    info!(
                        queue = %source,
                        "no message available to move (queue now empty?), abandoning queue"
                    );
                    queues[r].abandon();
                    abandoned_queues.push(source.clone());
                    break 'receivers;
                };

                let operation = MoveOperation::new(message, &source, queues[i].name());

                match transfer.move_message(&operation).await {
                    Ok(()) => {
                        queues[r].record_move();
                        queues[i].record_move();
                        completed_moves += 1;
                        debug!(
                            moved = completed_moves,
                            transfer_id = %operation.transfer_id,
                            from = %operation.source_queue,
                            to = %operation.target_queue,
                            "message moved"
                        );
                    }
                    Err(e) => match classifier.classify(Operation::MoveMessage, &e) {
                        Classification::Fatal => {
                            error!(
                                transfer_id = %operation.transfer_id,
                                from = %operation.source_queue,
                                to = %operation.target_queue,
                                error = %e,
                                "message move failed"
                            );
                            return Err(abort(
                                completed_moves,
                                planned_moves,
                                Operation::MoveMessage,
                                &source,
                                e,
                            ));
                        }
                        _ => {
                            info!(
                                transfer_id = %operation.transfer_id,
                                from = %operation.source_queue,
                                to = %operation.target_queue,
                                reason = %e,
                                "message already consumed or removed, abandoning queue"
                            );
                            queues[r].abandon();
                            abandoned_queues.push(source.clone());
                            break 'receivers;
                        }
                    },
                }
            }
        }

        if queues[r].target_delta() < 0 {
            warn!(
                queue = %source,
                remaining = queues[r].target_delta().unsigned_abs(),
                "no receiving queue has room left, abandoning queue"
            );
            queues[r].abandon();
            abandoned_queues.push(source);
        }
    }

    let report = RebalanceReport {
        completed_moves,
        planned_moves,
        abandoned_queues,
        outcome: Outcome::Completed,
    };

    info!(
        completed_moves,
        planned_moves,
        progress_percent = report.progress_percent(),
        "rebalance operation completed successfully"
    );

    Ok(report)
}

fn abort(
    completed: u64,
    planned: u64,
    operation: Operation,
    queue: &str,
    source: ProviderError,
) -> RebalanceAborted {
    let aborted = RebalanceAborted::new(
        completed,
        planned,
        BalancerError::Fatal {
            operation,
            queue: queue.to_string(),
            source,
        },
    );
    error!(
        completed_moves = completed,
        planned_moves = planned,
        progress_percent = aborted.progress,
        "aborting this rebalance operation"
    );
    aborted
}

// Tests for the orchestrator are in orchestrator_test.rs
#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
