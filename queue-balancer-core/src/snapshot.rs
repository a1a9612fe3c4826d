use tracing::{error, info, warn};

use crate::classifier::{Classification, ErrorClassifier};
use crate::errors::{BalancerError, Operation, ProviderError, Result};
use crate::provider::TelemetryProvider;
use crate::queue::MonitoredQueue;

/// Reads depth and bind state of every monitored queue, in configured order.
///
/// A queue the broker does not know keeps depth 0 and counts as unbound, which
/// leaves it out of the arithmetic for this pass. Any fatal failure aborts the snapshot.
pub async fn collect_snapshot<T>(
    telemetry: &T,
    queue_names: &[String],
    classifier: &ErrorClassifier,
) -> Result<Vec<MonitoredQueue>>
where
    T: TelemetryProvider + ?Sized,
{
    let mut queues = Vec::with_capacity(queue_names.len());

    for name in queue_names {
        let mut queue = MonitoredQueue::new(name.clone());

        match telemetry.queue_status(name).await {
            Ok(status) => {
                queue.observe(status.depth, status.clients_bound());
                info!(
                    queue = %name,
                    depth = status.depth,
                    clients_bound = queue.clients_bound(),
                    "queue status collected"
                );
            }
            Err(e) => match classifier.classify(Operation::QueueStatus, &e) {
                Classification::Fatal => {
                    if let ProviderError::Unauthorized { .. } = e {
                        error!(queue = %name, "authorization failed with the provided credentials");
                    } else {
                        error!(queue = %name, error = %e, "unable to read queue status");
                    }
                    return Err(BalancerError::Fatal {
                        operation: Operation::QueueStatus,
                        queue: name.clone(),
                        source: e,
                    });
                }
                _ => {
                    warn!(
                        queue = %name,
                        error = %e,
                        "queue not configured on the broker, ignored for this pass"
                    );
                }
            },
        }

        queues.push(queue);
    }

    Ok(queues)
}
