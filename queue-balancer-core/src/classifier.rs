use crate::config::BalancerPolicy;
use crate::errors::{Operation, ProviderError};

/// Description fragments the broker uses when the message to move is already gone.
///
/// The first comes back from the copy when the source message was consumed,
/// the second from the delete when the message went away after it was copied.
pub const CONSUMED_MESSAGE_DESCRIPTIONS: [&str; 2] =
    ["Source Message Not Found", "Could not find match for msg"];

/// How a pass reacts to a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Log and continue, the queue is left out of this pass
    RecoverableSkip,
    /// The message vanished mid-move, abandon this source queue only
    RecoverableConsumed,
    /// Abort the pass
    Fatal,
}

#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    consumed_codes: Vec<i64>,
}

impl ErrorClassifier {
    /// `consumed_codes` are checked before the description fragments.
    pub fn new(consumed_codes: Vec<i64>) -> Self {
        Self { consumed_codes }
    }

    pub fn from_policy(policy: &BalancerPolicy) -> Self {
        Self::new(policy.consumed_error_codes.clone())
    }

    pub fn classify(&self, operation: Operation, error: &ProviderError) -> Classification {
        match (operation, error) {
            (_, ProviderError::Unauthorized { .. }) => Classification::Fatal,
            (Operation::QueueStatus | Operation::SelectMessage, ProviderError::NotFound { .. }) => {
                Classification::RecoverableSkip
            }
            (Operation::MoveMessage, error) if self.is_consumed(error) => {
                Classification::RecoverableConsumed
            }
            _ => Classification::Fatal,
        }
    }

    fn is_consumed(&self, error: &ProviderError) -> bool {
        if !matches!(
            error,
            ProviderError::NotFound { .. } | ProviderError::Other { .. }
        ) {
            return false;
        }

        if let Some(code) = error.code() {
            if self.consumed_codes.contains(&code) {
                return true;
            }
        }

        let description = error.description();
        CONSUMED_MESSAGE_DESCRIPTIONS
            .iter()
            .any(|fragment| description.contains(fragment))
    }
}
