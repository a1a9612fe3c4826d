use serde::{Deserialize, Serialize};

use crate::errors::{BalancerError, Result};

/// Queues within this percentage of the fair share are close enough to leave alone.
pub const DEFAULT_TOLERANCE_PERCENT: f64 = 10.0;

/// Balancing policy
/// Controls when a queue counts as imbalanced and how candidates are picked
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BalancerPolicy {
    /// Deviation from the fair share, in percent, a bound queue must exceed to be flagged
    pub tolerance_percent: f64,
    /// Ignore deviations no larger than the division remainder (a residual of an earlier pass)
    pub remainder_guard: bool,
    /// Prefer messages never dispatched to a consumer when picking what to move
    pub prefer_undelivered: bool,
    /// Broker error codes meaning the message was consumed during the move
    pub consumed_error_codes: Vec<i64>,
}

impl Default for BalancerPolicy {
    fn default() -> Self {
        Self {
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            remainder_guard: true,
            prefer_undelivered: true,
            consumed_error_codes: vec![],
        }
    }
}

impl BalancerPolicy {
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_percent.is_finite() || self.tolerance_percent < 0.0 {
            return Err(BalancerError::InvalidConfig(format!(
                "tolerance_percent must be a non-negative number, got {}",
                self.tolerance_percent
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balancer_policy_defaults() {
        let policy = BalancerPolicy::default();
        assert_eq!(policy.tolerance_percent, 10.0);
        assert!(policy.remainder_guard);
        assert!(policy.prefer_undelivered);
        assert!(policy.consumed_error_codes.is_empty());
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_partial_policy_fills_defaults() {
        let policy: BalancerPolicy =
            serde_json::from_str(r#"{"tolerance_percent": 25.0}"#).unwrap();
        assert_eq!(policy.tolerance_percent, 25.0);
        assert!(policy.remainder_guard);
        assert!(policy.prefer_undelivered);
    }

    #[test]
    fn test_invalid_tolerance_rejected() {
        let negative = BalancerPolicy {
            tolerance_percent: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(BalancerError::InvalidConfig(_))
        ));

        let nan = BalancerPolicy {
            tolerance_percent: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());
    }
}
