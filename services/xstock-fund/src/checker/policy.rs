//! Aggregation of per-stock outcomes into a fund verdict.
//!
//! Holdings whose fundamentals could not be fetched are never counted as
//! failing; they show up in the result as unchecked.

use serde::{Deserialize, Serialize};
use xstock_common::{Validate, ValidationError, ValidationResult};

use super::stock::StockCheckOutcome;

/// Fund verdict policy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerdictPolicy {
    /// Any holding with a hard violation fails the fund
    #[default]
    AnyHardViolation,
    /// Only the `top_n` heaviest holdings are considered
    TopHoldings { top_n: usize },
    /// Fails when failing holdings weigh more than `max_failed_weight` (%)
    WeightedThreshold { max_failed_weight: f64 },
}

/// Fund-level verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    /// Summed weight of holdings with hard violations (%)
    pub failed_weight: f64,
    /// Codes of the holdings that decided a failing verdict
    pub failing_stocks: Vec<String>,
}

impl VerdictPolicy {
    /// Decide the fund verdict. `outcomes` must be ordered heaviest first.
    pub fn verdict(&self, outcomes: &[StockCheckOutcome]) -> Verdict {
        let considered: &[StockCheckOutcome] = match self {
            Self::TopHoldings { top_n } => &outcomes[..(*top_n).min(outcomes.len())],
            _ => outcomes,
        };

        let failing: Vec<&StockCheckOutcome> = considered
            .iter()
            .filter(|o| o.has_hard_violation())
            .collect();
        let failed_weight: f64 = failing.iter().map(|o| o.weight).sum();

        let passed = match self {
            Self::AnyHardViolation | Self::TopHoldings { .. } => failing.is_empty(),
            Self::WeightedThreshold { max_failed_weight } => failed_weight <= *max_failed_weight,
        };

        Verdict {
            passed,
            failed_weight,
            failing_stocks: if passed {
                Vec::new()
            } else {
                failing.iter().map(|o| o.code.clone()).collect()
            },
        }
    }
}

impl Validate for VerdictPolicy {
    fn validate(&self) -> ValidationResult<()> {
        match self {
            Self::TopHoldings { top_n: 0 } => Err(ValidationError::InvalidValue {
                field: "verdict_policy.top_n".into(),
                reason: "must be greater than zero".into(),
            }),
            Self::WeightedThreshold { max_failed_weight }
                if !max_failed_weight.is_finite() || *max_failed_weight < 0.0 =>
            {
                Err(ValidationError::InvalidValue {
                    field: "verdict_policy.max_failed_weight".into(),
                    reason: "must be a non-negative number".into(),
                })
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
