//! Checker configuration.

use serde::{Deserialize, Serialize};
use xstock_common::validation::collect_errors;
use xstock_common::{Validate, ValidationError, ValidationResult};

use super::policy::VerdictPolicy;
use crate::fund::filter::zero_as_none;
use crate::fund::ParamFundListFilter;

// ============================================================================
// Stock Checker Options
// ============================================================================

/// Per-stock thresholds applied to each holding's fundamentals.
///
/// `None` disables a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockCheckerOptions {
    /// Minimum return on equity (%), hard
    #[serde(default = "default_min_roe")]
    pub min_roe: Option<f64>,

    /// Maximum debt to asset ratio (%), hard
    #[serde(default = "default_max_debt_asset_ratio")]
    pub max_debt_asset_ratio: Option<f64>,

    /// Minimum total market cap (亿), hard
    #[serde(default = "default_min_total_market_cap")]
    pub min_total_market_cap: Option<f64>,

    /// Net profit must be positive, hard
    #[serde(default = "default_require_profit")]
    pub require_profit: bool,

    /// Maximum trailing PE, soft
    #[serde(default = "default_max_pe_ttm")]
    pub max_pe_ttm: Option<f64>,

    /// Minimum gross margin (%), soft
    #[serde(default = "default_min_gross_margin")]
    pub min_gross_margin: Option<f64>,

    /// Minimum net profit growth (%), soft
    #[serde(default)]
    pub min_net_profit_growth: Option<f64>,
}

impl Default for StockCheckerOptions {
    fn default() -> Self {
        Self {
            min_roe: default_min_roe(),
            max_debt_asset_ratio: default_max_debt_asset_ratio(),
            min_total_market_cap: default_min_total_market_cap(),
            require_profit: default_require_profit(),
            max_pe_ttm: default_max_pe_ttm(),
            min_gross_margin: default_min_gross_margin(),
            min_net_profit_growth: None,
        }
    }
}

fn default_min_roe() -> Option<f64> {
    Some(8.0)
}
fn default_max_debt_asset_ratio() -> Option<f64> {
    Some(60.0)
}
fn default_min_total_market_cap() -> Option<f64> {
    Some(100.0)
}
fn default_require_profit() -> bool {
    true
}
fn default_max_pe_ttm() -> Option<f64> {
    Some(60.0)
}
fn default_min_gross_margin() -> Option<f64> {
    Some(15.0)
}

impl Validate for StockCheckerOptions {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        let bounds = [
            ("min_roe", self.min_roe),
            ("max_debt_asset_ratio", self.max_debt_asset_ratio),
            ("min_total_market_cap", self.min_total_market_cap),
            ("max_pe_ttm", self.max_pe_ttm),
            ("min_gross_margin", self.min_gross_margin),
        ];
        for (field, value) in bounds {
            if let Some(v) = value {
                if !v.is_finite() {
                    errors.push(ValidationError::InvalidValue {
                        field: format!("stock_checker_options.{}", field),
                        reason: "must be a finite number".into(),
                    });
                }
            }
        }
        if matches!(self.max_debt_asset_ratio, Some(v) if !(0.0..=100.0).contains(&v)) {
            errors.push(ValidationError::InvalidValue {
                field: "stock_checker_options.max_debt_asset_ratio".into(),
                reason: "must be between 0 and 100".into(),
            });
        }
        collect_errors(errors)
    }
}

// ============================================================================
// Checker Options
// ============================================================================

/// Thresholds for checking funds.
///
/// The fund-level criteria are the filter criteria plus the risk bounds;
/// `check_stocks` turns on the holdings check. Requests bind on top of
/// [`CheckerOptions::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CheckerOptionsParams")]
pub struct CheckerOptions {
    #[serde(flatten)]
    pub criteria: ParamFundListFilter,

    /// Run the deep holdings check
    pub check_stocks: bool,

    pub stock_checker_options: StockCheckerOptions,

    /// How per-stock outcomes become a fund verdict
    pub verdict_policy: VerdictPolicy,
}

/// Request form of [`CheckerOptions`].
///
/// The flattened criteria default to the filter-page values, which leave
/// the risk bounds unset; the risk bounds are bound here with their own
/// defaults.
#[derive(Deserialize)]
struct CheckerOptionsParams {
    #[serde(flatten)]
    criteria: ParamFundListFilter,
    #[serde(default = "default_max_stddev", deserialize_with = "zero_as_none")]
    max_135_avg_stddev: Option<f64>,
    #[serde(default = "default_min_sharp", deserialize_with = "zero_as_none")]
    min_135_avg_sharp: Option<f64>,
    #[serde(default = "default_max_retr", deserialize_with = "zero_as_none")]
    max_135_avg_retr: Option<f64>,
    #[serde(default)]
    check_stocks: bool,
    #[serde(default)]
    stock_checker_options: StockCheckerOptions,
    #[serde(default)]
    verdict_policy: VerdictPolicy,
}

fn default_max_stddev() -> Option<f64> {
    Some(25.0)
}
fn default_min_sharp() -> Option<f64> {
    Some(1.0)
}
fn default_max_retr() -> Option<f64> {
    Some(25.0)
}

impl From<CheckerOptionsParams> for CheckerOptions {
    fn from(params: CheckerOptionsParams) -> Self {
        Self {
            criteria: ParamFundListFilter {
                max_135_avg_stddev: params.max_135_avg_stddev,
                min_135_avg_sharp: params.min_135_avg_sharp,
                max_135_avg_retr: params.max_135_avg_retr,
                ..params.criteria
            },
            check_stocks: params.check_stocks,
            stock_checker_options: params.stock_checker_options,
            verdict_policy: params.verdict_policy,
        }
    }
}

/// Name used by the fund check flow.
pub type FundCheckOptions = CheckerOptions;

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            criteria: ParamFundListFilter {
                max_135_avg_stddev: default_max_stddev(),
                min_135_avg_sharp: default_min_sharp(),
                max_135_avg_retr: default_max_retr(),
                ..ParamFundListFilter::default()
            },
            check_stocks: false,
            stock_checker_options: StockCheckerOptions::default(),
            verdict_policy: VerdictPolicy::default(),
        }
    }
}

impl CheckerOptions {
    /// The fund-level criteria as a filter.
    pub fn fund_filter(&self) -> &ParamFundListFilter {
        &self.criteria
    }
}

impl Validate for CheckerOptions {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();
        if let Err(e) = self.criteria.validate() {
            errors.push(e);
        }
        if let Err(e) = self.stock_checker_options.validate() {
            errors.push(e);
        }
        if let Err(e) = self.verdict_policy.validate() {
            errors.push(e);
        }
        collect_errors(errors)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checker_defaults() {
        let opts = CheckerOptions::default();
        assert_eq!(opts.criteria.min_scale, Some(2.0));
        assert_eq!(opts.criteria.max_135_avg_stddev, Some(25.0));
        assert_eq!(opts.criteria.min_135_avg_sharp, Some(1.0));
        assert_eq!(opts.criteria.max_135_avg_retr, Some(25.0));
        assert!(!opts.check_stocks);
        assert_eq!(opts.verdict_policy, VerdictPolicy::AnyHardViolation);
        assert_eq!(opts.fund_filter().active().count(), 11);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_deserialize_flat_request() {
        let opts: CheckerOptions = serde_json::from_str(
            r#"{"min_scale": 0, "max_scale": 30, "check_stocks": true,
                "stock_checker_options": {"min_roe": 12.0}}"#,
        )
        .unwrap();
        assert_eq!(opts.criteria.min_scale, None);
        assert_eq!(opts.criteria.max_scale, Some(30.0));
        assert!(opts.check_stocks);
        assert_eq!(opts.stock_checker_options.min_roe, Some(12.0));
        assert_eq!(opts.stock_checker_options.max_debt_asset_ratio, Some(60.0));
    }

    #[test]
    fn test_empty_request_binds_defaults() {
        let opts: CheckerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, CheckerOptions::default());
        assert_eq!(opts.fund_filter().active().count(), 11);
    }

    #[test]
    fn test_zero_risk_bound_is_dropped() {
        let opts: CheckerOptions =
            serde_json::from_str(r#"{"max_135_avg_stddev": 0, "min_135_avg_sharp": 1.5}"#).unwrap();
        assert_eq!(opts.criteria.max_135_avg_stddev, None);
        assert_eq!(opts.criteria.min_135_avg_sharp, Some(1.5));
        assert_eq!(opts.criteria.max_135_avg_retr, Some(25.0));
        assert_eq!(opts.criteria.year_1_rank_ratio, Some(25.0));
    }

    #[test]
    fn test_stock_options_validation() {
        let opts = StockCheckerOptions {
            max_debt_asset_ratio: Some(150.0),
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}
