//! Stock-level checks on fund holdings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::options::StockCheckerOptions;
use crate::data::{with_timeout, MarketDataProvider, ProviderError, StockFundamentals};
use crate::fund::StockHolding;

/// How serious a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Disqualifies the holding
    Hard,
    /// Reported only
    Soft,
}

/// One threshold a stock did not meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub stock_code: String,
    /// Metric name (roe, debt_asset_ratio, ...)
    pub metric: String,
    pub actual: f64,
    pub bound: f64,
    pub severity: Severity,
}

impl Violation {
    pub fn is_hard(&self) -> bool {
        self.severity == Severity::Hard
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}={:.2} (bound {:.2}, {:?})",
            self.stock_code, self.metric, self.actual, self.bound, self.severity
        )
    }
}

/// Result of checking one holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockCheckOutcome {
    pub code: String,
    pub name: String,
    /// Position weight in the fund (%)
    pub weight: f64,
    /// False when fundamentals were unavailable
    pub checked: bool,
    pub violations: Vec<Violation>,
    /// Why the holding could not be checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StockCheckOutcome {
    /// Outcome for a holding whose fundamentals could not be fetched.
    pub fn unchecked(holding: &StockHolding, error: impl Into<String>) -> Self {
        Self {
            code: holding.code.clone(),
            name: holding.name.clone(),
            weight: holding.weight,
            checked: false,
            violations: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn has_hard_violation(&self) -> bool {
        self.violations.iter().any(Violation::is_hard)
    }

    /// Checked and free of hard violations.
    pub fn passed(&self) -> bool {
        self.checked && !self.has_hard_violation()
    }
}

/// Evaluate fundamentals against the thresholds.
///
/// Metrics the provider does not report are not held against the stock.
pub fn evaluate_fundamentals(
    holding: &StockHolding,
    fundamentals: &StockFundamentals,
    options: &StockCheckerOptions,
) -> StockCheckOutcome {
    let mut violations = Vec::new();
    let mut check = |metric: &str, actual: Option<f64>, bound: Option<f64>, lower: bool, severity| {
        if let (Some(actual), Some(bound)) = (actual, bound) {
            let ok = if lower { actual >= bound } else { actual <= bound };
            if !ok {
                violations.push(Violation {
                    stock_code: holding.code.clone(),
                    metric: metric.to_string(),
                    actual,
                    bound,
                    severity,
                });
            }
        }
    };

    check("roe", fundamentals.roe, options.min_roe, true, Severity::Hard);
    check(
        "debt_asset_ratio",
        fundamentals.debt_asset_ratio,
        options.max_debt_asset_ratio,
        false,
        Severity::Hard,
    );
    check(
        "total_market_cap",
        fundamentals.total_market_cap,
        options.min_total_market_cap,
        true,
        Severity::Hard,
    );
    if options.require_profit {
        check("net_profit", fundamentals.net_profit, Some(0.0), true, Severity::Hard);
    }
    // Negative PE means losses, already covered by net_profit
    check(
        "pe_ttm",
        fundamentals.pe_ttm.filter(|pe| *pe > 0.0),
        options.max_pe_ttm,
        false,
        Severity::Soft,
    );
    check(
        "gross_margin",
        fundamentals.gross_margin,
        options.min_gross_margin,
        true,
        Severity::Soft,
    );
    check(
        "net_profit_growth",
        fundamentals.net_profit_growth,
        options.min_net_profit_growth,
        true,
        Severity::Soft,
    );

    StockCheckOutcome {
        code: holding.code.clone(),
        name: holding.name.clone(),
        weight: holding.weight,
        checked: true,
        violations,
        error: None,
    }
}

// ============================================================================
// Stock Checker
// ============================================================================

/// Checks one holding against per-stock thresholds.
#[async_trait]
pub trait StockChecker: Send + Sync {
    async fn check_stock(
        &self,
        holding: &StockHolding,
        options: &StockCheckerOptions,
    ) -> Result<StockCheckOutcome, ProviderError>;
}

/// Stock checker backed by provider fundamentals.
pub struct FundamentalsStockChecker {
    provider: Arc<dyn MarketDataProvider>,
    timeout: Duration,
}

impl FundamentalsStockChecker {
    pub fn new(provider: Arc<dyn MarketDataProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait]
impl StockChecker for FundamentalsStockChecker {
    async fn check_stock(
        &self,
        holding: &StockHolding,
        options: &StockCheckerOptions,
    ) -> Result<StockCheckOutcome, ProviderError> {
        let fundamentals = with_timeout(
            self.timeout,
            self.provider.query_stock_fundamentals(&holding.code),
        )
        .await?;
        Ok(evaluate_fundamentals(holding, &fundamentals, options))
    }
}

// ============================================================================
// Tests
// ============================================================================
