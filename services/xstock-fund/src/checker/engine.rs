//! Concurrent fund holdings checks.
//!
//! A batch check spawns one task per fund on a `JoinSet`. Each task
//! returns `(code, result)` and the results are folded into the map on the
//! single collecting loop, so no task ever touches shared state. A fund
//! whose check fails is logged and left out of the map.

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xstock_common::logging::{generate_run_id, short_id};
use xstock_common::{Error, Result, ResultExt};

use super::options::CheckerOptions;
use super::policy::VerdictPolicy;
use super::stock::{FundamentalsStockChecker, StockCheckOutcome, StockChecker, Violation};
use crate::data::{with_timeout, ProviderError};
use crate::fund::{Fund, FundBuilder, FundHoldings, FundList};
use crate::searcher::Searcher;

/// Default cap on funds per batch check.
pub const DEFAULT_MAX_BATCH: usize = 50;

// ============================================================================
// Results
// ============================================================================

/// Holdings check result for one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundStocksCheckResult {
    pub code: String,
    pub name: String,
    pub passed: bool,
    /// Summed weight of holdings with hard violations (%)
    pub failed_weight: f64,
    /// Holdings that decided a failing verdict
    pub failing_stocks: Vec<String>,
    /// Per-holding outcomes, heaviest first
    pub stocks: Vec<StockCheckOutcome>,
    /// Every violation found, hard and soft
    pub violations: Vec<Violation>,
    /// Holdings whose fundamentals were unavailable
    pub unchecked: usize,
    pub report_date: Option<NaiveDate>,
    pub policy: VerdictPolicy,
}

/// A fund left out of a batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCheck {
    pub code: String,
    pub reason: String,
}

/// Result of a batch check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchCheckReport {
    pub run_id: String,
    /// Successful checks keyed by fund code
    pub results: HashMap<String, FundStocksCheckResult>,
    /// Funds whose check failed
    pub failed: Vec<FailedCheck>,
    /// The batch was cancelled before every fund finished
    pub cancelled: bool,
}

// ============================================================================
// Checker
// ============================================================================

/// Fund holdings checker.
///
/// Cloning is cheap; clones share the provider, options and stock checker.
#[derive(Clone)]
pub struct Checker {
    searcher: Searcher,
    stock_checker: Arc<dyn StockChecker>,
    options: Arc<CheckerOptions>,
    max_batch: usize,
}

impl Checker {
    /// Checker backed by provider fundamentals.
    pub fn new(searcher: Searcher, options: CheckerOptions) -> Self {
        let stock_checker = Arc::new(FundamentalsStockChecker::new(
            Arc::clone(searcher.provider()),
            searcher.timeout(),
        ));
        Self {
            searcher,
            stock_checker,
            options: Arc::new(options),
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn with_stock_checker(mut self, stock_checker: Arc<dyn StockChecker>) -> Self {
        self.stock_checker = stock_checker;
        self
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    pub fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Fetch a fund's current holdings under the provider timeout.
    pub async fn fetch_holdings(&self, code: &str) -> std::result::Result<FundHoldings, ProviderError> {
        let raw = with_timeout(
            self.searcher.timeout(),
            self.searcher.provider().query_fund_holdings(code),
        )
        .await?;
        Ok(FundBuilder::today().build_holdings(code, raw))
    }

    /// Check every holding of one fund and aggregate the verdict.
    pub async fn check_fund_stocks(&self, fund: &Fund) -> Result<FundStocksCheckResult> {
        let holdings = self
            .fetch_holdings(&fund.code)
            .await
            .context(format!("fetching holdings of {}", fund.code))?;

        let opts = &self.options.stock_checker_options;
        let checks = holdings.stocks.iter().map(|holding| async move {
            match self.stock_checker.check_stock(holding, opts).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    debug!(stock = %holding.code, error = %e, "Stock fundamentals unavailable");
                    StockCheckOutcome::unchecked(holding, e.to_string())
                }
            }
        });
        let stocks: Vec<StockCheckOutcome> = join_all(checks).await;

        let policy = self.options.verdict_policy.clone();
        let verdict = policy.verdict(&stocks);

        Ok(FundStocksCheckResult {
            code: fund.code.clone(),
            name: fund.name.clone(),
            passed: verdict.passed,
            failed_weight: verdict.failed_weight,
            failing_stocks: verdict.failing_stocks,
            violations: stocks.iter().flat_map(|s| s.violations.clone()).collect(),
            unchecked: stocks.iter().filter(|s| !s.checked).count(),
            stocks,
            report_date: holdings.report_date,
            policy,
        })
    }

    /// Check a batch of funds concurrently.
    ///
    /// Batches larger than the cap are rejected before any provider call.
    /// Once `token` is cancelled no further fund is started, in-flight
    /// checks are aborted and the partial report is returned.
    pub async fn check_funds(
        &self,
        funds: &FundList,
        token: &CancellationToken,
    ) -> Result<BatchCheckReport> {
        if funds.len() > self.max_batch {
            return Err(Error::LimitExceeded {
                limit: self.max_batch,
                actual: funds.len(),
            });
        }

        let run_id = generate_run_id();
        let mut report = BatchCheckReport {
            run_id: run_id.clone(),
            ..Default::default()
        };
        let mut join_set: JoinSet<(String, Result<FundStocksCheckResult>)> = JoinSet::new();

        for fund in funds.iter() {
            if token.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let checker = self.clone();
            let fund = Arc::clone(fund);
            join_set.spawn(async move {
                let result = checker.check_fund_stocks(&fund).await;
                (fund.code.clone(), result)
            });
        }

        info!(
            run_id = short_id(&run_id),
            funds = join_set.len(),
            "Checking fund holdings"
        );

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    report.cancelled = true;
                    join_set.abort_all();
                    break;
                }
                next = join_set.join_next() => match next {
                    None => break,
                    Some(Ok((code, Ok(result)))) => {
                        report.results.insert(code, result);
                    }
                    Some(Ok((code, Err(e)))) => {
                        warn!(run_id = short_id(&run_id), code = %code, error = %e, "Fund check failed");
                        report.failed.push(FailedCheck {
                            code,
                            reason: e.to_string(),
                        });
                    }
                    Some(Err(join_error)) => {
                        warn!(run_id = short_id(&run_id), error = %join_error, "Fund check task failed");
                    }
                },
            }
        }

        info!(
            run_id = short_id(&run_id),
            checked = report.results.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "Fund holdings check finished"
        );

        Ok(report)
    }
}
