//! Fund check flow: resolve codes, evaluate the fund criteria and
//! optionally run the holdings check.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use xstock_common::{Error, Result, Validate};

use crate::checker::{BatchCheckReport, Checker, CheckerOptions};
use crate::fund::{FundCriteriaReport, FundList};
use crate::searcher::{split_codes, Searcher, UnresolvedCode};

/// Fund check request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundCheckQuery {
    /// Free-text fund codes
    #[serde(default, alias = "fundcode")]
    pub code: String,
    #[serde(flatten)]
    pub options: CheckerOptions,
}

/// Result of the fund check flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundCheckReport {
    pub funds: FundList,
    /// Fund-level criteria, one report per resolved fund
    pub criteria: Vec<FundCriteriaReport>,
    pub unresolved: Vec<UnresolvedCode>,
    /// Holdings check, when requested and within the batch cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_checks: Option<BatchCheckReport>,
    /// Why the holdings check did not run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run the fund check flow.
///
/// An oversized holdings batch is not an error here: the resolved funds
/// and criteria reports come back with `error` set and no holdings check.
pub async fn run_fund_check(
    searcher: &Searcher,
    query: FundCheckQuery,
    max_batch: usize,
    token: &CancellationToken,
) -> Result<FundCheckReport> {
    query.options.validate()?;
    let codes = split_codes(&query.code);
    if codes.is_empty() {
        return Err(Error::invalid("code", "no fund codes given"));
    }

    let outcome = searcher.search_funds(&codes, token).await?;
    let criteria = outcome
        .funds
        .iter()
        .map(|f| query.options.fund_filter().evaluate(f))
        .collect();

    let mut report = FundCheckReport {
        funds: outcome.funds,
        criteria,
        unresolved: outcome.unresolved,
        stock_checks: None,
        error: None,
    };

    if !query.options.check_stocks {
        return Ok(report);
    }

    let checker = Checker::new(searcher.clone(), query.options).with_max_batch(max_batch);
    match checker.check_funds(&report.funds, token).await {
        Ok(batch) => report.stock_checks = Some(batch),
        Err(e) if e.is_limit_exceeded() => {
            warn!(funds = report.funds.len(), limit = max_batch, "Fund check batch rejected");
            report.error = Some(e.to_string());
        }
        Err(e) => return Err(e),
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_binds_defaults() {
        let q: FundCheckQuery = serde_json::from_str(r#"{"code": "000001"}"#).unwrap();
        assert_eq!(q.code, "000001");
        assert_eq!(q.options, CheckerOptions::default());
        assert_eq!(q.options.fund_filter().active().count(), 11);
    }

    #[test]
    fn test_query_accepts_fundcode() {
        let q: FundCheckQuery =
            serde_json::from_str(r#"{"fundcode": "000001,000002", "check_stocks": true}"#).unwrap();
        assert_eq!(q.code, "000001,000002");
        assert!(q.options.check_stocks);
    }
}
