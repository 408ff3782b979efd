//! Holdings overlap between funds.
//!
//! Similarity is the weighted Jaccard index over the union of held stocks:
//! `Σ min(wa, wb) / Σ max(wa, wb)`. It lies in `[0, 1]`, is symmetric, and
//! a fund compared with itself scores 1.0.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use xstock_common::{Error, Result};

use super::engine::Checker;
use crate::fund::{FundBrief, FundHoldings};
use crate::searcher::UnresolvedCode;

/// Weight per stock code, summing repeated codes.
fn weights(holdings: &FundHoldings) -> BTreeMap<&str, f64> {
    let mut map = BTreeMap::new();
    for stock in &holdings.stocks {
        *map.entry(stock.code.as_str()).or_insert(0.0) += stock.weight.max(0.0);
    }
    map
}

/// Weighted Jaccard similarity of two holdings.
///
/// Holdings without positive weight score 0.0 against anything.
pub fn holdings_similarity(a: &FundHoldings, b: &FundHoldings) -> f64 {
    let wa = weights(a);
    let wb = weights(b);

    let mut min_sum = 0.0;
    let mut max_sum = 0.0;
    for code in wa.keys().chain(wb.keys()).collect::<BTreeSet<_>>() {
        let x = wa.get(code).copied().unwrap_or(0.0);
        let y = wb.get(code).copied().unwrap_or(0.0);
        min_sum += x.min(y);
        max_sum += x.max(y);
    }

    if max_sum > 0.0 {
        (min_sum / max_sum).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Stock codes held by both funds, sorted.
pub fn shared_stocks(a: &FundHoldings, b: &FundHoldings) -> Vec<String> {
    let wb = weights(b);
    weights(a)
        .into_keys()
        .filter(|code| wb.contains_key(code))
        .map(String::from)
        .collect()
}

// ============================================================================
// Result Types
// ============================================================================

/// Similarity of one pair of funds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundSimilarity {
    pub code_a: String,
    pub code_b: String,
    pub score: f64,
    pub shared_stocks: Vec<String>,
}

/// A fund whose holdings could not be compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDataWarning {
    pub code: String,
    pub reason: String,
}

/// Pairwise similarity of a set of funds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Resolved funds, in input order
    pub funds: Vec<FundBrief>,
    /// `matrix[i][j]` is the similarity of `funds[i]` and `funds[j]`
    pub matrix: Vec<Vec<f64>>,
    /// Every distinct pair, highest score first
    pub pairs: Vec<FundSimilarity>,
    /// Funds with empty or unavailable holdings
    pub warnings: Vec<PartialDataWarning>,
    /// Codes that did not resolve to a fund
    pub unresolved: Vec<UnresolvedCode>,
}

impl SimilarityResult {
    /// Compute the result from resolved funds and their holdings.
    ///
    /// `None` holdings and empty holdings both produce a warning and score
    /// 0.0 against every other fund.
    pub fn compute(
        funds: Vec<FundBrief>,
        holdings: Vec<Option<FundHoldings>>,
        mut warnings: Vec<PartialDataWarning>,
        unresolved: Vec<UnresolvedCode>,
    ) -> Self {
        let empty = |h: &Option<FundHoldings>| h.as_ref().map_or(true, |h| h.total_weight() <= 0.0);

        for (fund, h) in funds.iter().zip(&holdings) {
            if h.is_some() && empty(h) {
                warnings.push(PartialDataWarning {
                    code: fund.code.clone(),
                    reason: "no stock holdings disclosed".into(),
                });
            }
        }

        let n = funds.len();
        let mut matrix = vec![vec![0.0; n]; n];
        let mut pairs = Vec::new();

        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in (i + 1)..n {
                let (score, shared) = match (&holdings[i], &holdings[j]) {
                    (Some(a), Some(b)) if !empty(&holdings[i]) && !empty(&holdings[j]) => {
                        (holdings_similarity(a, b), shared_stocks(a, b))
                    }
                    _ => (0.0, Vec::new()),
                };
                matrix[i][j] = score;
                matrix[j][i] = score;
                pairs.push(FundSimilarity {
                    code_a: funds[i].code.clone(),
                    code_b: funds[j].code.clone(),
                    score,
                    shared_stocks: shared,
                });
            }
        }
        pairs.sort_by(|a, b| b.score.total_cmp(&a.score));

        Self {
            funds,
            matrix,
            pairs,
            warnings,
            unresolved,
        }
    }

    fn position(&self, code: &str) -> Option<usize> {
        self.funds.iter().position(|f| f.code == code)
    }

    /// Similarity of two resolved funds.
    pub fn score(&self, code_a: &str, code_b: &str) -> Option<f64> {
        let i = self.position(code_a)?;
        let j = self.position(code_b)?;
        Some(self.matrix[i][j])
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// ============================================================================
// Checker Entry Point
// ============================================================================

impl Checker {
    /// Pairwise holdings similarity of the funds behind `codes`.
    ///
    /// Cancelling `token` drops the outstanding provider calls and fails
    /// with `Cancelled`.
    pub async fn get_fund_stocks_similarity<S: AsRef<str>>(
        &self,
        codes: &[S],
        token: &CancellationToken,
    ) -> Result<SimilarityResult> {
        let outcome = self.searcher().search_funds(codes, token).await?;

        let fetches = outcome.funds.iter().map(|fund| self.fetch_holdings(&fund.code));
        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            fetched = join_all(fetches) => fetched,
        };

        let mut warnings = Vec::new();
        let mut holdings = Vec::with_capacity(fetched.len());
        for (fund, result) in outcome.funds.iter().zip(fetched) {
            match result {
                Ok(h) => holdings.push(Some(h)),
                Err(e) => {
                    warn!(code = %fund.code, error = %e, "Holdings unavailable for similarity");
                    warnings.push(PartialDataWarning {
                        code: fund.code.clone(),
                        reason: format!("holdings unavailable: {}", e),
                    });
                    holdings.push(None);
                }
            }
        }

        let funds = outcome.funds.iter().map(|f| f.brief()).collect();
        let result = SimilarityResult::compute(funds, holdings, warnings, outcome.unresolved);

        info!(
            funds = result.funds.len(),
            warnings = result.warnings.len(),
            unresolved = result.unresolved.len(),
            "Computed fund holdings similarity"
        );

        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
