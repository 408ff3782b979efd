//! Resolve fund codes to funds.
//!
//! Codes are looked up in the current universe snapshot first; misses are
//! fetched from the provider concurrently, each call under the provider
//! timeout. One bad code never fails the batch.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use xstock_common::{Error, Result};

use crate::data::{with_timeout, MarketDataProvider, UniverseCache};
use crate::fund::{Fund, FundBuilder, FundList};

/// Separators accepted between codes in free-text input.
const CODE_SEPARATORS: &[char] = &[',', '，', '、', ';', '；', '|'];

/// Split free-text code input on whitespace and common separators.
///
/// Order is kept and duplicates are not removed.
pub fn split_codes(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || CODE_SEPARATORS.contains(&c))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

/// Trim, drop empties and remove duplicates keeping first occurrences.
pub fn dedup_codes<I, S>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    codes
        .into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}

/// A code that could not be resolved, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedCode {
    pub code: String,
    pub reason: String,
}

/// Funds found for a batch of codes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Resolved funds in input order, each once
    pub funds: FundList,
    /// Codes that could not be resolved
    pub unresolved: Vec<UnresolvedCode>,
    /// How many funds came from the snapshot
    pub cache_hits: usize,
}

impl SearchOutcome {
    pub fn is_partial(&self) -> bool {
        !self.unresolved.is_empty()
    }

    pub fn unresolved_codes(&self) -> Vec<&str> {
        self.unresolved.iter().map(|u| u.code.as_str()).collect()
    }
}

/// Code to fund resolver.
#[derive(Clone)]
pub struct Searcher {
    cache: Arc<UniverseCache>,
    provider: Arc<dyn MarketDataProvider>,
    timeout: Duration,
}

impl Searcher {
    pub fn new(
        cache: Arc<UniverseCache>,
        provider: Arc<dyn MarketDataProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            cache,
            provider,
            timeout,
        }
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve codes to funds.
    ///
    /// Fails with `Validation` on empty input and with `NotFound` when no
    /// code resolves. Anything short of that is a partial result. Once
    /// `token` is cancelled the provider fetches are dropped and the call
    /// fails with `Cancelled`.
    pub async fn search_funds<S: AsRef<str>>(
        &self,
        codes: &[S],
        token: &CancellationToken,
    ) -> Result<SearchOutcome> {
        let codes = dedup_codes(codes);
        if codes.is_empty() {
            return Err(Error::invalid("codes", "no fund codes given"));
        }

        let snapshot = self.cache.snapshot();
        let mut slots: Vec<Option<Arc<Fund>>> = codes.iter().map(|c| snapshot.get(c).cloned()).collect();
        let cache_hits = slots.iter().filter(|s| s.is_some()).count();

        let misses: Vec<(usize, &String)> = codes
            .iter()
            .enumerate()
            .filter(|(i, _)| slots[*i].is_none())
            .collect();

        debug!(
            requested = codes.len(),
            cache_hits,
            misses = misses.len(),
            generation = snapshot.generation,
            "Searching funds"
        );

        let builder = FundBuilder::today();
        let fetches = misses.iter().map(|(i, code)| {
            let provider = Arc::clone(&self.provider);
            let timeout = self.timeout;
            async move {
                let result = with_timeout(timeout, provider.query_fund_info(code))
                    .await
                    .and_then(|raw| builder.build(raw));
                (*i, result)
            }
        });

        let fetched = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(misses = misses.len(), "Fund search cancelled");
                return Err(Error::Cancelled);
            }
            fetched = join_all(fetches) => fetched,
        };

        let mut unresolved = Vec::new();
        for (i, result) in fetched {
            match result {
                Ok(fund) => slots[i] = Some(Arc::new(fund)),
                Err(e) => {
                    warn!(code = %codes[i], error = %e, "Failed to resolve fund code");
                    unresolved.push(UnresolvedCode {
                        code: codes[i].clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let funds: FundList = slots.into_iter().flatten().collect();
        if funds.is_empty() {
            return Err(Error::NotFound(format!(
                "no fund found for codes: {}",
                codes.join(",")
            )));
        }

        Ok(SearchOutcome {
            funds,
            unresolved,
            cache_hits,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_codes() {
        assert_eq!(
            split_codes(" 000001,000002，000003、000004\n000005  000006;"),
            vec!["000001", "000002", "000003", "000004", "000005", "000006"]
        );
        assert!(split_codes("  , ,\t").is_empty());
    }

    #[test]
    fn test_dedup_codes_keeps_first() {
        assert_eq!(
            dedup_codes(["002", " 001", "002", "", "001 ", "003"]),
            vec!["002", "001", "003"]
        );
    }
}
