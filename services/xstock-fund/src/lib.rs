//! X-Stock Fund Library
//!
//! Fund screening and holdings-consistency engine: a periodically refreshed
//! in-memory fund universe, a multi-criteria filter and sort pipeline over
//! it, and a concurrent holdings checker with pairwise portfolio similarity.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          xstock-fund                                │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │  Screener       │  │  Searcher       │  │  Checker        │     │
//! │  │  index / filter │  │  cache+provider │  │  fan-out, sim.  │     │
//! │  └────────┬────────┘  └────────┬────────┘  └────────┬────────┘     │
//! │           └──────────┬─────────┴────────────────────┘              │
//! │             ┌────────▼────────┐      ┌─────────────────┐           │
//! │             │  UniverseCache  │◄─────│  Refresher task │           │
//! │             │  (snapshots)    │      └────────┬────────┘           │
//! │             └─────────────────┘               │                    │
//! ├───────────────────────────────────────────────▼─────────────────────┤
//! │                    MarketDataProvider (external)                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## 4433 rule
//! - Top quarter by 1-year return rank
//! - Top quarter for this-year, 2, 3 and 5-year ranks
//! - Top third for 6-month and 3-month ranks
//!
//! ## Snapshots
//! - The universe is replaced wholesale on refresh, never mutated
//! - Readers keep the `Arc` they got; it never changes under them

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod checker;
pub mod data;
pub mod fund;
pub mod screener;
pub mod searcher;

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use xstock_common::{Error, FundConfig, Result, Validate};

use crate::checker::{Checker, CheckerOptions, SimilarityResult};
use crate::data::{MarketDataProvider, UniverseCache};
use crate::screener::{
    run_fund_check, FundCheckQuery, FundCheckReport, FundFilterQuery, FundIndexQuery, FundPage,
    FundScreener,
};
use crate::searcher::{split_codes, Searcher};

/// Shared state behind the fund flows.
pub struct FundState {
    /// Configuration
    pub config: FundConfig,
    /// Market data provider
    pub provider: Arc<dyn MarketDataProvider>,
    /// Universe cache
    pub cache: Arc<UniverseCache>,
    /// Code resolver
    pub searcher: Searcher,
    /// Listing flows
    pub screener: FundScreener,
}

impl FundState {
    pub fn new(config: FundConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        let cache = Arc::new(UniverseCache::new(&config));
        let searcher = Searcher::new(
            Arc::clone(&cache),
            Arc::clone(&provider),
            config.provider_timeout(),
        );
        let screener = FundScreener::new(Arc::clone(&cache));

        Self {
            config,
            provider,
            cache,
            searcher,
            screener,
        }
    }

    /// Checker with the configured batch cap.
    pub fn checker(&self, options: CheckerOptions) -> Checker {
        Checker::new(self.searcher.clone(), options).with_max_batch(self.config.max_check_batch)
    }

    /// 4433 shortlist page.
    pub fn fund_index(&self, query: &FundIndexQuery) -> Result<FundPage> {
        self.screener.fund_index(query)
    }

    /// Filtered universe page.
    pub fn fund_filter(&self, query: &FundFilterQuery) -> Result<FundPage> {
        self.screener.fund_filter(query)
    }

    /// Criteria report and optional holdings check for the queried codes.
    pub async fn fund_check(
        &self,
        query: FundCheckQuery,
        token: &CancellationToken,
    ) -> Result<FundCheckReport> {
        run_fund_check(&self.searcher, query, self.config.max_check_batch, token).await
    }

    /// Holdings similarity of the funds in free-text `codes`.
    pub async fn fund_similarity(
        &self,
        codes: &str,
        token: &CancellationToken,
    ) -> Result<SimilarityResult> {
        let codes = split_codes(codes);
        if codes.is_empty() {
            return Err(Error::invalid("codes", "no fund codes given"));
        }
        self.checker(CheckerOptions::default())
            .get_fund_stocks_similarity(&codes, token)
            .await
    }
}

/// Fund service: owns the state and the refresher task.
pub struct FundService {
    state: Arc<FundState>,
    token: CancellationToken,
    refresher: Option<JoinHandle<()>>,
}

impl FundService {
    /// Create the service. The configuration is validated here.
    pub fn new(config: FundConfig, provider: Arc<dyn MarketDataProvider>) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid fund config: {}", e))?;

        Ok(Self {
            state: Arc::new(FundState::new(config, provider)),
            token: CancellationToken::new(),
            refresher: None,
        })
    }

    pub fn state(&self) -> Arc<FundState> {
        Arc::clone(&self.state)
    }

    /// Token cancelled at shutdown; request tokens should be its children.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Populate the universe, then start the periodic refresher.
    ///
    /// A failed initial population is logged and the service starts with
    /// an empty universe until the next refresh succeeds.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.refresher.is_some() {
            anyhow::bail!("fund service already started");
        }

        let state = &self.state;
        match state.cache.refresh_now(state.provider.as_ref()).await {
            Ok(report) => tracing::info!(
                provider = state.provider.name(),
                funds = report.built,
                fund_4433 = report.fund_4433,
                "Initial fund universe loaded"
            ),
            Err(e) => tracing::error!(
                provider = state.provider.name(),
                error = %e,
                "Initial fund universe load failed"
            ),
        }

        let handle = Arc::clone(&state.cache).spawn_refresher(
            Arc::clone(&state.provider),
            state.config.refresh_interval(),
            self.token.child_token(),
        );
        self.refresher = Some(handle);

        Ok(())
    }

    /// Stop the refresher and cancel outstanding requests.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.refresher.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Refresher task ended abnormally");
            }
        }
        tracing::info!("Fund service stopped");
    }
}
