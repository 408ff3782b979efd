//! Shared mock provider and fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use xstock_common::FundConfig;
use xstock_fund::data::{
    MarketDataProvider, ProviderError, RawFundInfo, RawManager, RawPerformance, RawRiskStat,
    RawStockHolding, StockFundamentals,
};
use xstock_fund::FundState;

// ============================================================================
// Fixtures
// ============================================================================

/// Declarative description of a raw fund payload.
#[derive(Debug, Clone)]
pub struct FundSpec {
    pub code: String,
    pub fund_type: String,
    /// Scale in 亿
    pub scale: Option<f64>,
    pub establish_date: &'static str,
    pub manager_since: &'static str,
    /// Rank ratio used for every period without an override
    pub rank_ratio: f64,
    pub year_1_rank_ratio: Option<f64>,
    pub week_return: Option<f64>,
}

impl FundSpec {
    /// A fund that passes the 4433 rule.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            fund_type: "股票型".into(),
            scale: Some(10.0),
            establish_date: "2010-01-04",
            manager_since: "2015-03-02",
            rank_ratio: 10.0,
            year_1_rank_ratio: None,
            week_return: Some(1.0),
        }
    }

    pub fn fund_type(mut self, fund_type: &str) -> Self {
        self.fund_type = fund_type.into();
        self
    }

    pub fn scale(mut self, scale: Option<f64>) -> Self {
        self.scale = scale;
        self
    }

    pub fn rank_ratio(mut self, ratio: f64) -> Self {
        self.rank_ratio = ratio;
        self
    }

    pub fn year_1_rank(mut self, ratio: f64) -> Self {
        self.year_1_rank_ratio = Some(ratio);
        self
    }

    pub fn week(mut self, ret: Option<f64>) -> Self {
        self.week_return = ret;
        self
    }

    pub fn manager_since(mut self, date: &'static str) -> Self {
        self.manager_since = date;
        self
    }

    pub fn into_raw(self) -> RawFundInfo {
        const PEERS: u32 = 10_000;
        let rank = |ratio: f64| (ratio * f64::from(PEERS) / 100.0).round() as u32;

        let mut performances = Vec::new();
        for label in ["week", "1m", "3m", "6m", "1y", "2y", "3y", "5y", "this-year", "historical"] {
            let ratio = match (label, self.year_1_rank_ratio) {
                ("1y", Some(r)) => r,
                _ => self.rank_ratio,
            };
            let profit_ratio = match label {
                "week" => self.week_return,
                _ => Some(5.0),
            };
            performances.push(RawPerformance {
                period: label.into(),
                profit_ratio,
                rank: Some(rank(ratio)),
                peer_count: Some(PEERS),
            });
        }

        let risk_stats = ["1y", "3y", "5y"]
            .into_iter()
            .map(|label| RawRiskStat {
                period: label.into(),
                stddev: Some(15.0),
                sharpe: Some(1.5),
                max_retracement: Some(10.0),
            })
            .collect();

        RawFundInfo {
            name: format!("测试基金{}", self.code),
            code: self.code,
            fund_type: self.fund_type,
            establish_date: Some(self.establish_date.into()),
            net_assets: self.scale.map(|s| s * 1e8),
            manager: Some(RawManager {
                name: "王五".into(),
                start_date: Some(self.manager_since.into()),
            }),
            net_value: Some(1.5),
            net_value_date: Some("2024-06-28".into()),
            performances,
            risk_stats,
        }
    }
}

pub fn holding(code: &str, weight: f64) -> RawStockHolding {
    RawStockHolding {
        code: code.into(),
        name: format!("股票{}", code),
        weight,
        report_date: Some("2024-03-31".into()),
    }
}

pub fn healthy_stock(code: &str) -> StockFundamentals {
    StockFundamentals {
        code: code.into(),
        name: format!("股票{}", code),
        roe: Some(20.0),
        debt_asset_ratio: Some(35.0),
        pe_ttm: Some(25.0),
        gross_margin: Some(45.0),
        total_market_cap: Some(2000.0),
        net_profit: Some(50.0),
        net_profit_growth: Some(12.0),
    }
}

pub fn weak_stock(code: &str) -> StockFundamentals {
    StockFundamentals {
        roe: Some(3.0),
        ..healthy_stock(code)
    }
}

// ============================================================================
// Mock Provider
// ============================================================================

/// In-memory provider with failure injection and call counters.
#[derive(Default)]
pub struct MockProvider {
    funds: Mutex<Vec<RawFundInfo>>,
    holdings: Mutex<HashMap<String, Vec<RawStockHolding>>>,
    fundamentals: Mutex<HashMap<String, StockFundamentals>>,
    failing_info: Mutex<HashSet<String>>,
    failing_holdings: Mutex<HashSet<String>>,
    fail_listing: AtomicBool,
    info_delay: Mutex<Option<Duration>>,
    holdings_delay: Mutex<Option<Duration>>,
    pub list_calls: AtomicU32,
    pub info_calls: AtomicU32,
    pub holdings_calls: AtomicU32,
    pub fundamentals_calls: AtomicU32,
}

impl MockProvider {
    pub fn new(specs: Vec<FundSpec>) -> Self {
        let provider = Self::default();
        provider.set_funds(specs);
        provider
    }

    pub fn set_funds(&self, specs: Vec<FundSpec>) {
        *self.funds.lock().unwrap() = specs.into_iter().map(FundSpec::into_raw).collect();
    }

    pub fn set_holdings(&self, fund_code: &str, holdings: Vec<RawStockHolding>) {
        self.holdings
            .lock()
            .unwrap()
            .insert(fund_code.into(), holdings);
    }

    pub fn set_fundamentals(&self, fundamentals: StockFundamentals) {
        self.fundamentals
            .lock()
            .unwrap()
            .insert(fundamentals.code.clone(), fundamentals);
    }

    pub fn fail_info(&self, code: &str) {
        self.failing_info.lock().unwrap().insert(code.into());
    }

    pub fn fail_holdings(&self, code: &str) {
        self.failing_holdings.lock().unwrap().insert(code.into());
    }

    pub fn set_fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub fn set_info_delay(&self, delay: Duration) {
        *self.info_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_holdings_delay(&self, delay: Duration) {
        *self.holdings_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> u32 {
        Self::calls(&self.list_calls)
            + Self::calls(&self.info_calls)
            + Self::calls(&self.holdings_calls)
            + Self::calls(&self.fundamentals_calls)
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_fund_codes(&self) -> Result<Vec<String>, ProviderError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(ProviderError::Network("mock listing failure".into()));
        }
        Ok(self
            .funds
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.code.clone())
            .collect())
    }

    async fn query_fund_info(&self, code: &str) -> Result<RawFundInfo, ProviderError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.info_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_info.lock().unwrap().contains(code) {
            return Err(ProviderError::Network(format!("mock failure for {}", code)));
        }
        self.funds
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.code == code)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(code.into()))
    }

    async fn query_fund_holdings(
        &self,
        code: &str,
    ) -> Result<Vec<RawStockHolding>, ProviderError> {
        self.holdings_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.holdings_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_holdings.lock().unwrap().contains(code) {
            return Err(ProviderError::Unavailable(format!("no holdings for {}", code)));
        }
        Ok(self
            .holdings
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .unwrap_or_default())
    }

    async fn query_stock_fundamentals(
        &self,
        code: &str,
    ) -> Result<StockFundamentals, ProviderError> {
        self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
        self.fundamentals
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(code.into()))
    }
}

// ============================================================================
// State Helpers
// ============================================================================

pub fn config() -> FundConfig {
    FundConfig::default()
}

pub fn state(provider: &Arc<MockProvider>) -> FundState {
    state_with_config(provider, config())
}

pub fn state_with_config(provider: &Arc<MockProvider>, config: FundConfig) -> FundState {
    let provider: Arc<dyn MarketDataProvider> = Arc::clone(provider) as Arc<dyn MarketDataProvider>;
    FundState::new(config, provider)
}

/// State with the universe loaded from the provider.
pub async fn loaded_state(provider: &Arc<MockProvider>) -> FundState {
    let state = state(provider);
    state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .expect("initial refresh");
    state
}

pub fn codes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{:06}", i)).collect()
}
