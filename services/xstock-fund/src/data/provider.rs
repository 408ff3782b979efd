//! Market data provider abstraction for fund data.
//!
//! Defines the `MarketDataProvider` trait the universe cache, searcher and
//! checker consume, together with the raw payload types it returns. The
//! transport client behind it lives outside this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

// ============================================================================
// Raw Payloads
// ============================================================================

/// Current manager as reported by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawManager {
    pub name: String,
    /// Date the manager took over the fund ("2015-06-01" or "20150601")
    pub start_date: Option<String>,
}

/// Return and peer rank for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPerformance {
    /// Period label, readable ("1y") or provider code ("1N")
    pub period: String,
    /// Percent return
    pub profit_ratio: Option<f64>,
    /// Rank among peers (1 = best)
    pub rank: Option<u32>,
    /// Number of peers ranked
    pub peer_count: Option<u32>,
}

/// Risk statistics for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRiskStat {
    /// Window label ("1y", "3y", "5y" or "1N", "3N", "5N")
    pub period: String,
    pub stddev: Option<f64>,
    pub sharpe: Option<f64>,
    pub max_retracement: Option<f64>,
}

/// Fund metadata as returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFundInfo {
    pub code: String,
    pub name: String,
    pub fund_type: String,
    /// Establishment date ("2010-01-05" or "20100105")
    pub establish_date: Option<String>,
    /// Net assets in currency units (yuan)
    pub net_assets: Option<f64>,
    pub manager: Option<RawManager>,
    pub net_value: Option<f64>,
    pub net_value_date: Option<String>,
    #[serde(default)]
    pub performances: Vec<RawPerformance>,
    #[serde(default)]
    pub risk_stats: Vec<RawRiskStat>,
}

/// One holding as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStockHolding {
    pub code: String,
    pub name: String,
    /// Share of net assets (%)
    pub weight: f64,
    pub report_date: Option<String>,
}

/// Stock fundamentals used by the stock-level checker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockFundamentals {
    pub code: String,
    pub name: String,
    /// Return on equity (%)
    pub roe: Option<f64>,
    /// Debt to asset ratio (%)
    pub debt_asset_ratio: Option<f64>,
    /// Price to earnings, trailing twelve months
    pub pe_ttm: Option<f64>,
    /// Gross margin (%)
    pub gross_margin: Option<f64>,
    /// Total market capitalization in 亿
    pub total_market_cap: Option<f64>,
    /// Net profit in 亿
    pub net_profit: Option<f64>,
    /// Year-over-year net profit growth (%)
    pub net_profit_growth: Option<f64>,
}

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to market data providers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network error (connection failed, reset)
    Network(String),
    /// Call did not finish within its deadline
    Timeout(Duration),
    /// Unknown fund or stock code
    NotFound(String),
    /// Payload could not be interpreted
    Parse(String),
    /// Provider is temporarily unavailable
    Unavailable(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Operation not offered by this provider
    Unsupported(&'static str),
    /// Internal provider error
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Timeout(limit) => write!(f, "Timed out after {:?}", limit),
            Self::NotFound(code) => write!(f, "Not found: {}", code),
            Self::Parse(msg) => write!(f, "Parse error: {}", msg),
            Self::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::Unsupported(op) => write!(f, "Unsupported operation: {}", op),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Whether the next periodic refresh may succeed where this call failed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Timeout(_) | Self::Unavailable(_) | Self::RateLimited { .. }
        )
    }
}

impl From<ProviderError> for xstock_common::Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(_) => Self::Timeout,
            ProviderError::NotFound(code) => Self::NotFound(code),
            other => Self::Upstream(other.to_string()),
        }
    }
}

/// Bound a provider call by a deadline.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(limit)),
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Source of fund metadata, holdings and stock fundamentals.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logs (e.g., "eastmoney")
    fn name(&self) -> &'static str;

    /// List every fund code in the universe.
    async fn list_fund_codes(&self) -> Result<Vec<String>, ProviderError>;

    /// Fetch metadata, performance and risk statistics for one fund.
    async fn query_fund_info(&self, code: &str) -> Result<RawFundInfo, ProviderError>;

    /// Fetch the latest disclosed stock holdings of one fund.
    async fn query_fund_holdings(&self, code: &str)
        -> Result<Vec<RawStockHolding>, ProviderError>;

    /// Fetch fundamentals for one stock.
    ///
    /// Providers without stock data keep the default.
    async fn query_stock_fundamentals(
        &self,
        _code: &str,
    ) -> Result<StockFundamentals, ProviderError> {
        Err(ProviderError::Unsupported("query_stock_fundamentals"))
    }
}

// ============================================================================
// Tests
// ============================================================================
