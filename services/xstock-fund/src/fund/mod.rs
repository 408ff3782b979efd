//! Fund instrument model.
//!
//! A [`Fund`] is built once from a provider payload by the
//! [`FundBuilder`] and never mutated afterwards; snapshots and search
//! results share it as `Arc<Fund>`. Holdings are volatile and expensive,
//! so they live in a separate [`FundHoldings`] fetched on demand.

mod builder;
pub mod filter;
mod list;
pub mod sort;

pub use builder::{parse_date, FundBuilder, SCALE_UNIT};
pub use filter::{Criterion, CriterionOutcome, FilterStats, FundCriteriaReport, ParamFundListFilter};
pub use list::FundList;
pub use sort::FundSortType;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Period
// ============================================================================

/// Trailing window a return or rank is measured over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "1m")]
    Month1,
    #[serde(rename = "3m")]
    Month3,
    #[serde(rename = "6m")]
    Month6,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "3y")]
    Year3,
    #[serde(rename = "5y")]
    Year5,
    #[serde(rename = "this-year")]
    ThisYear,
    #[serde(rename = "historical")]
    Historical,
}

impl Period {
    /// All periods, shortest first.
    pub const ALL: [Period; 10] = [
        Self::Week,
        Self::Month1,
        Self::Month3,
        Self::Month6,
        Self::Year1,
        Self::Year2,
        Self::Year3,
        Self::Year5,
        Self::ThisYear,
        Self::Historical,
    ];

    /// Parse a period label.
    ///
    /// Readable labels ("1m", "this-year") match first, case-sensitively.
    /// Otherwise the Eastmoney-style codes providers report ("Z", "3Y",
    /// "JN", "LN") are accepted in any case; there "3Y" means three months.
    pub fn from_label(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(period) = Self::ALL.into_iter().find(|p| p.label() == s) {
            return Some(period);
        }

        match s.to_uppercase().as_str() {
            "Z" | "1W" => Some(Self::Week),
            "Y" => Some(Self::Month1),
            "3Y" => Some(Self::Month3),
            "6Y" => Some(Self::Month6),
            "1N" => Some(Self::Year1),
            "2N" => Some(Self::Year2),
            "3N" => Some(Self::Year3),
            "5N" => Some(Self::Year5),
            "JN" | "YTD" => Some(Self::ThisYear),
            "LN" => Some(Self::Historical),
            _ => None,
        }
    }

    /// Readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month1 => "1m",
            Self::Month3 => "3m",
            Self::Month6 => "6m",
            Self::Year1 => "1y",
            Self::Year2 => "2y",
            Self::Year3 => "3y",
            Self::Year5 => "5y",
            Self::ThisYear => "this-year",
            Self::Historical => "historical",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Derived Metrics
// ============================================================================

/// Period returns and peer rank ratios.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundPerformance {
    /// Percent return per period
    pub returns: BTreeMap<Period, f64>,
    /// Rank among peers as a percentage (rank / peers × 100, lower is better)
    pub rank_ratios: BTreeMap<Period, f64>,
}

impl FundPerformance {
    pub fn return_of(&self, period: Period) -> Option<f64> {
        self.returns.get(&period).copied()
    }

    pub fn rank_ratio(&self, period: Period) -> Option<f64> {
        self.rank_ratios.get(&period).copied()
    }

    /// Worst (largest) rank ratio across the given periods.
    ///
    /// `None` if any of them is missing.
    pub fn worst_rank_ratio(&self, periods: &[Period]) -> Option<f64> {
        periods
            .iter()
            .map(|p| self.rank_ratio(*p))
            .try_fold(f64::NEG_INFINITY, |acc, r| r.map(|r| acc.max(r)))
            .filter(|v| v.is_finite())
    }
}

/// A risk metric measured over 1, 3 and 5 year windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowedMetric {
    pub year_1: Option<f64>,
    pub year_3: Option<f64>,
    pub year_5: Option<f64>,
    /// Mean over the windows that are present
    pub avg_135: Option<f64>,
}

impl WindowedMetric {
    pub fn new(year_1: Option<f64>, year_3: Option<f64>, year_5: Option<f64>) -> Self {
        let present: Vec<f64> = [year_1, year_3, year_5]
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .collect();
        let avg_135 = if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        };

        Self {
            year_1,
            year_3,
            year_5,
            avg_135,
        }
    }
}

/// Volatility, risk-adjusted return and drawdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Annualized standard deviation (%)
    pub stddev: WindowedMetric,
    /// Sharpe ratio
    pub sharpe: WindowedMetric,
    /// Maximum drawdown (%)
    pub max_drawdown: WindowedMetric,
}

// ============================================================================
// Fund
// ============================================================================

/// Current manager of a fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundManager {
    pub name: String,
    /// Date the manager took over this fund
    pub managed_since: Option<NaiveDate>,
    /// Years managing this fund, as of the build date
    pub tenure_years: Option<f64>,
}

/// One tradable fund instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fund {
    /// Fund code (unique key)
    pub code: String,
    /// Fund name
    pub name: String,
    /// Category tag (equity, bond, index, ...)
    pub fund_type: String,
    /// Establishment date
    pub established_date: Option<NaiveDate>,
    /// Years since establishment, as of the build date
    pub estab_years: Option<f64>,
    /// Net asset scale in units of [`SCALE_UNIT`]
    pub net_assets_scale: Option<f64>,
    /// Current manager
    pub manager: Option<FundManager>,
    /// Latest unit net value
    pub net_value: Option<f64>,
    /// Date of the latest net value
    pub net_value_date: Option<NaiveDate>,
    /// Returns and rank ratios
    pub performance: FundPerformance,
    /// Risk metrics
    pub risk: RiskMetrics,
}

impl Fund {
    pub fn manager_years(&self) -> Option<f64> {
        self.manager.as_ref().and_then(|m| m.tenure_years)
    }

    /// Short projection used in similarity and check results.
    pub fn brief(&self) -> FundBrief {
        FundBrief {
            code: self.code.clone(),
            name: self.name.clone(),
            fund_type: self.fund_type.clone(),
        }
    }
}

/// Code, name and type of a fund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundBrief {
    pub code: String,
    pub name: String,
    pub fund_type: String,
}

// ============================================================================
// Holdings
// ============================================================================

/// One stock position of a fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockHolding {
    /// Stock code
    pub code: String,
    /// Stock name
    pub name: String,
    /// Share of the fund's net assets (%)
    pub weight: f64,
}

/// Current stock holdings of a fund, heaviest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundHoldings {
    pub fund_code: String,
    pub stocks: Vec<StockHolding>,
    /// Reporting date of the holdings disclosure
    pub report_date: Option<NaiveDate>,
}

impl FundHoldings {
    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    /// Sum of all position weights (%).
    pub fn total_weight(&self) -> f64 {
        self.stocks.iter().map(|s| s.weight.max(0.0)).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
