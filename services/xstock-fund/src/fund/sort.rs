//! Sort keys for fund lists.
//!
//! Callers select a key by integer code; `0` leaves the order unchanged.
//! Sorting is stable and funds missing the key's metric always go last.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use xstock_common::ValidationError;

use super::{Fund, Period};

/// Fixed set of sort orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum FundSortType {
    /// Insertion order
    #[default]
    Unsorted,
    Week,
    Month1,
    Month3,
    Month6,
    Year1,
    Year2,
    Year3,
    Year5,
    ThisYear,
    Historical,
    /// 1y rank ratio, best first
    Year1RankRatio,
    /// 1/3/5y average standard deviation, lowest first
    AvgStddev,
    /// 1/3/5y average Sharpe ratio, highest first
    AvgSharpe,
    /// 1/3/5y average drawdown, lowest first
    AvgDrawdown,
    /// Net asset scale, largest first
    Scale,
}

impl FundSortType {
    pub fn code(&self) -> i64 {
        match self {
            Self::Unsorted => 0,
            Self::Week => 1,
            Self::Month1 => 2,
            Self::Month3 => 3,
            Self::Month6 => 4,
            Self::Year1 => 5,
            Self::Year2 => 6,
            Self::Year3 => 7,
            Self::Year5 => 8,
            Self::ThisYear => 9,
            Self::Historical => 10,
            Self::Year1RankRatio => 11,
            Self::AvgStddev => 12,
            Self::AvgSharpe => 13,
            Self::AvgDrawdown => 14,
            Self::Scale => 15,
        }
    }

    fn return_period(&self) -> Option<Period> {
        match self {
            Self::Week => Some(Period::Week),
            Self::Month1 => Some(Period::Month1),
            Self::Month3 => Some(Period::Month3),
            Self::Month6 => Some(Period::Month6),
            Self::Year1 => Some(Period::Year1),
            Self::Year2 => Some(Period::Year2),
            Self::Year3 => Some(Period::Year3),
            Self::Year5 => Some(Period::Year5),
            Self::ThisYear => Some(Period::ThisYear),
            Self::Historical => Some(Period::Historical),
            _ => None,
        }
    }

    /// Metric this key orders by.
    pub fn key(&self, fund: &Fund) -> Option<f64> {
        if let Some(period) = self.return_period() {
            return fund.performance.return_of(period);
        }
        match self {
            Self::Year1RankRatio => fund.performance.rank_ratio(Period::Year1),
            Self::AvgStddev => fund.risk.stddev.avg_135,
            Self::AvgSharpe => fund.risk.sharpe.avg_135,
            Self::AvgDrawdown => fund.risk.max_drawdown.avg_135,
            Self::Scale => fund.net_assets_scale,
            _ => None,
        }
    }

    /// Whether larger values come first.
    pub fn descending(&self) -> bool {
        !matches!(
            self,
            Self::Year1RankRatio | Self::AvgStddev | Self::AvgDrawdown
        )
    }

    pub fn is_unsorted(&self) -> bool {
        *self == Self::Unsorted
    }

    /// Ordering of two funds under this key; missing metrics compare last.
    pub fn compare(&self, a: &Fund, b: &Fund) -> Ordering {
        if self.is_unsorted() {
            return Ordering::Equal;
        }
        match (self.key(a), self.key(b)) {
            (Some(x), Some(y)) if self.descending() => y.total_cmp(&x),
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

impl TryFrom<i64> for FundSortType {
    type Error = ValidationError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        let sort = match code {
            0 => Self::Unsorted,
            1 => Self::Week,
            2 => Self::Month1,
            3 => Self::Month3,
            4 => Self::Month6,
            5 => Self::Year1,
            6 => Self::Year2,
            7 => Self::Year3,
            8 => Self::Year5,
            9 => Self::ThisYear,
            10 => Self::Historical,
            11 => Self::Year1RankRatio,
            12 => Self::AvgStddev,
            13 => Self::AvgSharpe,
            14 => Self::AvgDrawdown,
            15 => Self::Scale,
            other => {
                return Err(ValidationError::InvalidValue {
                    field: "sort".into(),
                    reason: format!("unknown sort type {}", other),
                })
            }
        };
        Ok(sort)
    }
}

impl From<FundSortType> for i64 {
    fn from(sort: FundSortType) -> Self {
        sort.code()
    }
}

impl fmt::Display for FundSortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.return_period() {
            Some(period) => write!(f, "return:{}", period),
            None => f.write_str(match self {
                Self::Unsorted => "unsorted",
                Self::Year1RankRatio => "rank:1y",
                Self::AvgStddev => "avg_stddev",
                Self::AvgSharpe => "avg_sharpe",
                Self::AvgDrawdown => "avg_drawdown",
                _ => "scale",
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
