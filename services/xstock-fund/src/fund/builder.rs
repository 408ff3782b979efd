//! Raw provider payload to immutable [`Fund`].

use chrono::{Local, NaiveDate};
use std::collections::BTreeMap;

use super::{
    Fund, FundHoldings, FundManager, FundPerformance, Period, RiskMetrics, StockHolding,
    WindowedMetric,
};
use crate::data::{ProviderError, RawFundInfo, RawStockHolding};

/// One scale unit (亿) in currency units.
pub const SCALE_UNIT: f64 = 1e8;

const DAYS_PER_YEAR: f64 = 365.25;

/// Parse a provider date ("2015-06-01" or "20150601").
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() || s == "--" {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y%m%d"))
        .ok()
}

/// Builds funds with tenure metrics derived against a fixed date.
#[derive(Debug, Clone, Copy)]
pub struct FundBuilder {
    as_of: NaiveDate,
}

impl FundBuilder {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Builder for the current local date.
    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    fn years_since(&self, date: NaiveDate) -> f64 {
        let days = (self.as_of - date).num_days().max(0);
        days as f64 / DAYS_PER_YEAR
    }

    /// Build a fund from its raw payload.
    ///
    /// Fails only when the payload has no code; anything else that cannot
    /// be interpreted becomes a missing metric.
    pub fn build(&self, raw: RawFundInfo) -> Result<Fund, ProviderError> {
        let code = raw.code.trim().to_string();
        if code.is_empty() {
            return Err(ProviderError::Parse("fund payload without code".into()));
        }

        let risk = risk_metrics(&raw);
        let established_date = raw.establish_date.as_deref().and_then(parse_date);
        let manager = raw.manager.map(|m| {
            let managed_since = m.start_date.as_deref().and_then(parse_date);
            FundManager {
                name: m.name,
                managed_since,
                tenure_years: managed_since.map(|d| self.years_since(d)),
            }
        });

        let mut performance = FundPerformance::default();
        for perf in &raw.performances {
            let Some(period) = Period::from_label(&perf.period) else {
                tracing::debug!(code = %code, period = %perf.period, "Unknown performance period");
                continue;
            };
            if let Some(ratio) = perf.profit_ratio.filter(|v| v.is_finite()) {
                performance.returns.insert(period, ratio);
            }
            if let (Some(rank), Some(peers)) = (perf.rank, perf.peer_count) {
                if peers > 0 && rank > 0 {
                    performance
                        .rank_ratios
                        .insert(period, f64::from(rank) / f64::from(peers) * 100.0);
                }
            }
        }

        Ok(Fund {
            code,
            name: raw.name.trim().to_string(),
            fund_type: raw.fund_type.trim().to_string(),
            established_date,
            estab_years: established_date.map(|d| self.years_since(d)),
            net_assets_scale: raw
                .net_assets
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v / SCALE_UNIT),
            manager,
            net_value: raw.net_value.filter(|v| v.is_finite()),
            net_value_date: raw.net_value_date.as_deref().and_then(parse_date),
            performance,
            risk,
        })
    }

    /// Convert raw holdings, dropping blank codes and sorting heaviest first.
    pub fn build_holdings(&self, fund_code: &str, raw: Vec<RawStockHolding>) -> FundHoldings {
        let report_date = raw
            .iter()
            .filter_map(|h| h.report_date.as_deref().and_then(parse_date))
            .max();

        let mut stocks: Vec<StockHolding> = raw
            .into_iter()
            .filter(|h| !h.code.trim().is_empty())
            .map(|h| StockHolding {
                code: h.code.trim().to_string(),
                name: h.name.trim().to_string(),
                weight: if h.weight.is_finite() { h.weight.max(0.0) } else { 0.0 },
            })
            .collect();
        stocks.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        FundHoldings {
            fund_code: fund_code.to_string(),
            stocks,
            report_date,
        }
    }
}

impl Default for FundBuilder {
    fn default() -> Self {
        Self::today()
    }
}

fn risk_metrics(raw: &RawFundInfo) -> RiskMetrics {
    let mut stddev: BTreeMap<Period, f64> = BTreeMap::new();
    let mut sharpe: BTreeMap<Period, f64> = BTreeMap::new();
    let mut drawdown: BTreeMap<Period, f64> = BTreeMap::new();

    for stat in &raw.risk_stats {
        let period = match Period::from_label(&stat.period) {
            Some(p @ (Period::Year1 | Period::Year3 | Period::Year5)) => p,
            _ => continue,
        };
        if let Some(v) = stat.stddev.filter(|v| v.is_finite()) {
            stddev.insert(period, v);
        }
        if let Some(v) = stat.sharpe.filter(|v| v.is_finite()) {
            sharpe.insert(period, v);
        }
        if let Some(v) = stat.max_retracement.filter(|v| v.is_finite()) {
            drawdown.insert(period, v);
        }
    }

    let windowed = |m: &BTreeMap<Period, f64>| {
        WindowedMetric::new(
            m.get(&Period::Year1).copied(),
            m.get(&Period::Year3).copied(),
            m.get(&Period::Year5).copied(),
        )
    };

    RiskMetrics {
        stddev: windowed(&stddev),
        sharpe: windowed(&sharpe),
        max_drawdown: windowed(&drawdown),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{RawManager, RawPerformance, RawRiskStat};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn raw() -> RawFundInfo {
        RawFundInfo {
            code: " 000001 ".into(),
            name: "华夏成长混合".into(),
            fund_type: "混合型".into(),
            establish_date: Some("2001-12-18".into()),
            net_assets: Some(3_250_000_000.0),
            manager: Some(RawManager {
                name: "张三".into(),
                start_date: Some("20180630".into()),
            }),
            net_value: Some(1.234),
            net_value_date: Some("2024-06-28".into()),
            performances: vec![
                RawPerformance {
                    period: "1N".into(),
                    profit_ratio: Some(12.5),
                    rank: Some(50),
                    peer_count: Some(1000),
                },
                RawPerformance {
                    period: "3m".into(),
                    profit_ratio: Some(-1.5),
                    rank: Some(10),
                    peer_count: None,
                },
                RawPerformance {
                    period: "bogus".into(),
                    profit_ratio: Some(99.0),
                    rank: None,
                    peer_count: None,
                },
            ],
            risk_stats: vec![
                RawRiskStat {
                    period: "1y".into(),
                    stddev: Some(20.0),
                    sharpe: Some(1.2),
                    max_retracement: Some(15.0),
                },
                RawRiskStat {
                    period: "3N".into(),
                    stddev: Some(24.0),
                    sharpe: Some(0.8),
                    max_retracement: None,
                },
            ],
        }
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2015, 6, 1);
        assert_eq!(parse_date("2015-06-01"), expected);
        assert_eq!(parse_date("20150601"), expected);
        assert_eq!(parse_date("--"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("June 1st"), None);
    }

    #[test]
    fn test_build_fund() {
        let fund = FundBuilder::new(as_of()).build(raw()).unwrap();

        assert_eq!(fund.code, "000001");
        assert!((fund.net_assets_scale.unwrap() - 32.5).abs() < 1e-9);
        assert!(fund.estab_years.unwrap() > 22.0);

        let tenure = fund.manager_years().unwrap();
        assert!((tenure - 6.0).abs() < 0.01, "tenure was {}", tenure);

        assert_eq!(fund.performance.return_of(Period::Year1), Some(12.5));
        assert_eq!(fund.performance.rank_ratio(Period::Year1), Some(5.0));
        assert_eq!(fund.performance.return_of(Period::Month3), Some(-1.5));
        assert_eq!(fund.performance.rank_ratio(Period::Month3), None);
        assert_eq!(fund.performance.returns.len(), 2);

        assert_eq!(fund.risk.stddev.avg_135, Some(22.0));
        assert_eq!(fund.risk.sharpe.avg_135, Some(1.0));
        assert_eq!(fund.risk.max_drawdown.avg_135, Some(15.0));
        assert_eq!(fund.risk.max_drawdown.year_3, None);
    }

    #[test]
    fn test_build_keeps_manager_alongside_risk() {
        let fund = FundBuilder::new(as_of()).build(raw()).unwrap();

        let manager = fund.manager.as_ref().unwrap();
        assert_eq!(manager.name, "张三");
        assert_eq!(manager.managed_since, NaiveDate::from_ymd_opt(2018, 6, 30));
        assert_eq!(fund.risk.stddev.year_1, Some(20.0));
        assert_eq!(fund.risk.stddev.year_3, Some(24.0));
    }

    #[test]
    fn test_build_rejects_missing_code() {
        let mut payload = raw();
        payload.code = "  ".into();
        let err = FundBuilder::new(as_of()).build(payload).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn test_future_dates_clamp_to_zero_years() {
        let mut payload = raw();
        payload.establish_date = Some("2030-01-01".into());
        let fund = FundBuilder::new(as_of()).build(payload).unwrap();
        assert_eq!(fund.estab_years, Some(0.0));
    }

    #[test]
    fn test_build_holdings() {
        let raw = vec![
            RawStockHolding {
                code: "000858".into(),
                name: "五粮液".into(),
                weight: 6.1,
                report_date: Some("2024-03-31".into()),
            },
            RawStockHolding {
                code: "".into(),
                name: "blank".into(),
                weight: 3.0,
                report_date: None,
            },
            RawStockHolding {
                code: "600519".into(),
                name: "贵州茅台".into(),
                weight: 9.8,
                report_date: Some("2024-03-31".into()),
            },
        ];

        let holdings = FundBuilder::new(as_of()).build_holdings("000001", raw);
        assert_eq!(holdings.stocks.len(), 2);
        assert_eq!(holdings.stocks[0].code, "600519");
        assert_eq!(holdings.report_date, NaiveDate::from_ymd_opt(2024, 3, 31));
    }
}
