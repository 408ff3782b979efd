//! Multi-criteria fund filter.
//!
//! Every criterion is optional. `None` leaves the metric unconstrained, and
//! on input both a missing field and `0` deserialize to `None`, so callers
//! keep the "zero means ignore" convention of the screening pages.
//!
//! A fund qualifies only if every set criterion holds. A set criterion
//! whose metric the fund does not report fails that fund.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use xstock_common::validation::collect_errors;
use xstock_common::{Validate, ValidationError, ValidationResult};

use super::{Fund, Period};

/// Periods checked by the this-year/2y/3y/5y rank criterion.
pub const LONG_TERM_PERIODS: [Period; 4] = [
    Period::ThisYear,
    Period::Year2,
    Period::Year3,
    Period::Year5,
];

// ============================================================================
// Criterion
// ============================================================================

/// One filter criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    MinScale,
    MaxScale,
    MinEstabYears,
    MinManagerYears,
    Year1RankRatio,
    ThisYear235RankRatio,
    Month6RankRatio,
    Month3RankRatio,
    Max135AvgStddev,
    Min135AvgSharp,
    Max135AvgRetr,
}

impl Criterion {
    pub const ALL: [Criterion; 11] = [
        Self::MinScale,
        Self::MaxScale,
        Self::MinEstabYears,
        Self::MinManagerYears,
        Self::Year1RankRatio,
        Self::ThisYear235RankRatio,
        Self::Month6RankRatio,
        Self::Month3RankRatio,
        Self::Max135AvgStddev,
        Self::Min135AvgSharp,
        Self::Max135AvgRetr,
    ];

    /// Field name on [`ParamFundListFilter`].
    pub fn field(&self) -> &'static str {
        match self {
            Self::MinScale => "min_scale",
            Self::MaxScale => "max_scale",
            Self::MinEstabYears => "min_estab_years",
            Self::MinManagerYears => "min_manager_years",
            Self::Year1RankRatio => "year_1_rank_ratio",
            Self::ThisYear235RankRatio => "this_year_235_rank_ratio",
            Self::Month6RankRatio => "month_6_rank_ratio",
            Self::Month3RankRatio => "month_3_rank_ratio",
            Self::Max135AvgStddev => "max_135_avg_stddev",
            Self::Min135AvgSharp => "min_135_avg_sharp",
            Self::Max135AvgRetr => "max_135_avg_retr",
        }
    }

    /// Lower bounds pass when the metric is at least the bound.
    pub fn is_lower_bound(&self) -> bool {
        matches!(
            self,
            Self::MinScale | Self::MinEstabYears | Self::MinManagerYears | Self::Min135AvgSharp
        )
    }

    /// The fund metric this criterion constrains.
    ///
    /// For the multi-window rank criterion this is the worst of the four
    /// rank ratios, or `None` if any of them is missing.
    pub fn metric(&self, fund: &Fund) -> Option<f64> {
        let perf = &fund.performance;
        match self {
            Self::MinScale | Self::MaxScale => fund.net_assets_scale,
            Self::MinEstabYears => fund.estab_years,
            Self::MinManagerYears => fund.manager_years(),
            Self::Year1RankRatio => perf.rank_ratio(Period::Year1),
            Self::ThisYear235RankRatio => perf.worst_rank_ratio(&LONG_TERM_PERIODS),
            Self::Month6RankRatio => perf.rank_ratio(Period::Month6),
            Self::Month3RankRatio => perf.rank_ratio(Period::Month3),
            Self::Max135AvgStddev => fund.risk.stddev.avg_135,
            Self::Min135AvgSharp => fund.risk.sharpe.avg_135,
            Self::Max135AvgRetr => fund.risk.max_drawdown.avg_135,
        }
    }

    fn holds(&self, actual: Option<f64>, bound: f64) -> bool {
        match actual {
            Some(v) if self.is_lower_bound() => v >= bound,
            Some(v) => v <= bound,
            None => false,
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

// ============================================================================
// Filter Parameters
// ============================================================================

/// Map `0` and `null` to `None`.
pub(crate) fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| *v != 0.0))
}

/// Fund filter criteria.
///
/// `Default` carries the filter-page defaults, which are also the 4433
/// rule. Deserialized values start from those defaults; an explicit `0`
/// or `null` drops a criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamFundListFilter {
    /// Minimum scale (亿)
    #[serde(deserialize_with = "zero_as_none")]
    pub min_scale: Option<f64>,
    /// Maximum scale (亿)
    #[serde(deserialize_with = "zero_as_none")]
    pub max_scale: Option<f64>,
    /// Minimum years since establishment
    #[serde(deserialize_with = "zero_as_none")]
    pub min_estab_years: Option<f64>,
    /// Minimum manager tenure in years
    #[serde(deserialize_with = "zero_as_none")]
    pub min_manager_years: Option<f64>,
    /// Maximum 1y rank ratio
    #[serde(deserialize_with = "zero_as_none")]
    pub year_1_rank_ratio: Option<f64>,
    /// Maximum rank ratio for this-year, 2y, 3y and 5y
    #[serde(deserialize_with = "zero_as_none")]
    pub this_year_235_rank_ratio: Option<f64>,
    /// Maximum 6m rank ratio
    #[serde(deserialize_with = "zero_as_none")]
    pub month_6_rank_ratio: Option<f64>,
    /// Maximum 3m rank ratio
    #[serde(deserialize_with = "zero_as_none")]
    pub month_3_rank_ratio: Option<f64>,
    /// Maximum 1/3/5y average standard deviation
    #[serde(deserialize_with = "zero_as_none")]
    pub max_135_avg_stddev: Option<f64>,
    /// Minimum 1/3/5y average Sharpe ratio
    #[serde(deserialize_with = "zero_as_none")]
    pub min_135_avg_sharp: Option<f64>,
    /// Maximum 1/3/5y average drawdown
    #[serde(deserialize_with = "zero_as_none")]
    pub max_135_avg_retr: Option<f64>,
}

impl Default for ParamFundListFilter {
    fn default() -> Self {
        Self {
            min_scale: Some(2.0),
            max_scale: Some(50.0),
            min_estab_years: Some(5.0),
            min_manager_years: Some(5.0),
            year_1_rank_ratio: Some(25.0),
            this_year_235_rank_ratio: Some(25.0),
            month_6_rank_ratio: Some(33.33),
            month_3_rank_ratio: Some(33.33),
            max_135_avg_stddev: None,
            min_135_avg_sharp: None,
            max_135_avg_retr: None,
        }
    }
}

impl ParamFundListFilter {
    /// No criterion set; every fund qualifies.
    pub fn unconstrained() -> Self {
        Self {
            min_scale: None,
            max_scale: None,
            min_estab_years: None,
            min_manager_years: None,
            year_1_rank_ratio: None,
            this_year_235_rank_ratio: None,
            month_6_rank_ratio: None,
            month_3_rank_ratio: None,
            max_135_avg_stddev: None,
            min_135_avg_sharp: None,
            max_135_avg_retr: None,
        }
    }

    /// The fixed 4433 shortlist rule.
    pub fn rule_4433() -> Self {
        Self::default()
    }

    /// Bound set for a criterion.
    pub fn bound(&self, criterion: Criterion) -> Option<f64> {
        match criterion {
            Criterion::MinScale => self.min_scale,
            Criterion::MaxScale => self.max_scale,
            Criterion::MinEstabYears => self.min_estab_years,
            Criterion::MinManagerYears => self.min_manager_years,
            Criterion::Year1RankRatio => self.year_1_rank_ratio,
            Criterion::ThisYear235RankRatio => self.this_year_235_rank_ratio,
            Criterion::Month6RankRatio => self.month_6_rank_ratio,
            Criterion::Month3RankRatio => self.month_3_rank_ratio,
            Criterion::Max135AvgStddev => self.max_135_avg_stddev,
            Criterion::Min135AvgSharp => self.min_135_avg_sharp,
            Criterion::Max135AvgRetr => self.max_135_avg_retr,
        }
    }

    /// Set criteria with their bounds.
    pub fn active(&self) -> impl Iterator<Item = (Criterion, f64)> + '_ {
        Criterion::ALL
            .into_iter()
            .filter_map(|c| self.bound(c).map(|b| (c, b)))
    }

    pub fn is_unconstrained(&self) -> bool {
        self.active().next().is_none()
    }

    /// Whether the fund meets every set criterion.
    pub fn matches(&self, fund: &Fund) -> bool {
        self.first_failure(fund).is_none()
    }

    /// First set criterion the fund fails.
    pub fn first_failure(&self, fund: &Fund) -> Option<Criterion> {
        self.active()
            .find(|(c, bound)| !c.holds(c.metric(fund), *bound))
            .map(|(c, _)| c)
    }

    /// Per-criterion report for one fund.
    pub fn evaluate(&self, fund: &Fund) -> FundCriteriaReport {
        let outcomes: Vec<CriterionOutcome> = self
            .active()
            .map(|(criterion, bound)| {
                let actual = criterion.metric(fund);
                CriterionOutcome {
                    criterion,
                    bound,
                    actual,
                    passed: criterion.holds(actual, bound),
                }
            })
            .collect();

        FundCriteriaReport {
            code: fund.code.clone(),
            name: fund.name.clone(),
            passed: outcomes.iter().all(|o| o.passed),
            outcomes,
        }
    }
}

impl Validate for ParamFundListFilter {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        for (criterion, bound) in self.active() {
            if !bound.is_finite() || bound < 0.0 {
                errors.push(ValidationError::InvalidValue {
                    field: criterion.field().into(),
                    reason: format!("{} must be a non-negative number", bound),
                });
            }
        }

        if let (Some(min), Some(max)) = (self.min_scale, self.max_scale) {
            if min > max {
                errors.push(ValidationError::Conflict {
                    reason: format!("min_scale ({}) exceeds max_scale ({})", min, max),
                });
            }
        }

        collect_errors(errors)
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Result of one criterion against one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionOutcome {
    pub criterion: Criterion,
    pub bound: f64,
    /// Fund metric, `None` when the fund does not report it
    pub actual: Option<f64>,
    pub passed: bool,
}

/// Per-criterion pass/fail report for one fund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundCriteriaReport {
    pub code: String,
    pub name: String,
    pub passed: bool,
    pub outcomes: Vec<CriterionOutcome>,
}

impl FundCriteriaReport {
    pub fn failed(&self) -> impl Iterator<Item = &CriterionOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

/// Counts from one filter pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    pub input: usize,
    pub passed: usize,
    pub eliminated: usize,
    /// Elimination rate (%)
    pub elimination_rate: f64,
    /// Funds eliminated, keyed by the first criterion they failed
    pub eliminated_by: BTreeMap<Criterion, usize>,
}

impl FilterStats {
    pub fn new(input: usize, eliminated_by: BTreeMap<Criterion, usize>) -> Self {
        let eliminated: usize = eliminated_by.values().sum();
        let elimination_rate = if input > 0 {
            (eliminated as f64 / input as f64) * 100.0
        } else {
            0.0
        };

        Self {
            input,
            passed: input.saturating_sub(eliminated),
            eliminated,
            elimination_rate,
            eliminated_by,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fund::{FundManager, FundPerformance, RiskMetrics, WindowedMetric};

    fn fund(scale: Option<f64>, rank_1y: Option<f64>) -> Fund {
        let mut performance = FundPerformance::default();
        if let Some(r) = rank_1y {
            performance.rank_ratios.insert(Period::Year1, r);
        }
        Fund {
            code: "000001".into(),
            name: "测试基金".into(),
            fund_type: "股票型".into(),
            established_date: None,
            estab_years: Some(8.0),
            net_assets_scale: scale,
            manager: Some(FundManager {
                name: "李四".into(),
                managed_since: None,
                tenure_years: Some(6.0),
            }),
            net_value: None,
            net_value_date: None,
            performance,
            risk: RiskMetrics {
                stddev: WindowedMetric::new(Some(20.0), None, None),
                ..Default::default()
            },
        }
    }

    fn scale_and_rank() -> ParamFundListFilter {
        ParamFundListFilter {
            min_scale: Some(2.0),
            max_scale: Some(50.0),
            year_1_rank_ratio: Some(25.0),
            ..ParamFundListFilter::unconstrained()
        }
    }

    #[test]
    fn test_default_is_filter_page_defaults() {
        let f = ParamFundListFilter::default();
        assert_eq!(f.min_scale, Some(2.0));
        assert_eq!(f.max_scale, Some(50.0));
        assert_eq!(f.min_manager_years, Some(5.0));
        assert_eq!(f.month_6_rank_ratio, Some(33.33));
        assert_eq!(f.month_3_rank_ratio, Some(33.33));
        assert_eq!(f.max_135_avg_stddev, None);
        assert_eq!(f.active().count(), 8);
    }

    #[test]
    fn test_missing_fields_take_defaults_and_zero_drops() {
        let f: ParamFundListFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(f, ParamFundListFilter::default());
        assert_eq!(f.active().count(), 8);

        let f: ParamFundListFilter =
            serde_json::from_str(r#"{"min_scale": 0, "max_scale": 40.0, "year_1_rank_ratio": null}"#)
                .unwrap();
        assert_eq!(f.min_scale, None);
        assert_eq!(f.max_scale, Some(40.0));
        assert_eq!(f.year_1_rank_ratio, None);
        assert_eq!(f.min_estab_years, Some(5.0));
        assert_eq!(f.active().count(), 6);
    }

    #[test]
    fn test_month_rank_bound_is_exact() {
        let mut f = fund(Some(10.0), Some(10.0));
        f.performance.rank_ratios.insert(Period::Month6, 33.332);
        let filter = ParamFundListFilter {
            month_6_rank_ratio: ParamFundListFilter::default().month_6_rank_ratio,
            ..ParamFundListFilter::unconstrained()
        };
        assert!(!filter.matches(&f));

        f.performance.rank_ratios.insert(Period::Month6, 33.33);
        assert!(filter.matches(&f));
    }

    #[test]
    fn test_and_semantics() {
        let filter = scale_and_rank();
        assert!(filter.matches(&fund(Some(10.0), Some(20.0))));
        assert!(filter.matches(&fund(Some(2.0), Some(25.0))));
        assert!(!filter.matches(&fund(Some(1.0), Some(20.0))));
        assert!(!filter.matches(&fund(Some(60.0), Some(20.0))));
        assert!(!filter.matches(&fund(Some(10.0), Some(30.0))));
    }

    #[test]
    fn test_missing_metric_fails_set_criterion() {
        let filter = scale_and_rank();
        assert!(!filter.matches(&fund(None, Some(20.0))));
        assert_eq!(
            filter.first_failure(&fund(Some(10.0), None)),
            Some(Criterion::Year1RankRatio)
        );
    }

    #[test]
    fn test_unconstrained_matches_everything() {
        let filter = ParamFundListFilter::unconstrained();
        assert!(filter.is_unconstrained());
        assert!(filter.matches(&fund(None, None)));
    }

    #[test]
    fn test_long_term_rank_uses_worst_period() {
        let mut f = fund(Some(10.0), Some(10.0));
        for (p, r) in [
            (Period::ThisYear, 5.0),
            (Period::Year2, 10.0),
            (Period::Year3, 24.0),
            (Period::Year5, 26.0),
        ] {
            f.performance.rank_ratios.insert(p, r);
        }
        let filter = ParamFundListFilter {
            this_year_235_rank_ratio: Some(25.0),
            ..ParamFundListFilter::unconstrained()
        };
        assert!(!filter.matches(&f));

        f.performance.rank_ratios.insert(Period::Year5, 25.0);
        assert!(filter.matches(&f));
    }

    #[test]
    fn test_evaluate_report() {
        let filter = ParamFundListFilter {
            max_135_avg_stddev: Some(15.0),
            ..scale_and_rank()
        };
        let report = filter.evaluate(&fund(Some(10.0), Some(20.0)));

        assert!(!report.passed);
        assert_eq!(report.outcomes.len(), 4);
        let failed: Vec<_> = report.failed().map(|o| o.criterion).collect();
        assert_eq!(failed, vec![Criterion::Max135AvgStddev]);
        assert_eq!(report.outcomes[3].actual, Some(20.0));
    }

    #[test]
    fn test_validate() {
        assert!(ParamFundListFilter::default().validate().is_ok());

        let negative = ParamFundListFilter {
            min_estab_years: Some(-1.0),
            ..ParamFundListFilter::unconstrained()
        };
        assert!(matches!(
            negative.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));

        let inverted = ParamFundListFilter {
            min_scale: Some(60.0),
            ..ParamFundListFilter::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(ValidationError::Conflict { .. })
        ));
    }

    #[test]
    fn test_filter_stats() {
        let mut by = BTreeMap::new();
        by.insert(Criterion::MinScale, 3);
        by.insert(Criterion::Year1RankRatio, 1);
        let stats = FilterStats::new(8, by);
        assert_eq!(stats.passed, 4);
        assert_eq!(stats.eliminated, 4);
        assert!((stats.elimination_rate - 50.0).abs() < 1e-9);
    }
}
