//! Ordered collection of shared funds.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::sync::Arc;

use super::{FilterStats, Fund, FundSortType, ParamFundListFilter};

/// Ordered list of funds.
///
/// Funds are shared, so filtering and slicing copy pointers only. All
/// operations except [`FundList::sort`] return new lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundList(Vec<Arc<Fund>>);

impl FundList {
    pub fn new(funds: Vec<Arc<Fund>>) -> Self {
        Self(funds)
    }

    pub fn into_inner(self) -> Vec<Arc<Fund>> {
        self.0
    }

    /// Funds meeting every set criterion, in input order.
    pub fn filter(&self, criteria: &ParamFundListFilter) -> FundList {
        self.filter_with_stats(criteria).0
    }

    /// Like [`FundList::filter`], also counting eliminations per criterion.
    pub fn filter_with_stats(&self, criteria: &ParamFundListFilter) -> (FundList, FilterStats) {
        let mut eliminated_by = BTreeMap::new();
        let mut passed = Vec::new();

        for fund in &self.0 {
            match criteria.first_failure(fund) {
                None => passed.push(Arc::clone(fund)),
                Some(c) => *eliminated_by.entry(c).or_insert(0) += 1,
            }
        }

        (FundList(passed), FilterStats::new(self.0.len(), eliminated_by))
    }

    /// Funds of exactly this type; an empty type keeps everything.
    pub fn filter_by_type(&self, fund_type: &str) -> FundList {
        let fund_type = fund_type.trim();
        if fund_type.is_empty() {
            return self.clone();
        }
        FundList(
            self.0
                .iter()
                .filter(|f| f.fund_type == fund_type)
                .cloned()
                .collect(),
        )
    }

    /// Distinct non-empty fund types, sorted.
    pub fn types(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|f| !f.fund_type.is_empty())
            .map(|f| f.fund_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Stable in-place sort.
    pub fn sort(&mut self, sort: FundSortType) {
        if sort.is_unsorted() {
            return;
        }
        self.0.sort_by(|a, b| sort.compare(a, b));
    }

    /// Sorted copy.
    pub fn sorted(&self, sort: FundSortType) -> FundList {
        let mut list = self.clone();
        list.sort(sort);
        list
    }

    pub fn find(&self, code: &str) -> Option<&Arc<Fund>> {
        self.0.iter().find(|f| f.code == code)
    }

    pub fn codes(&self) -> Vec<String> {
        self.0.iter().map(|f| f.code.clone()).collect()
    }

    /// Copy of `start..end`, clamped to the list bounds.
    pub fn slice(&self, start: usize, end: usize) -> FundList {
        let end = end.min(self.0.len());
        let start = start.min(end);
        FundList(self.0[start..end].to_vec())
    }
}

impl Deref for FundList {
    type Target = [Arc<Fund>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Fund>> for FundList {
    fn from(funds: Vec<Fund>) -> Self {
        Self(funds.into_iter().map(Arc::new).collect())
    }
}

impl FromIterator<Arc<Fund>> for FundList {
    fn from_iter<I: IntoIterator<Item = Arc<Fund>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FundList {
    type Item = Arc<Fund>;
    type IntoIter = std::vec::IntoIter<Arc<Fund>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FundList {
    type Item = &'a Arc<Fund>;
    type IntoIter = std::slice::Iter<'a, Arc<Fund>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
