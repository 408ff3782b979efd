//! Fund listing flows over the universe snapshot.
//!
//! Each flow takes one snapshot and runs
//! filter → type filter → sort → paginate on it, returning copies of the
//! shared funds, never the snapshot's own lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use xstock_common::{Result, Validate};

use super::pagination::{PageParams, Pagination};
use crate::data::UniverseCache;
use crate::fund::{FilterStats, FundList, FundSortType, ParamFundListFilter};

// ============================================================================
// Queries
// ============================================================================

/// 4433 shortlist listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundIndexQuery {
    /// Exact fund type, empty for all
    #[serde(default)]
    pub fund_type: String,
    #[serde(default = "default_index_sort")]
    pub sort: FundSortType,
    #[serde(flatten)]
    pub page: PageParams,
}

fn default_index_sort() -> FundSortType {
    FundSortType::Week
}

impl Default for FundIndexQuery {
    fn default() -> Self {
        Self {
            fund_type: String::new(),
            sort: default_index_sort(),
            page: PageParams::default(),
        }
    }
}

/// Free filtering over the whole universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundFilterQuery {
    #[serde(flatten)]
    pub criteria: ParamFundListFilter,
    #[serde(default)]
    pub fund_type: String,
    #[serde(default)]
    pub sort: FundSortType,
    #[serde(flatten)]
    pub page: PageParams,
}

impl Default for FundFilterQuery {
    fn default() -> Self {
        Self {
            criteria: ParamFundListFilter::default(),
            fund_type: String::new(),
            sort: FundSortType::Unsorted,
            page: PageParams::default(),
        }
    }
}

// ============================================================================
// Page
// ============================================================================

/// One page of a fund listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundPage {
    pub funds: FundList,
    pub pagination: Pagination,
    /// Fund types available for the type filter
    pub types: Vec<String>,
    pub synced_at: Option<DateTime<Utc>>,
    pub generation: u64,
    /// Filter counts, for filtered listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<FilterStats>,
}

fn paginate(list: &FundList, page: PageParams) -> (FundList, Pagination) {
    let pagination = Pagination::new(list.len(), page);
    (
        list.slice(pagination.start_index, pagination.end_index),
        pagination,
    )
}

// ============================================================================
// Screener
// ============================================================================

/// Listing flows over the universe cache.
#[derive(Clone)]
pub struct FundScreener {
    cache: Arc<UniverseCache>,
}

impl FundScreener {
    pub fn new(cache: Arc<UniverseCache>) -> Self {
        Self { cache }
    }

    /// Page of the 4433 shortlist.
    pub fn fund_index(&self, query: &FundIndexQuery) -> Result<FundPage> {
        query.page.validate()?;
        let snapshot = self.cache.snapshot();

        let mut list = snapshot.fund_4433.filter_by_type(&query.fund_type);
        list.sort(query.sort);
        let (funds, pagination) = paginate(&list, query.page);

        debug!(
            generation = snapshot.generation,
            fund_type = %query.fund_type,
            sort = %query.sort,
            total = pagination.total_count,
            "Listed 4433 funds"
        );

        Ok(FundPage {
            funds,
            pagination,
            types: snapshot.types_4433.clone(),
            synced_at: snapshot.synced_at,
            generation: snapshot.generation,
            stats: None,
        })
    }

    /// Page of the universe filtered by the query criteria.
    ///
    /// The type list is taken from the filtered funds before the type
    /// filter is applied.
    pub fn fund_filter(&self, query: &FundFilterQuery) -> Result<FundPage> {
        query.criteria.validate()?;
        query.page.validate()?;
        let snapshot = self.cache.snapshot();

        let (filtered, stats) = snapshot.all.filter_with_stats(&query.criteria);
        let types = filtered.types();
        let mut list = filtered.filter_by_type(&query.fund_type);
        list.sort(query.sort);
        let (funds, pagination) = paginate(&list, query.page);

        debug!(
            generation = snapshot.generation,
            input = stats.input,
            passed = stats.passed,
            fund_type = %query.fund_type,
            sort = %query.sort,
            "Filtered funds"
        );

        Ok(FundPage {
            funds,
            pagination,
            types,
            synced_at: snapshot.synced_at,
            generation: snapshot.generation,
            stats: Some(stats),
        })
    }
}
