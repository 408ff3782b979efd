//! Market data layer.
//!
//! - `provider` - the `MarketDataProvider` trait and its raw payloads
//! - `universe` - the refreshed in-memory fund universe

pub mod provider;
pub mod universe;

pub use provider::{
    with_timeout, MarketDataProvider, ProviderError, RawFundInfo, RawManager, RawPerformance,
    RawRiskStat, RawStockHolding, StockFundamentals,
};
pub use universe::{RefreshReport, UniverseCache, UniverseSnapshot};
