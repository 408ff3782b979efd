//! Query flows the HTTP layer calls.
//!
//! - `engine` - 4433 index and free filtering over the snapshot
//! - `check` - code lookup, criteria report and holdings check
//! - `pagination` - page parameters and descriptors

pub mod check;
pub mod engine;
pub mod pagination;

pub use check::{run_fund_check, FundCheckQuery, FundCheckReport};
pub use engine::{FundFilterQuery, FundIndexQuery, FundPage, FundScreener};
pub use pagination::{PageParams, Pagination};
