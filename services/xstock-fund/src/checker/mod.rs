//! Fund holdings checker.
//!
//! - `options` - fund criteria, per-stock thresholds and verdict policy
//! - `stock` - the per-holding `StockChecker` collaborator
//! - `policy` - per-stock outcomes to fund verdict
//! - `engine` - single-fund and batch holdings checks
//! - `similarity` - pairwise holdings overlap

pub mod engine;
pub mod options;
pub mod policy;
pub mod similarity;
pub mod stock;

pub use engine::{BatchCheckReport, Checker, FailedCheck, FundStocksCheckResult, DEFAULT_MAX_BATCH};
pub use options::{CheckerOptions, FundCheckOptions, StockCheckerOptions};
pub use policy::{Verdict, VerdictPolicy};
pub use similarity::{
    holdings_similarity, FundSimilarity, PartialDataWarning, SimilarityResult,
};
pub use stock::{
    evaluate_fundamentals, FundamentalsStockChecker, Severity, StockCheckOutcome, StockChecker,
    Violation,
};
