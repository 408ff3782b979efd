//! In-memory fund universe.
//!
//! The universe is held as an immutable [`UniverseSnapshot`] behind a
//! pointer swap. A refresh builds a complete new snapshot off to the side
//! and replaces the pointer in one step, so a reader holding a snapshot
//! always sees the lists, types and sync time of a single generation.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xstock_common::{Error, FundConfig, Result, ResultExt};

use super::provider::{with_timeout, MarketDataProvider};
use crate::fund::{Fund, FundBuilder, FundList, ParamFundListFilter};

// ============================================================================
// Snapshot
// ============================================================================

/// One generation of the fund universe.
#[derive(Debug, Clone)]
pub struct UniverseSnapshot {
    /// Refresh generation, 0 before the first successful refresh
    pub generation: u64,
    /// Every fund, in provider listing order
    pub all: FundList,
    /// Funds meeting the 4433 rule
    pub fund_4433: FundList,
    /// Distinct types among the 4433 funds
    pub types_4433: Vec<String>,
    /// When this generation was built
    pub synced_at: Option<DateTime<Utc>>,
    index: HashMap<String, usize>,
}

impl UniverseSnapshot {
    /// Empty generation-0 snapshot.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            all: FundList::default(),
            fund_4433: FundList::default(),
            types_4433: Vec::new(),
            synced_at: None,
            index: HashMap::new(),
        }
    }

    /// Build a snapshot; later duplicates of a code are dropped.
    pub fn build(
        generation: u64,
        funds: Vec<Fund>,
        rule_4433: &ParamFundListFilter,
        synced_at: DateTime<Utc>,
    ) -> Self {
        let mut index = HashMap::with_capacity(funds.len());
        let mut all = Vec::with_capacity(funds.len());

        for fund in funds {
            if index.contains_key(&fund.code) {
                debug!(code = %fund.code, "Duplicate fund code dropped");
                continue;
            }
            index.insert(fund.code.clone(), all.len());
            all.push(Arc::new(fund));
        }

        let all = FundList::new(all);
        let fund_4433 = all.filter(rule_4433);
        let types_4433 = fund_4433.types();

        Self {
            generation,
            all,
            fund_4433,
            types_4433,
            synced_at: Some(synced_at),
            index,
        }
    }

    pub fn get(&self, code: &str) -> Option<&Arc<Fund>> {
        self.index.get(code).and_then(|i| self.all.get(*i))
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

impl Default for UniverseSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Refresh Report
// ============================================================================

/// Outcome of one successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub generation: u64,
    /// Distinct codes listed by the provider
    pub listed: usize,
    /// Funds in the new snapshot
    pub built: usize,
    /// Funds skipped because their fetch or build failed
    pub failed: usize,
    /// Funds in the new 4433 shortlist
    pub fund_4433: usize,
    pub elapsed_ms: u64,
}

// ============================================================================
// Universe Cache
// ============================================================================

/// Owner of the current universe snapshot.
pub struct UniverseCache {
    current: RwLock<Arc<UniverseSnapshot>>,
    generation: AtomicU64,
    refresh_lock: Mutex<()>,
    rule_4433: ParamFundListFilter,
    timeout: Duration,
    concurrency: usize,
}

impl UniverseCache {
    /// Create an empty cache.
    pub fn new(config: &FundConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(UniverseSnapshot::empty())),
            generation: AtomicU64::new(0),
            refresh_lock: Mutex::new(()),
            rule_4433: ParamFundListFilter::rule_4433(),
            timeout: config.provider_timeout(),
            concurrency: config.refresh_concurrency.max(1),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<UniverseSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Build a new generation from already-built funds and swap it in.
    ///
    /// The generation number is taken and published under the write lock,
    /// so the installed snapshot always carries the latest generation.
    pub fn install(&self, funds: Vec<Fund>) -> Arc<UniverseSnapshot> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let generation = guard.generation + 1;
        let snapshot = Arc::new(UniverseSnapshot::build(
            generation,
            funds,
            &self.rule_4433,
            Utc::now(),
        ));

        *guard = Arc::clone(&snapshot);
        self.generation.store(generation, Ordering::SeqCst);
        snapshot
    }

    /// Refresh the universe from the provider.
    ///
    /// Concurrent calls run one after another. On error the previous
    /// snapshot stays in place.
    pub async fn refresh_now(&self, provider: &dyn MarketDataProvider) -> Result<RefreshReport> {
        let _guard = self.refresh_lock.lock().await;
        let started = Instant::now();

        let mut codes = with_timeout(self.timeout, provider.list_fund_codes())
            .await
            .context(format!("listing fund codes from {}", provider.name()))?;
        let mut seen = std::collections::HashSet::new();
        codes.retain(|c| {
            let c = c.trim();
            !c.is_empty() && seen.insert(c.to_string())
        });
        let listed = codes.len();

        debug!(
            provider = provider.name(),
            listed,
            concurrency = self.concurrency,
            "Fetching fund info"
        );

        let timeout = self.timeout;
        let results: Vec<_> = stream::iter(codes)
            .map(|code| async move {
                let code = code.trim().to_string();
                let result = with_timeout(timeout, provider.query_fund_info(&code)).await;
                (code, result)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let builder = FundBuilder::today();
        let mut funds = Vec::with_capacity(results.len());
        let mut failed = 0;

        for (code, result) in results {
            match result.and_then(|raw| builder.build(raw)) {
                Ok(fund) => funds.push(fund),
                Err(e) => {
                    failed += 1;
                    warn!(code = %code, error = %e, "Skipping fund during refresh");
                }
            }
        }

        if funds.is_empty() {
            return Err(Error::Upstream(format!(
                "refresh from {} produced no funds ({} listed, {} failed)",
                provider.name(),
                listed,
                failed
            )));
        }

        let snapshot = self.install(funds);
        let report = RefreshReport {
            generation: snapshot.generation,
            listed,
            built: snapshot.len(),
            failed,
            fund_4433: snapshot.fund_4433.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            generation = report.generation,
            built = report.built,
            failed = report.failed,
            fund_4433 = report.fund_4433,
            elapsed_ms = report.elapsed_ms,
            "Fund universe refreshed"
        );

        Ok(report)
    }

    /// Spawn the periodic refresher.
    ///
    /// The first refresh runs one `interval` after the call. The task exits
    /// when `token` is cancelled, abandoning any refresh in progress.
    pub fn spawn_refresher(
        self: Arc<Self>,
        provider: Arc<dyn MarketDataProvider>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = self;
        let period = interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            info!(interval_secs = period.as_secs(), "Starting universe refresher");

            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    result = cache.refresh_now(provider.as_ref()) => {
                        if let Err(e) = result {
                            warn!(
                                error = %e,
                                generation = cache.generation(),
                                "Universe refresh failed, keeping previous snapshot"
                            );
                        }
                    }
                }
            }

            info!("Universe refresher stopping");
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
