//! Integration tests for the universe cache, the refresher and the
//! service lifecycle.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use common::{codes, config, state, FundSpec, MockProvider};
use xstock_fund::data::{MarketDataProvider, UniverseCache};
use xstock_fund::FundService;

fn specs(n: usize) -> Vec<FundSpec> {
    codes(n).iter().map(|c| FundSpec::new(c.as_str())).collect()
}

// ============================================================================
// Refresh
// ============================================================================

#[tokio::test]
async fn test_refresh_installs_first_generation() {
    let provider = Arc::new(MockProvider::new(specs(5)));
    let state = state(&provider);
    assert_eq!(state.cache.generation(), 0);
    assert!(state.cache.snapshot().is_empty());

    let report = assert_ok!(state.cache.refresh_now(state.provider.as_ref()).await);

    assert_eq!(report.generation, 1);
    assert_eq!(report.listed, 5);
    assert_eq!(report.built, 5);
    assert_eq!(report.failed, 0);
    assert_eq!(report.fund_4433, 5);

    let snapshot = state.cache.snapshot();
    assert_eq!(snapshot.generation, 1);
    assert!(snapshot.get("000003").is_some());
    assert!(snapshot.synced_at.is_some());
}

#[tokio::test]
async fn test_failed_listing_keeps_previous_snapshot() {
    let provider = Arc::new(MockProvider::new(specs(3)));
    let state = state(&provider);
    state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .unwrap();

    provider.set_fail_listing(true);
    provider.set_funds(specs(10));
    let err = state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 502);
    let snapshot = state.cache.snapshot();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.len(), 3);
}

#[tokio::test]
async fn test_refresh_with_no_buildable_fund_fails() {
    let provider = Arc::new(MockProvider::new(specs(3)));
    for code in codes(3) {
        provider.fail_info(&code);
    }
    let state = state(&provider);

    let err = assert_err!(state.cache.refresh_now(state.provider.as_ref()).await);

    assert_eq!(err.status_code(), 502);
    assert_eq!(state.cache.generation(), 0);
}

#[tokio::test]
async fn test_individual_failures_are_skipped() {
    let provider = Arc::new(MockProvider::new(specs(4)));
    provider.fail_info("000002");
    let state = state(&provider);

    let report = state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .unwrap();

    assert_eq!(report.listed, 4);
    assert_eq!(report.built, 3);
    assert_eq!(report.failed, 1);
    assert!(state.cache.snapshot().get("000002").is_none());
}

#[tokio::test]
async fn test_duplicate_listing_fetched_once() {
    let mut listed = specs(3);
    listed.push(FundSpec::new("000001"));
    let provider = Arc::new(MockProvider::new(listed));
    let state = state(&provider);

    let report = state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .unwrap();

    assert_eq!(report.listed, 3);
    assert_eq!(MockProvider::calls(&provider.info_calls), 3);
}

#[tokio::test]
async fn test_held_snapshot_survives_refresh() {
    let provider = Arc::new(MockProvider::new(specs(3)));
    let state = state(&provider);
    state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .unwrap();
    let held = state.cache.snapshot();

    provider.set_funds(specs(8));
    state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .unwrap();

    assert_eq!(held.generation, 1);
    assert_eq!(held.len(), 3);
    assert_eq!(held.fund_4433.len(), 3);

    let current = state.cache.snapshot();
    assert_eq!(current.generation, 2);
    assert_eq!(current.len(), 8);
}

#[tokio::test]
async fn test_concurrent_refreshes_serialize() {
    let provider = Arc::new(MockProvider::new(specs(4)));
    let cache = Arc::new(UniverseCache::new(&config()));
    let dyn_provider: Arc<dyn MarketDataProvider> = provider.clone();

    let (a, b) = tokio::join!(
        cache.refresh_now(dyn_provider.as_ref()),
        cache.refresh_now(dyn_provider.as_ref())
    );

    let mut generations = vec![a.unwrap().generation, b.unwrap().generation];
    generations.sort();
    assert_eq!(generations, vec![1, 2]);
    assert_eq!(cache.generation(), 2);
}

// ============================================================================
// Refresher
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresher_picks_up_new_funds() {
    let provider = Arc::new(MockProvider::new(specs(2)));
    let state = state(&provider);
    state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .unwrap();

    let token = CancellationToken::new();
    let handle = Arc::clone(&state.cache).spawn_refresher(
        Arc::clone(&state.provider),
        Duration::from_secs(60),
        token.clone(),
    );

    provider.set_funds(specs(6));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(state.cache.generation(), 1);

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(state.cache.generation(), 2);
    assert_eq!(state.cache.snapshot().len(), 6);

    token.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refresher_survives_failed_refresh() {
    let provider = Arc::new(MockProvider::new(specs(2)));
    let state = state(&provider);
    state
        .cache
        .refresh_now(state.provider.as_ref())
        .await
        .unwrap();

    let token = CancellationToken::new();
    let handle = Arc::clone(&state.cache).spawn_refresher(
        Arc::clone(&state.provider),
        Duration::from_secs(60),
        token.clone(),
    );

    provider.set_fail_listing(true);
    tokio::time::sleep(Duration::from_secs(70)).await;
    assert_eq!(state.cache.generation(), 1);

    provider.set_fail_listing(false);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(state.cache.generation(), 2);

    token.cancel();
    handle.await.unwrap();
}

// ============================================================================
// Service
// ============================================================================

#[tokio::test]
async fn test_service_start_and_shutdown() {
    let provider = Arc::new(MockProvider::new(specs(3)));
    let mut service = FundService::new(config(), provider.clone()).unwrap();

    service.start().await.unwrap();
    assert_eq!(service.state().cache.generation(), 1);
    assert!(service.start().await.is_err());

    let token = service.cancellation_token();
    service.shutdown().await;
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_service_starts_despite_failed_initial_load() {
    let provider = Arc::new(MockProvider::new(specs(3)));
    provider.set_fail_listing(true);
    let mut service = FundService::new(config(), provider.clone()).unwrap();

    service.start().await.unwrap();
    let state = service.state();
    assert_eq!(state.cache.generation(), 0);
    assert!(state.cache.snapshot().is_empty());

    service.shutdown().await;
}

#[test]
fn test_service_rejects_invalid_config() {
    let provider = Arc::new(MockProvider::new(Vec::new()));
    let mut cfg = config();
    cfg.refresh_concurrency = 0;

    assert!(FundService::new(cfg, provider).is_err());
}
