//! Budgeted loading tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use capload_core::budget::load_within;
use capload_core::loader::ModuleEntryPoints;
use capload_core::{Error, LoadStrategy};
use capload_sdk::CatalogResult;
use capload_testing::GreeterCapability;
use common::{plugin_dir, stub_host, StubOpener};

fn slow_catalog() -> CatalogResult {
    std::thread::sleep(Duration::from_millis(500));
    capload_testing::catalog()
}

#[tokio::test]
async fn test_load_within_budget() {
    let dir = plugin_dir(&["greeters.mod"]);
    let host = Arc::new(stub_host(
        dir.path(),
        StubOpener::new().with_module("greeters", capload_testing::catalog),
    ));

    let instances =
        load_within::<GreeterCapability, _>(host, LoadStrategy::Standard, Duration::from_secs(10))
            .await
            .unwrap();
    assert_eq!(instances.len(), 2);
}

#[tokio::test]
async fn test_load_exceeding_budget_times_out() {
    let dir = plugin_dir(&["slow.mod"]);
    let host = Arc::new(stub_host(
        dir.path(),
        StubOpener::new().with_entry("slow", ModuleEntryPoints::new(slow_catalog)),
    ));

    let result = load_within::<GreeterCapability, _>(
        host,
        LoadStrategy::Standard,
        Duration::from_millis(20),
    )
    .await;
    match result {
        Err(Error::Timeout(budget)) => assert_eq!(budget, Duration::from_millis(20)),
        other => panic!("expected timeout, got {:?}", other),
    }
}
