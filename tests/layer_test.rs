mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{wait_until, CaptureLayer};
use redis_log_hook::{HookConfig, HookError, InMemoryStore, Level, RedisHook, RedisLayer};
use serde_json::Value;
use tracing_subscriber::prelude::*;

#[tokio::test]
async fn ships_tracing_events_at_or_above_threshold() {
    let store = InMemoryStore::new();
    let config = HookConfig::new("localhost", 6379, "app_logs")
        .with_format("v1")
        .with_min_level(Level::Info)
        .with_async(100);
    let hook = Arc::new(RedisHook::with_dialer(config, store.clone()).await.unwrap());

    let subscriber = tracing_subscriber::registry().with(RedisLayer::new(hook.clone()).unwrap());
    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!("below threshold");
        tracing::info!(animal = "walrus", number = 1, "and with fields");
        tracing::warn!(retry = true, "disk almost full");
    });

    wait_until(|| store.len("app_logs") == 2).await;

    let messages: Vec<Value> = store
        .list("app_logs")
        .iter()
        .map(|raw| serde_json::from_slice(raw).unwrap())
        .collect();

    assert_eq!(messages[0]["message"], "and with fields");
    assert_eq!(messages[0]["@fields"]["level"], "info");
    assert_eq!(messages[0]["@custom_fields"]["animal"], "walrus");
    assert_eq!(messages[0]["@custom_fields"]["number"], "1");

    assert_eq!(messages[1]["message"], "disk almost full");
    assert_eq!(messages[1]["@fields"]["level"], "warning");
    assert_eq!(messages[1]["@custom_fields"]["retry"], "true");

    hook.shutdown_and_wait().await;
}

#[tokio::test]
async fn overflow_through_layer_is_reported() {
    let store = InMemoryStore::new();
    store.set_latency(Duration::from_millis(200));
    let config = HookConfig::new("localhost", 6379, "app_logs").with_async(1);
    let hook = Arc::new(RedisHook::with_dialer(config, store.clone()).await.unwrap());

    // Held across awaits: the worker shares this thread and logs through it.
    let capture = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry()
        .with(capture.clone())
        .with(RedisLayer::new(hook.clone()).unwrap());
    let _guard = tracing::subscriber::set_default(subscriber);

    for i in 0..5 {
        tracing::info!(attempt = i, "burst");
    }
    assert_eq!(hook.stats().enqueued, 1);
    assert_eq!(hook.stats().dropped, 4);

    wait_until(|| capture.contains("log entry discarded")).await;
    assert!(capture
        .lines()
        .iter()
        .any(|line| line.starts_with("redis_log_hook::diagnostics") && line.contains("dropped_count=4")));

    wait_until(|| store.len("app_logs") == 1).await;
    hook.shutdown_and_wait().await;
}

#[tokio::test]
async fn layer_rejects_sync_hook() {
    let hook = RedisHook::with_dialer(HookConfig::new("localhost", 6379, "app_logs"), InMemoryStore::new())
        .await
        .unwrap();

    assert!(matches!(RedisLayer::new(Arc::new(hook)), Err(HookError::NotAsync)));
}
