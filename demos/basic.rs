use std::sync::Arc;

use redis_log_hook::{HookConfig, Level, RedisHook, RedisLayer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    let config = HookConfig::new("localhost", 6379, "my_redis_key")
        .with_format("v0")
        .with_min_level(Level::Info)
        .with_async(1_000);

    let hook = match RedisHook::connect(config).await {
        Ok(hook) => Some(Arc::new(hook)),
        Err(err) => {
            eprintln!("redis hook disabled: {err}");
            None
        }
    };

    let redis_layer = hook.clone().and_then(|hook| RedisLayer::new(hook).ok());

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(redis_layer)
        .init();

    tracing::info!("just some info logging...");
    tracing::info!(animal = "walrus", number = 1, size = 10, "and with fields");

    if let Some(hook) = hook {
        // Give the worker a moment before stopping it; shutdown does not flush.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        hook.shutdown_and_wait().await;
        println!("{:?}", hook.stats());
    }
}
