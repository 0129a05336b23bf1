use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::HookConfig;
use crate::diagnostics::RateLimitedReporter;
use crate::error::HookError;
use crate::pool::ConnectionPool;
use crate::sink::ListSink;
use crate::store::Dialer;
use crate::store_redis::RedisDialer;
use crate::types::{EnabledLevels, Level, LogEvent};
use crate::worker::{metric_inc, worker_loop, Counters, Delivery, ShutdownSignal, WorkerContext};

/// Point-in-time hook counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookStats {
    /// Accepted into the async queue.
    pub enqueued: u64,
    /// Discarded because the queue was full or the hook was shut down.
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
}

enum Mode {
    Sync,
    Async {
        queue: mpsc::Sender<LogEvent>,
        shutdown: Arc<ShutdownSignal>,
        worker: Mutex<Option<JoinHandle<()>>>,
    },
}

/// Ships log events to a Redis list.
///
/// In sync mode [`fire`](Self::fire) formats and pushes on the calling
/// task. In async mode it only tries to enqueue: a full queue drops the
/// event and `fire` still succeeds, so producers never wait on the store.
/// A single background task drains the queue.
pub struct RedisHook<D: Dialer = RedisDialer> {
    config: HookConfig,
    levels: EnabledLevels,
    delivery: Arc<Delivery<D>>,
    counters: Arc<Counters>,
    drops: Arc<RateLimitedReporter>,
    mode: Mode,
}

impl RedisHook<RedisDialer> {
    /// Connect to the Redis server named in `config`.
    ///
    /// Fails with [`HookError::InitConnectFailed`] if the server cannot
    /// be reached.
    pub async fn connect(config: HookConfig) -> Result<Self, HookError> {
        let dialer = RedisDialer::new(&config.host, config.port).map_err(|source| {
            HookError::InitConnectFailed {
                addr: config.addr(),
                source,
            }
        })?;
        Self::with_dialer(config, dialer).await
    }
}

impl<D: Dialer> RedisHook<D> {
    /// Build a hook over any store backend.
    ///
    /// Borrows one connection and PINGs it before anything else. In
    /// async mode the worker is spawned on the current tokio runtime.
    pub async fn with_dialer(config: HookConfig, dialer: D) -> Result<Self, HookError> {
        let pool = Arc::new(ConnectionPool::new(dialer, &config.pool));
        if let Err(source) = pool.check().await {
            return Err(HookError::InitConnectFailed {
                addr: pool.addr(),
                source,
            });
        }

        let counters = Arc::new(Counters::default());
        let delivery = Arc::new(Delivery {
            key: config.key.clone(),
            format: config.format,
            sink: ListSink::new(pool),
            counters: counters.clone(),
        });

        let drops = Arc::new(RateLimitedReporter::default());
        let mode = if config.async_delivery {
            let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
            let shutdown = Arc::new(ShutdownSignal::default());
            let handle = tokio::spawn(worker_loop(
                rx,
                WorkerContext {
                    delivery: delivery.clone(),
                    shutdown: shutdown.clone(),
                    drops: drops.clone(),
                    failures: RateLimitedReporter::default(),
                },
            ));
            Mode::Async {
                queue,
                shutdown,
                worker: Mutex::new(Some(handle)),
            }
        } else {
            Mode::Sync
        };

        debug!(
            addr = %delivery.sink.pool().addr(),
            key = %config.key,
            format = %config.format,
            async_delivery = config.async_delivery,
            "redis hook ready"
        );

        Ok(Self {
            levels: EnabledLevels::at_or_above(config.min_level),
            config,
            delivery,
            counters,
            drops,
            mode,
        })
    }

    /// Levels this hook should receive: the configured minimum and
    /// everything more severe.
    pub fn levels(&self) -> EnabledLevels {
        self.levels.clone()
    }

    /// True if events at `level` should be fired at this hook.
    pub fn accepts(&self, level: Level) -> bool {
        self.levels.contains(level)
    }

    pub fn min_level(&self) -> Level {
        self.config.min_level
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    pub fn is_async(&self) -> bool {
        matches!(self.mode, Mode::Async { .. })
    }

    /// Hand one event to the hook.
    ///
    /// Level filtering is left to the caller, see [`levels`](Self::levels).
    /// Sync mode returns the format or send error. Async mode always
    /// returns `Ok(())`.
    pub async fn fire(&self, event: &LogEvent) -> Result<(), HookError> {
        match &self.mode {
            Mode::Sync => self.delivery.process(event).await,
            Mode::Async { queue, shutdown, .. } => {
                self.enqueue(queue, shutdown, event.clone());
                Ok(())
            }
        }
    }

    /// Non-blocking enqueue for callers outside an async context.
    ///
    /// Only valid in async mode.
    pub fn try_enqueue(&self, event: LogEvent) -> Result<(), HookError> {
        match &self.mode {
            Mode::Sync => Err(HookError::NotAsync),
            Mode::Async { queue, shutdown, .. } => {
                self.enqueue(queue, shutdown, event);
                Ok(())
            }
        }
    }

    fn enqueue(&self, queue: &mpsc::Sender<LogEvent>, shutdown: &ShutdownSignal, event: LogEvent) {
        // No worker left to report these.
        if shutdown.is_triggered() {
            self.record_drop();
            self.drops.report_drops("hook is shut down");
            return;
        }

        match queue.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                metric_inc("redis_hook.dispatch.enqueued");
            }
            // The worker reports these once it gets to the queue.
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.record_drop();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.record_drop();
                if !shutdown.is_triggered() {
                    self.drops.report_drops("worker stopped");
                }
            }
        }
    }

    fn record_drop(&self) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        metric_inc("redis_hook.dispatch.dropped");
        self.drops.count_drop();
    }

    /// Ask the worker to stop at its next wait point.
    ///
    /// Does not wait and does not flush queued events. Calling it again,
    /// or on a sync hook, does nothing.
    pub fn shutdown(&self) {
        if let Mode::Async { shutdown, .. } = &self.mode {
            if shutdown.trigger() {
                debug!(key = %self.config.key, "redis hook shutdown requested");
            }
        }
    }

    /// Like [`shutdown`](Self::shutdown), then wait for the worker to exit.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        let handle = match &self.mode {
            Mode::Async { worker, .. } => worker.lock().take(),
            Mode::Sync => None,
        };
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "redis hook worker ended abnormally");
            }
        }
    }

    pub fn stats(&self) -> HookStats {
        HookStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Events waiting in the async queue. Always 0 in sync mode.
    pub fn queued(&self) -> usize {
        match &self.mode {
            Mode::Async { queue, .. } => queue.max_capacity() - queue.capacity(),
            Mode::Sync => 0,
        }
    }
}

impl<D: Dialer> Drop for RedisHook<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
