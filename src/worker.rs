use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};
use tracing::debug;

use crate::config::FormatVersion;
use crate::diagnostics::RateLimitedReporter;
use crate::error::HookError;
use crate::format::{encode, format};
use crate::sink::ListSink;
use crate::store::Dialer;
use crate::types::LogEvent;

#[cfg(feature = "metrics")]
pub(crate) fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
pub(crate) fn metric_inc(_name: &'static str) {}

/// Counters shared by producers and the worker.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub enqueued: AtomicU64,
    pub dropped: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

/// Single-shot stop signal for the worker.
///
/// Triggering stores a wakeup permit, so a worker that is not parked
/// yet still sees it at its next wait.
#[derive(Debug, Default)]
pub(crate) struct ShutdownSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    /// Returns false if shutdown was already requested.
    pub fn trigger(&self) -> bool {
        let first = !self.requested.swap(true, Ordering::SeqCst);
        self.notify.notify_one();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub async fn wait(&self) {
        while !self.is_triggered() {
            self.notify.notified().await;
        }
    }
}

/// Format + deliver, shared by the synchronous path and the worker.
pub(crate) struct Delivery<D: Dialer> {
    pub key: String,
    pub format: FormatVersion,
    pub sink: ListSink<D>,
    pub counters: Arc<Counters>,
}

impl<D: Dialer> Delivery<D> {
    pub async fn process(&self, event: &LogEvent) -> Result<(), HookError> {
        let result = self.send(event).await;
        match result {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                metric_inc("redis_hook.delivery.success");
            }
            Err(_) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                metric_inc("redis_hook.delivery.failure");
            }
        }
        result
    }

    async fn send(&self, event: &LogEvent) -> Result<(), HookError> {
        let envelope = format(event, self.format);
        let payload = encode(&envelope)?;
        self.sink.deliver(&payload, &self.key).await
    }
}

pub(crate) struct WorkerContext<D: Dialer> {
    pub delivery: Arc<Delivery<D>>,
    pub shutdown: Arc<ShutdownSignal>,
    /// Shared with the producers, which only count.
    pub drops: Arc<RateLimitedReporter>,
    pub failures: RateLimitedReporter,
}

/// Background drain loop.
///
/// Takes one event per wake and delivers it. Stops as soon as shutdown
/// is requested, leaving anything still queued undelivered, or when
/// every sender is gone. Failures are reported and the loop goes on.
/// Drops counted by producers are reported here, on every wake and once
/// more on the way out.
pub(crate) async fn worker_loop<D: Dialer>(
    mut rx: mpsc::Receiver<LogEvent>,
    ctx: WorkerContext<D>,
) {
    debug!(key = %ctx.delivery.key, "redis hook worker started");

    loop {
        let event = tokio::select! {
            biased;
            _ = ctx.shutdown.wait() => break,
            event = rx.recv() => event,
        };

        let Some(event) = event else { break };

        if ctx.shutdown.is_triggered() {
            break;
        }

        ctx.drops.report_drops("queue full");

        if let Err(err) = ctx.delivery.process(&event).await {
            ctx.failures.failed(&err);
        }
    }

    ctx.drops.report_drops("queue full");
    debug!("redis hook worker stopped");
}
