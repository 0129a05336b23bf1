#![allow(dead_code)]

use std::fmt::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use redis_log_hook::{Level, LogEvent};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// The walrus event from the logrus README.
pub fn walrus_event() -> LogEvent {
    LogEvent::new(Level::Info, "and with fields")
        .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        .with_field("animal", "walrus")
        .with_field("number", 1)
        .with_field("size", 10)
}

/// Poll `cond` until it holds, failing the test after five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// Records every event as `target message key=value ...`.
#[derive(Clone, Default)]
pub struct CaptureLayer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CaptureLayer {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

struct LineVisitor(String);

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, " {:?}", value);
        } else {
            let _ = write!(self.0, " {}={:?}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor(event.metadata().target().to_string());
        event.record(&mut visitor);
        self.lines.lock().push(visitor.0);
    }
}
