use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};

use crate::error::HookError;
use crate::hook::RedisHook;
use crate::store::Dialer;
use crate::store_redis::RedisDialer;
use crate::types::{FieldValue, Level, LogEvent};

/// Targets never shipped, so the hook cannot feed on its own output.
const INTERNAL_TARGETS: &[&str] = &["redis_log_hook", "redis"];

/// A `tracing` layer that forwards events to an async [`RedisHook`].
///
/// ```ignore
/// let hook = Arc::new(RedisHook::connect(HookConfig::new("localhost", 6379, "logs").with_async(1_000)).await?);
/// tracing_subscriber::registry().with(RedisLayer::new(hook.clone())?).init();
///
/// tracing::info!(animal = "walrus", number = 1, "and with fields");
/// ```
pub struct RedisLayer<D: Dialer = RedisDialer> {
    hook: Arc<RedisHook<D>>,
}

impl<D: Dialer> RedisLayer<D> {
    /// Fails with [`HookError::NotAsync`] for a sync hook: tracing calls
    /// layers synchronously and they must not wait on the network.
    pub fn new(hook: Arc<RedisHook<D>>) -> Result<Self, HookError> {
        if !hook.is_async() {
            return Err(HookError::NotAsync);
        }
        Ok(Self { hook })
    }

    pub fn hook(&self) -> &Arc<RedisHook<D>> {
        &self.hook
    }
}

impl<S, D> Layer<S> for RedisLayer<D>
where
    S: Subscriber,
    D: Dialer,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_internal(metadata.target()) {
            return;
        }

        let level = Level::from(*metadata.level());
        if !self.hook.accepts(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let log_event = LogEvent {
            timestamp: Utc::now(),
            level,
            message: visitor.message.unwrap_or_default(),
            fields: visitor.fields,
        };

        // Drops are counted by the hook; the layer has no caller to tell.
        let _ = self.hook.try_enqueue(log_event);
    }
}

fn is_internal(target: &str) -> bool {
    INTERNAL_TARGETS.iter().any(|internal| {
        target == *internal
            || target
                .strip_prefix(internal)
                .is_some_and(|rest| rest.starts_with("::"))
    })
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: HashMap<String, FieldValue>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: FieldValue) {
        if field.name() == "message" {
            self.message = Some(value.to_field_string());
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, FieldValue::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, FieldValue::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, FieldValue::U64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, FieldValue::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, FieldValue::Bool(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, FieldValue::Debug(format!("{:?}", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_targets_are_matched_by_path() {
        assert!(is_internal("redis_log_hook"));
        assert!(is_internal("redis_log_hook::worker"));
        assert!(is_internal("redis::aio"));
        assert!(!is_internal("redis_cache"));
        assert!(!is_internal("my_app::redis"));
    }
}
