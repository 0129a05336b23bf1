//! Ships structured log events to a Redis list as Logstash JSON.
//!
//! Each event becomes one JSON envelope (Logstash v0 or v1) pushed with
//! `RPUSH` onto a configured key, ready for a Logstash `redis` input.
//!
//! ## Delivery modes
//! - **Sync**: the caller formats and pushes inline and sees any error.
//! - **Async**: the caller only enqueues onto a bounded queue, drained
//!   by a single background task. When the queue is full the event is
//!   dropped with a rate-limited diagnostic. The caller never waits.
//!
//! ## Non-Guarantees
//! - Delivery: dropped or failed events are not retried
//! - Ordering across concurrent producers
//! - Flushing on shutdown: queued events are abandoned
//! - AUTH / TLS
//!
//! Hook into `tracing` with [`RedisLayer`], or call [`RedisHook::fire`]
//! directly.

mod config;
mod diagnostics;
mod error;
mod format;
mod hook;
mod hostname;
mod layer;
mod pool;
mod sink;
mod store;
mod store_redis;
mod types;
mod worker;

pub use config::{FormatVersion, HookConfig, PoolConfig};
pub use diagnostics::RateLimitedReporter;
pub use error::{HookError, StoreError};
pub use format::{encode, format, format_with_host, rfc3339_nano, Envelope, EnvelopeFields, MessageV0, MessageV1};
pub use hook::{HookStats, RedisHook};
pub use hostname::{report_hostname, UNKNOWN_HOST};
pub use layer::RedisLayer;
pub use pool::{ConnectionPool, PooledConnection};
pub use sink::ListSink;
pub use store::{Dialer, InMemoryStore, MemoryConnection, StoreConnection};
pub use store_redis::{RedisConnection, RedisDialer};
pub use types::{EnabledLevels, FieldValue, Level, LogEvent, ParseLevelError};
