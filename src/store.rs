use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StoreError;

/// One open connection to a list store.
#[async_trait]
pub trait StoreConnection: Send + 'static {
    /// Liveness probe.
    async fn ping(&mut self) -> Result<(), StoreError>;

    /// Append `value` as one element at the tail of list `key`.
    async fn rpush(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// Opens new store connections for the pool.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Conn: StoreConnection;

    async fn dial(&self) -> Result<Self::Conn, StoreError>;

    /// Address shown in diagnostics.
    fn addr(&self) -> String;
}

/// In-memory list store for tests and local runs.
///
/// Cloning shares the same lists. Reachability, write latency and
/// connection breakage can be switched at runtime.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    lists: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    unreachable: AtomicBool,
    latency: Mutex<Duration>,
    generation: AtomicU64,
    dials: AtomicUsize,
    pings: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses every dial.
    pub fn unreachable() -> Self {
        let store = Self::new();
        store.set_reachable(false);
        store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.inner.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Delay applied to every RPUSH.
    pub fn set_latency(&self, latency: Duration) {
        *self.inner.latency.lock() = latency;
    }

    /// Invalidate every connection opened so far. New dials are unaffected.
    pub fn break_connections(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Elements of list `key`, head first.
    pub fn list(&self, key: &str) -> Vec<Vec<u8>> {
        self.inner.lists.lock().get(key).cloned().unwrap_or_default()
    }

    pub fn len(&self, key: &str) -> usize {
        self.inner.lists.lock().get(key).map(Vec::len).unwrap_or(0)
    }

    pub fn dial_count(&self) -> usize {
        self.inner.dials.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.inner.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for InMemoryStore {
    type Conn = MemoryConnection;

    async fn dial(&self) -> Result<MemoryConnection, StoreError> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("connection refused".to_string()));
        }
        self.inner.dials.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryConnection {
            inner: self.inner.clone(),
            generation: self.inner.generation.load(Ordering::SeqCst),
        })
    }

    fn addr(&self) -> String {
        "memory".to_string()
    }
}

/// Connection handed out by [`InMemoryStore`].
pub struct MemoryConnection {
    inner: Arc<Inner>,
    generation: u64,
}

impl MemoryConnection {
    fn check(&self) -> Result<(), StoreError> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("connection reset".to_string()));
        }
        if self.generation != self.inner.generation.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("broken pipe".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn ping(&mut self) -> Result<(), StoreError> {
        self.inner.pings.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    async fn rpush(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let latency = *self.inner.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.check()?;
        self.inner
            .lists
            .lock()
            .entry(key.to_string())
            .or_default()
            .push(value.to_vec());
        Ok(())
    }
}
