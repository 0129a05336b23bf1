use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PoolConfig;
use crate::error::{HookError, StoreError};
use crate::store::{Dialer, StoreConnection};

struct IdleConn<C> {
    conn: C,
    returned_at: Instant,
}

struct IdleList<C> {
    conns: Mutex<VecDeque<IdleConn<C>>>,
    max_idle: usize,
}

impl<C> IdleList<C> {
    /// Most recently returned first.
    fn push(&self, conn: C) {
        let mut conns = self.conns.lock();
        conns.push_front(IdleConn {
            conn,
            returned_at: Instant::now(),
        });
        conns.truncate(self.max_idle);
    }
}

/// A small pool of store connections.
///
/// Connections are borrowed for a single operation. Idle ones are
/// closed after `idle_timeout`, and every reused connection is probed
/// with PING before it is handed out.
pub struct ConnectionPool<D: Dialer> {
    dialer: D,
    idle: Arc<IdleList<D::Conn>>,
    idle_timeout: std::time::Duration,
}

impl<D: Dialer> ConnectionPool<D> {
    pub fn new(dialer: D, config: &PoolConfig) -> Self {
        Self {
            dialer,
            idle: Arc::new(IdleList {
                conns: Mutex::new(VecDeque::new()),
                max_idle: config.max_idle,
            }),
            idle_timeout: config.idle_timeout,
        }
    }

    pub fn addr(&self) -> String {
        self.dialer.addr()
    }

    /// Borrow a live connection, dialing a new one when no idle
    /// connection passes the liveness probe.
    pub async fn acquire(&self) -> Result<PooledConnection<D::Conn>, HookError> {
        self.try_acquire().await.map_err(HookError::ConnectionUnavailable)
    }

    /// Return a borrowed connection for reuse.
    ///
    /// Dropping the guard does the same; a discarded connection is never
    /// returned.
    pub fn release(&self, mut conn: PooledConnection<D::Conn>) {
        conn.put_back();
    }

    /// Acquire, PING and release one connection.
    pub async fn health_check(&self) -> bool {
        match self.check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(addr = %self.addr(), error = %err, "store health check failed");
                false
            }
        }
    }

    pub fn idle_count(&self) -> usize {
        self.idle.conns.lock().len()
    }

    pub(crate) async fn check(&self) -> Result<(), StoreError> {
        let mut conn = self.try_acquire().await?;
        if let Err(err) = conn.ping().await {
            conn.discard();
            return Err(err);
        }
        self.release(conn);
        Ok(())
    }

    async fn try_acquire(&self) -> Result<PooledConnection<D::Conn>, StoreError> {
        while let Some(mut conn) = self.take_idle() {
            match conn.ping().await {
                Ok(()) => return Ok(self.wrap(conn)),
                Err(err) => {
                    debug!(error = %err, "dropping pooled connection that failed PING");
                }
            }
        }

        let conn = self.dialer.dial().await?;
        Ok(self.wrap(conn))
    }

    fn take_idle(&self) -> Option<D::Conn> {
        let mut conns = self.idle.conns.lock();
        let now = Instant::now();
        while let Some(oldest) = conns.back() {
            if now.duration_since(oldest.returned_at) <= self.idle_timeout {
                break;
            }
            conns.pop_back();
        }
        conns.pop_front().map(|idle| idle.conn)
    }

    fn wrap(&self, conn: D::Conn) -> PooledConnection<D::Conn> {
        PooledConnection {
            conn: Some(conn),
            idle: self.idle.clone(),
        }
    }
}

/// A borrowed connection. Goes back to the pool when dropped.
pub struct PooledConnection<C: StoreConnection> {
    conn: Option<C>,
    idle: Arc<IdleList<C>>,
}

impl<C: StoreConnection> PooledConnection<C> {
    /// Close the connection instead of returning it to the pool.
    pub fn discard(mut self) {
        self.conn.take();
    }

    fn put_back(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.idle.push(conn);
        }
    }
}

impl<C: StoreConnection> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl<C: StoreConnection> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl<C: StoreConnection> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        self.put_back();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::InMemoryStore;

    fn pool(store: &InMemoryStore) -> ConnectionPool<InMemoryStore> {
        ConnectionPool::new(store.clone(), &PoolConfig::default())
    }

    #[tokio::test]
    async fn reuses_idle_connection() {
        let store = InMemoryStore::new();
        let pool = pool(&store);

        drop(pool.acquire().await.unwrap());
        assert_eq!(pool.idle_count(), 1);

        let _conn = pool.acquire().await.unwrap();
        assert_eq!(store.dial_count(), 1);
        assert_eq!(store.ping_count(), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn released_connection_is_reused() {
        let store = InMemoryStore::new();
        let pool = pool(&store);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(pool.idle_count(), 0);
        pool.release(conn);
        assert_eq!(pool.idle_count(), 1);

        let conn = pool.acquire().await.unwrap();
        pool.release(conn);
        assert_eq!(store.dial_count(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test]
    async fn health_check_releases_its_connection() {
        let store = InMemoryStore::new();
        let pool = pool(&store);

        assert!(pool.health_check().await);
        assert!(pool.health_check().await);
        assert_eq!(store.dial_count(), 1);
        assert_eq!(pool.idle_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_idle_connection_is_not_reused() {
        let store = InMemoryStore::new();
        let pool = pool(&store);

        drop(pool.acquire().await.unwrap());
        tokio::time::advance(Duration::from_secs(241)).await;

        let _conn = pool.acquire().await.unwrap();
        assert_eq!(store.dial_count(), 2);
        assert_eq!(store.ping_count(), 0);
    }

    #[tokio::test]
    async fn failed_probe_provisions_fresh_connection() {
        let store = InMemoryStore::new();
        let pool = pool(&store);

        drop(pool.acquire().await.unwrap());
        store.break_connections();

        let mut conn = pool.acquire().await.unwrap();
        assert!(conn.ping().await.is_ok());
        assert_eq!(store.dial_count(), 2);
    }

    #[tokio::test]
    async fn idle_list_is_bounded() {
        let store = InMemoryStore::new();
        let pool = pool(&store);

        let mut held = Vec::new();
        for _ in 0..5 {
            held.push(pool.acquire().await.unwrap());
        }
        drop(held);

        assert_eq!(store.dial_count(), 5);
        assert_eq!(pool.idle_count(), 3);
    }

    #[tokio::test]
    async fn discarded_connection_is_not_pooled() {
        let store = InMemoryStore::new();
        let pool = pool(&store);

        pool.acquire().await.unwrap().discard();
        assert_eq!(pool.idle_count(), 0);
    }

    #[tokio::test]
    async fn unreachable_store_fails_acquire_and_health_check() {
        let store = InMemoryStore::unreachable();
        let pool = pool(&store);

        assert!(matches!(
            pool.acquire().await,
            Err(HookError::ConnectionUnavailable(StoreError::Unreachable(_)))
        ));
        assert!(!pool.health_check().await);
    }
}
