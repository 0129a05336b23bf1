use std::sync::Arc;

use crate::error::HookError;
use crate::pool::ConnectionPool;
use crate::store::{Dialer, StoreConnection};

/// Pushes encoded messages onto a list in the store.
pub struct ListSink<D: Dialer> {
    pool: Arc<ConnectionPool<D>>,
}

impl<D: Dialer> ListSink<D> {
    pub fn new(pool: Arc<ConnectionPool<D>>) -> Self {
        Self { pool }
    }

    /// RPUSH `payload` as one new element of list `key`.
    ///
    /// The borrowed connection goes back to the pool on success and is
    /// closed on failure.
    pub async fn deliver(&self, payload: &[u8], key: &str) -> Result<(), HookError> {
        let mut conn = self.pool.acquire().await.map_err(|err| match err {
            HookError::ConnectionUnavailable(source) => HookError::SendFailed(source),
            other => other,
        })?;

        match conn.rpush(key, payload).await {
            Ok(()) => {
                self.pool.release(conn);
                Ok(())
            }
            Err(err) => {
                conn.discard();
                Err(HookError::SendFailed(err))
            }
        }
    }

    pub fn pool(&self) -> &ConnectionPool<D> {
        &self.pool
    }
}
