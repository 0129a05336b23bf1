use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::StoreError;
use crate::store::{Dialer, StoreConnection};

/// Dials plain TCP Redis connections on the tokio runtime.
///
/// No AUTH or TLS is performed.
pub struct RedisDialer {
    client: redis::Client,
    addr: String,
}

impl RedisDialer {
    pub fn new(host: &str, port: u16) -> Result<Self, StoreError> {
        let addr = format!("{}:{}", host, port);
        let client = redis::Client::open(format!("redis://{}/", addr))?;
        Ok(Self { client, addr })
    }
}

#[async_trait]
impl Dialer for RedisDialer {
    type Conn = RedisConnection;

    async fn dial(&self) -> Result<RedisConnection, StoreError> {
        let conn = self.client.get_tokio_connection().await?;
        Ok(RedisConnection { conn })
    }

    fn addr(&self) -> String {
        self.addr.clone()
    }
}

pub struct RedisConnection {
    conn: redis::aio::Connection,
}

#[async_trait]
impl StoreConnection for RedisConnection {
    async fn ping(&mut self) -> Result<(), StoreError> {
        redis::cmd("PING").query_async::<_, ()>(&mut self.conn).await?;
        Ok(())
    }

    async fn rpush(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let _: i64 = self.conn.rpush(key, value).await?;
        Ok(())
    }
}
