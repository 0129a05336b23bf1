use thiserror::Error;

/// Errors raised by a store backend (dial, PING, RPUSH).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Backend is not reachable. Used by in-memory doubles.
    #[error("store unreachable: {0}")]
    Unreachable(String),
}

/// Errors returned by the hook.
///
/// A full queue is not represented here: in async mode an overloaded
/// queue drops the event and `fire` still returns `Ok(())`.
#[derive(Debug, Error)]
pub enum HookError {
    /// Construction-time connectivity check failed. No hook is created.
    #[error("unable to connect to store at {addr}: {source}")]
    InitConnectFailed {
        addr: String,
        #[source]
        source: StoreError,
    },

    /// The pool could not provide a live connection.
    #[error("no store connection available: {0}")]
    ConnectionUnavailable(#[source] StoreError),

    /// Envelope could not be serialized.
    #[error("error creating message for store: {0}")]
    Format(#[from] serde_json::Error),

    /// RPUSH (or the connection backing it) failed.
    #[error("error sending message to store: {0}")]
    SendFailed(#[source] StoreError),

    /// Operation needs a hook built with async delivery.
    #[error("hook was built for synchronous delivery")]
    NotAsync,
}
