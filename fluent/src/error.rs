/**
 * Error type shared by the client, the transport worker, and the options
 * layer.
 *
 * Errors produced by the worker (`BufferFull`, `Msgpack`, `Json`) travel
 * back to the caller through the acknowledgment channel of a synchronous
 * post, so every variant must be `Send`.
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// `post` was called after `close` or `shutdown` started.
    #[error("client has already been closed")]
    ClientClosed,

    /// The worker stopped consuming while an enqueue or an acknowledgment
    /// wait was in progress.
    #[error("writer has been closed. Shutdown called?")]
    WriterClosed,

    /// Appending the record would push the pending buffer past its limit.
    #[error("pending buffer limit of {limit} bytes exceeded ({pending} pending, {incoming} incoming)")]
    BufferFull {
        limit: usize,
        pending: usize,
        incoming: usize,
    },

    #[error("failed to marshal record as msgpack: {0}")]
    Msgpack(#[from] rmp_serde::encode::Error),

    #[error("failed to marshal record as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The shutdown deadline expired before the worker signalled done.
    /// The worker may still be draining in the background.
    #[error("shutdown deadline exceeded before the worker finished draining")]
    DeadlineExceeded,

    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("failed to spawn worker threads: {0}")]
    Spawn(#[source] std::io::Error),
}

impl Error {
    /// True for the two errors that mean "stop posting to this client".
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::ClientClosed | Error::WriterClosed)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
