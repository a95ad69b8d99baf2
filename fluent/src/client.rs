/**
 * The fluent client — coordinator between posting threads and the single
 * background worker.
 *
 * Lifecycle:
 *
 * ```text
 *  Open ── close()/shutdown() ──► Closing ── worker drops done ──► Drained
 *    └──────────── worker exits on its own (fatal error) ──────────┘
 * ```
 *
 * There is no way back to `Open`. Posts racing a close either see the
 * closed flag, or race their enqueue against the worker-done signal, so a
 * post never blocks forever on a worker that has gone away.
 */
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, select, Receiver, SendError, Sender, TryRecvError};
use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::option::Opt;
use crate::protocol::envelope::{Envelope, EnvelopePool};
use crate::transport::{Spawn, Worker, WorkerConfig, WorkerLink};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/**
 * Handle used to post records. Share it between threads behind an `Arc`.
 *
 * `R` is the record type; the worker serializes it, so `post` itself never
 * encodes anything.
 *
 * Dropping the client without calling `close` also cancels the worker,
 * which then drains in the background.
 */
pub struct Client<R = serde_json::Value> {
    /// Set once by `close`; never reset.
    closed: RwLock<bool>,

    queue: Sender<Box<Envelope<R>>>,

    /// Disconnects when the worker has stopped consuming.
    done: Receiver<()>,

    /// Dropping the sender is the cancellation signal.
    cancel: Mutex<Option<Sender<()>>>,

    pool: Arc<EnvelopePool<R>>,
}

impl<R> Client<R>
where
    R: Serialize + Send + 'static,
{
    /**
     * Creates a client forwarding to fluentd and starts its worker threads.
     *
     * Recognized options: `network`, `address`, `marshaler`, `tag_prefix`,
     * `buffer_limit`, `write_threshold`, `subsecond`. Others are ignored.
     *
     * No connection is made here; the worker connects when it first has
     * something to write.
     *
     * # Arguments
     * * `options` - Construction options; a later option of the same name
     *   wins
     *
     * # Returns
     * The running client, or `InvalidOption` for a bad combination, or
     * `Spawn` if the worker threads could not be started.
     */
    pub fn new(options: &[Opt]) -> Result<Self> {
        let config = WorkerConfig::from_options(options)?;
        Self::with_worker(Worker::new(config))
    }
}

impl<R> Client<R> {
    /**
     * Creates a client served by an arbitrary worker.
     *
     * The worker receives the other ends of the client's channels through a
     * `WorkerLink` and must honour its contract: consume `incoming`,
     * acknowledge envelopes that want a reply, and drop `done` once it has
     * permanently stopped.
     *
     * # Arguments
     * * `worker` - Anything implementing `Spawn`, including a closure
     *   taking the `WorkerLink`
     *
     * # Returns
     * The client, or whatever error the worker's `spawn` returned.
     */
    pub fn with_worker(worker: impl Spawn<R>) -> Result<Self> {
        let (queue, incoming) = bounded(0);
        let (cancel, cancelled) = bounded(0);
        let (done_tx, done) = bounded(0);
        let pool = Arc::new(EnvelopePool::new());

        worker.spawn(WorkerLink {
            incoming,
            cancelled,
            done: done_tx,
            pool: Arc::clone(&pool),
        })?;

        Ok(Self {
            closed: RwLock::new(false),
            queue,
            done,
            cancel: Mutex::new(Some(cancel)),
            pool,
        })
    }

    /**
     * Hands `record` to the worker under `tag`.
     *
     * Recognized options:
     * - `timestamp` — record time (default: now).
     * - `sync_append` — wait for the worker to accept or reject the record
     *   and return its verdict (`BufferFull`, `Msgpack`, `Json`).
     * - `subsecond` — send this record's time with nanosecond precision,
     *   overriding the client-wide setting.
     *
     * # Arguments
     * * `tag` - Tag for the record; the client's prefix is added by the worker
     * * `record` - The record, serialized by the worker
     * * `options` - Per-post options; others are ignored
     *
     * Without `sync_append`, `Ok(())` only means the worker took the
     * envelope; rejections are then visible in the worker's log alone.
     *
     * # Errors
     * - `ClientClosed` once `close`/`shutdown` has started.
     * - `WriterClosed` if the worker stops before taking the envelope or
     *   before acknowledging it.
     */
    pub fn post(&self, tag: &str, record: R, options: &[Opt]) -> Result<()> {
        /* Held for the whole call so `close` cannot flip the flag mid-post. */
        let closed = self.closed.read();
        if *closed {
            return Err(Error::ClientClosed);
        }

        let mut at = None;
        let mut sync_append = false;
        let mut subsecond = None;
        for option in options {
            match option {
                Opt::Timestamp(value) => at = Some(*value),
                Opt::SyncAppend(value) => sync_append = *value,
                Opt::Subsecond(value) => subsecond = Some(*value),
                _ => {}
            }
        }
        let (time, nanos) = unix_time(at.unwrap_or_else(SystemTime::now));

        /*
         * The reply receiver lives here rather than in the envelope: the
         * envelope goes back to the pool as soon as the worker is done
         * with it.
         */
        let (reply_tx, reply_rx) = if sync_append {
            let (tx, rx) = bounded(1);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let mut envelope = self.pool.acquire();
        envelope.fill(tag, time, record, reply_tx);
        envelope.set_precision(nanos, subsecond);

        select! {
            send(self.queue, envelope) -> res => {
                if let Err(SendError(envelope)) = res {
                    self.pool.release(envelope);
                    return Err(Error::WriterClosed);
                }
            }
            recv(self.done) -> _ => return Err(Error::WriterClosed),
        }
        trace!("client: enqueued record for tag {tag:?}");

        let Some(reply) = reply_rx else {
            return Ok(());
        };

        debug!("client: post is waiting for return status");
        select! {
            /* A reply sender dropped without a verdict counts as the
             * worker going away. */
            recv(reply) -> verdict => verdict.unwrap_or(Err(Error::WriterClosed)),
            recv(self.done) -> _ => match reply.try_recv() {
                Ok(verdict) => verdict,
                Err(_) => Err(Error::WriterClosed),
            },
        }
    }

    /**
     * Marks the client closed and signals the worker to stop.
     *
     * Does not wait for the worker; use `shutdown` for that. Calling it
     * again is harmless. Never fails.
     */
    pub fn close(&self) -> Result<()> {
        *self.closed.write() = true;

        if self.cancel.lock().take().is_some() {
            debug!("client: close requested, worker cancelled");
        }
        Ok(())
    }

    /**
     * Closes the client, then blocks until the worker has drained and
     * exited or `timeout` elapses.
     *
     * `None` waits as long as it takes. Delivery of records queued just
     * before the close is best-effort: when the deadline wins, the worker
     * may still be draining in the background.
     *
     * Safe to call repeatedly; every call waits on the same done signal.
     *
     * # Errors
     * `DeadlineExceeded` if `timeout` elapsed first.
     */
    pub fn shutdown(&self, timeout: Option<Duration>) -> Result<()> {
        debug!("client: shutdown requested");
        self.close()?;

        let deadline = match timeout {
            Some(timeout) => crossbeam_channel::after(timeout),
            None => crossbeam_channel::never(),
        };

        select! {
            recv(self.done) -> _ => {
                debug!("client: shutdown completed");
                Ok(())
            }
            recv(deadline) -> _ => {
                if self.is_drained() {
                    Ok(())
                } else {
                    Err(Error::DeadlineExceeded)
                }
            }
        }
    }

    /// True once `close` or `shutdown` has been called.
    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// True once the worker has permanently stopped consuming.
    pub fn is_drained(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/**
 * Splits `at` into unix seconds and nanoseconds past them.
 *
 * Seconds are rounded down, so an instant 1.5 s before the epoch is
 * `(-2, 500_000_000)` and the nanosecond part is never negative.
 */
fn unix_time(at: SystemTime) -> (i64, u32) {
    match at.duration_since(UNIX_EPOCH) {
        Ok(since) => (since.as_secs() as i64, since.subsec_nanos()),
        Err(before) => {
            let before = before.duration();
            let secs = -(before.as_secs() as i64);
            match before.subsec_nanos() {
                0 => (secs, 0),
                nanos => (secs - 1, 1_000_000_000 - nanos),
            }
        }
    }
}
