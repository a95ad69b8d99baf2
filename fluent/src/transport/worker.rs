/**
 * Background worker that drains the enqueue channel, marshals envelopes
 * into a pending buffer, and writes that buffer to fluentd.
 *
 * Architecture overview:
 *
 * ```text
 *  ┌──────────────┐   rendezvous channel   ┌────────────────┐
 *  │ Client::post │ ── Box<Envelope<R>> ──► │ Reader thread  │  marshal, buffer
 *  │ (any thread) │ ◄──── ack (sync) ────── │                │  limit, ack
 *  └──────┬───────┘                        └───────┬────────┘
 *         │ close(): drop cancel sender            │ batches (threshold or tick)
 *         └──────────────────────────────────────► ▼
 *                                           ┌────────────────┐
 *                                           │ Writer thread  │  connect, write,
 *                                           │                │  backoff, drain
 *                                           └───────┬────────┘
 *                                                   │ Connection::write_all()
 *                                            ┌──────▼──────┐
 *                                            │   fluentd   │
 *                                            └─────────────┘
 * ```
 *
 * The reader never touches the network, so a slow or unreachable server
 * never holds up a post. Bytes handed to the writer but not yet written
 * still count against the buffer limit.
 *
 * The writer owns the `done` sender of the client's worker-done signal.
 * It exits only after the reader has gone and the final batch has been
 * drained, so dropping `done`, on any exit path, is what tells posting
 * threads that nobody is consuming any more.
 */
use std::io::Write;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{select, tick, unbounded, Receiver, RecvTimeoutError, SendError, Sender};
use log::{debug, error, trace, warn};
use serde::Serialize;

use super::backoff::Backoff;
use super::config::{Network, WorkerConfig};
use super::connection::Connection;
use crate::error::{Error, Result};
use crate::protocol::constants::{DRAIN_ATTEMPTS, DRAIN_RETRY_DELAY, FLUSH_INTERVAL};
use crate::protocol::envelope::{Envelope, EnvelopePool};

// ---------------------------------------------------------------------------
// WorkerLink / Spawn — the contract between a client and its worker
// ---------------------------------------------------------------------------

/**
 * The worker-side ends of the channels a `Client` creates.
 *
 * - `incoming` — envelopes from `post`; consumed by exactly one task.
 * - `cancelled` — disconnects when the client is closed or dropped.
 * - `done` — drop it when the worker has permanently stopped consuming.
 * - `pool` — where consumed envelopes are returned.
 *
 * A worker signals done simply by dropping the link (or its `done` field).
 */
pub struct WorkerLink<R> {
    pub incoming: Receiver<Box<Envelope<R>>>,
    pub cancelled: Receiver<()>,
    pub done: Sender<()>,
    pub pool: Arc<EnvelopePool<R>>,
}

/// Starts a worker on the given link.
pub trait Spawn<R> {
    /**
     * Starts consuming the link in the background.
     *
     * # Arguments
     * * `link` - The worker-side channel ends, moved into the worker
     *
     * # Returns
     * `Ok(())` once the worker is running; an error makes `Client`
     * construction fail with it.
     */
    fn spawn(self, link: WorkerLink<R>) -> Result<()>;
}

impl<R, F> Spawn<R> for F
where
    F: FnOnce(WorkerLink<R>) -> Result<()>,
{
    fn spawn(self, link: WorkerLink<R>) -> Result<()> {
        self(link)
    }
}

// ---------------------------------------------------------------------------
// Worker — the socket forwarding worker
// ---------------------------------------------------------------------------

pub struct Worker {
    config: WorkerConfig,
}

impl Worker {
    /**
     * Creates a worker that will forward to the configured server.
     *
     * # Arguments
     * * `config` - Validated configuration, usually from `WorkerConfig::from_options`
     */
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }
}

impl<R> Spawn<R> for Worker
where
    R: Serialize + Send + 'static,
{
    /**
     * Spawns the writer thread, then the reader thread.
     *
     * The writer holds `done` for its whole life, so the done signal fires
     * when it returns or unwinds. It returns once the reader has dropped
     * its batch sender, which the reader does on every exit path.
     */
    fn spawn(self, link: WorkerLink<R>) -> Result<()> {
        let WorkerLink {
            incoming,
            cancelled,
            done,
            pool,
        } = link;
        let outstanding = Arc::new(AtomicUsize::new(0));
        let (batches, batch_rx) = unbounded();

        let writer = Writer::new(&self.config, Arc::clone(&outstanding));
        thread::Builder::new()
            .name("fluent-writer".into())
            .spawn(move || {
                let _done = done;
                if catch_unwind(AssertUnwindSafe(|| writer.run(&batch_rx))).is_err() {
                    error!("writer thread panicked; unsent records were dropped");
                }
                debug!("writer: exited");
            })
            .map_err(Error::Spawn)?;

        let reader = Reader::new(self.config, outstanding, batches);
        thread::Builder::new()
            .name("fluent-reader".into())
            .spawn(move || {
                if catch_unwind(AssertUnwindSafe(|| reader.run(&incoming, &cancelled, &*pool))).is_err() {
                    error!("reader thread panicked; pending records were dropped");
                }
                debug!("reader: exited");
            })
            .map(|_| ())
            .map_err(Error::Spawn)
    }
}

// ---------------------------------------------------------------------------
// Reader — receives, marshals and acknowledges
// ---------------------------------------------------------------------------

struct Reader {
    config: WorkerConfig,

    /// Marshaled entries not yet handed to the writer.
    pending: Vec<u8>,

    /// Encoding target for one entry, copied into `pending` when it fits.
    scratch: Vec<u8>,

    tag: String,

    /// Bytes accepted but not yet written: `pending` plus whatever the
    /// writer still holds. Shared with the writer.
    outstanding: Arc<AtomicUsize>,

    batches: Sender<Vec<u8>>,
}

impl Reader {
    fn new(config: WorkerConfig, outstanding: Arc<AtomicUsize>, batches: Sender<Vec<u8>>) -> Self {
        Self {
            config,
            pending: Vec::new(),
            scratch: Vec::new(),
            tag: String::new(),
            outstanding,
            batches,
        }
    }

    /**
     * Consumes envelopes until cancelled, the client goes away, or the
     * writer stops. Pending bytes are handed off at the write threshold
     * and on every tick of `FLUSH_INTERVAL`, whatever the traffic.
     */
    fn run<R: Serialize>(
        mut self,
        incoming: &Receiver<Box<Envelope<R>>>,
        cancelled: &Receiver<()>,
        pool: &EnvelopePool<R>,
    ) {
        debug!("reader: started, forwarding to {} ({:?})", self.config.address, self.config.network);
        let ticker = tick(FLUSH_INTERVAL);

        loop {
            select! {
                recv(incoming) -> msg => match msg {
                    Ok(envelope) => {
                        if !self.accept(envelope, pool) {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(cancelled) -> _ => {
                    debug!("reader: cancellation received, draining");
                    break;
                }
                recv(ticker) -> _ => {
                    if !self.hand_off() {
                        break;
                    }
                }
            }
        }

        for envelope in incoming.try_iter() {
            self.accept(envelope, pool);
        }
        self.hand_off();
    }

    /**
     * Marshals one envelope into the pending buffer and acknowledges it.
     *
     * Returns `false` once the writer has stopped.
     */
    fn accept<R: Serialize>(&mut self, mut envelope: Box<Envelope<R>>, pool: &EnvelopePool<R>) -> bool {
        let result = self.append(&envelope);

        if let Some(Err(err)) = envelope.acknowledge(result) {
            warn!("dropping record for tag {:?}: {err}", envelope.tag());
        }
        pool.release(envelope);

        if self.pending.len() >= self.config.write_threshold {
            return self.hand_off();
        }
        true
    }

    fn append<R: Serialize>(&mut self, envelope: &Envelope<R>) -> Result<()> {
        let Some(record) = envelope.record() else {
            return Ok(());
        };

        self.scratch.clear();
        let tag = self.config.full_tag(envelope.tag(), &mut self.tag);
        let nanos = envelope
            .subsecond()
            .unwrap_or(self.config.subsecond)
            .then(|| envelope.nanos());
        self.config
            .marshaler
            .encode(&mut self.scratch, tag, envelope.time(), nanos, record)?;

        let buffered = self.outstanding.load(Ordering::Acquire);
        if buffered + self.scratch.len() > self.config.buffer_limit {
            return Err(Error::BufferFull {
                limit: self.config.buffer_limit,
                pending: buffered,
                incoming: self.scratch.len(),
            });
        }

        self.pending.extend_from_slice(&self.scratch);
        self.outstanding.fetch_add(self.scratch.len(), Ordering::AcqRel);
        trace!("reader: appended {} bytes, {} pending", self.scratch.len(), self.pending.len());
        Ok(())
    }

    /// Sends the pending buffer to the writer. `false` if the writer is gone.
    fn hand_off(&mut self) -> bool {
        if self.pending.is_empty() {
            return true;
        }

        let batch = mem::take(&mut self.pending);
        trace!("reader: handing {} bytes to the writer", batch.len());
        match self.batches.send(batch) {
            Ok(()) => true,
            Err(SendError(batch)) => {
                warn!("writer has stopped; dropping {} pending bytes", batch.len());
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Writer — owns the connection
// ---------------------------------------------------------------------------

struct Writer {
    network: Network,
    address: String,

    /// Batches received from the reader and not yet written.
    unsent: Vec<u8>,

    connection: Option<Connection>,

    backoff: Backoff,

    outstanding: Arc<AtomicUsize>,
}

impl Writer {
    fn new(config: &WorkerConfig, outstanding: Arc<AtomicUsize>) -> Self {
        Self {
            network: config.network,
            address: config.address.clone(),
            unsent: Vec::new(),
            connection: None,
            backoff: Backoff::new(),
            outstanding,
        }
    }

    /**
     * Writes batches as they arrive. While the server is unreachable the
     * unsent bytes are retried once the backoff delay expires, and new
     * batches are coalesced onto them. Returns after the final drain, once
     * the reader has dropped its sender.
     */
    fn run(mut self, batches: &Receiver<Vec<u8>>) {
        loop {
            let batch = if self.unsent.is_empty() {
                match batches.recv() {
                    Ok(batch) => batch,
                    Err(_) => break,
                }
            } else {
                match batches.recv_timeout(self.backoff.remaining(Instant::now())) {
                    Ok(batch) => batch,
                    Err(RecvTimeoutError::Timeout) => Vec::new(),
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };

            self.take(batch);
            for batch in batches.try_iter() {
                self.take(batch);
            }
            self.write_unsent();
        }

        self.drain();
    }

    fn take(&mut self, batch: Vec<u8>) {
        if self.unsent.is_empty() {
            self.unsent = batch;
        } else {
            self.unsent.extend_from_slice(&batch);
        }
    }

    /**
     * Writes everything unsent, connecting first if needed.
     *
     * On failure the connection is discarded and the bytes stay unsent
     * for the next attempt. A failure mid-write may cause the server to
     * see a prefix of the buffer twice.
     */
    fn write_unsent(&mut self) {
        if self.unsent.is_empty() {
            return;
        }
        let now = Instant::now();
        if !self.backoff.ready(now) {
            return;
        }

        if self.connection.is_none() {
            match Connection::open(self.network, &self.address) {
                Ok(connection) => {
                    debug!("writer: connected to {}", self.address);
                    self.connection = Some(connection);
                }
                Err(err) => {
                    if !self.backoff.is_failing() {
                        warn!("failed to connect to {}: {err}", self.address);
                    }
                    let delay = self.backoff.record_failure(now);
                    trace!("writer: retrying in {delay:?}");
                    return;
                }
            }
        }
        let Some(connection) = self.connection.as_mut() else {
            return;
        };

        match connection.write_all(&self.unsent).and_then(|()| connection.flush()) {
            Ok(()) => {
                trace!("writer: wrote {} bytes", self.unsent.len());
                self.outstanding.fetch_sub(self.unsent.len(), Ordering::AcqRel);
                self.unsent.clear();
                self.backoff.record_success();
            }
            Err(err) => {
                warn!("write to {} failed: {err}", self.address);
                self.connection = None;
                self.backoff.record_failure(now);
            }
        }
    }

    /**
     * Makes a bounded number of final write attempts, ignoring the
     * backoff. Anything left after that is dropped.
     */
    fn drain(&mut self) {
        for attempt in 0..DRAIN_ATTEMPTS {
            if self.unsent.is_empty() {
                break;
            }
            if attempt > 0 {
                thread::sleep(DRAIN_RETRY_DELAY);
            }
            self.backoff.record_success();
            self.write_unsent();
        }

        if !self.unsent.is_empty() {
            warn!("dropping {} unsent bytes: could not reach {}", self.unsent.len(), self.address);
        }
    }
}
