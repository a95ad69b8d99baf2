/**
 * The envelope that carries one record from a `post` call to the worker,
 * and the pool that recycles envelopes between posts.
 *
 * Ownership of a `Box<Envelope<R>>` moves to the worker when the enqueue
 * send completes; the posting side never touches it again. The worker
 * acknowledges the envelope (at most once) and hands it back to the pool.
 *
 * The acknowledgment receiver stays with the caller, so it remains valid
 * after the envelope itself has been reset and reused.
 */
use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::error::Error;
use crate::protocol::constants::MAX_POOLED_ENVELOPES;

/// Single-use channel on which the worker reports accept/reject.
pub type Reply = Sender<Result<(), Error>>;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

pub struct Envelope<R> {
    tag: String,

    /// Unix seconds, rounded down.
    time: i64,

    /// Nanoseconds past `time`.
    nanos: u32,

    /// Per-post `subsecond` choice; `None` defers to the worker's default.
    subsecond: Option<bool>,

    record: Option<R>,

    reply: Option<Reply>,
}

impl<R> Envelope<R> {
    fn empty() -> Self {
        Self {
            tag: String::new(),
            time: 0,
            nanos: 0,
            subsecond: None,
            record: None,
            reply: None,
        }
    }

    /**
     * Loads a freshly acquired envelope with one post's data.
     *
     * The envelope must be reset (as handed out by `EnvelopePool::acquire`);
     * the tag is appended to the existing, empty, allocation.
     *
     * # Arguments
     * * `tag` - Tag as given to `post`, without the client prefix
     * * `time` - Unix seconds
     * * `record` - The record to forward
     * * `reply` - Acknowledgment sender for `sync_append` posts
     */
    pub(crate) fn fill(&mut self, tag: &str, time: i64, record: R, reply: Option<Reply>) {
        self.tag.push_str(tag);
        self.time = time;
        self.record = Some(record);
        self.reply = reply;
    }

    /**
     * Records the sub-second part of the time and the post's own
     * `subsecond` choice, if it made one.
     *
     * # Arguments
     * * `nanos` - Nanoseconds past `time`
     * * `subsecond` - `Some` when the post carried a `subsecond` option
     */
    pub(crate) fn set_precision(&mut self, nanos: u32, subsecond: Option<bool>) {
        self.nanos = nanos;
        self.subsecond = subsecond;
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Unix seconds, rounded down for times before the epoch.
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Nanoseconds past `time()`, always below one billion.
    pub fn nanos(&self) -> u32 {
        self.nanos
    }

    /// The post's own `subsecond` option, if it gave one.
    pub fn subsecond(&self) -> Option<bool> {
        self.subsecond
    }

    pub fn record(&self) -> Option<&R> {
        self.record.as_ref()
    }

    /// Whether the poster is waiting for an acknowledgment.
    pub fn wants_reply(&self) -> bool {
        self.reply.is_some()
    }

    /**
     * Reports the worker's decision for this envelope.
     *
     * Only the first call delivers anything; the reply sender is consumed.
     *
     * # Arguments
     * * `result` - `Ok(())` when the record was accepted into the pending
     *   buffer, otherwise the reason it was rejected
     *
     * # Returns
     * `None` when the result went to a waiting poster (or to one that has
     * since given up). `Some(result)` when nobody asked for it, so the
     * caller can log failures that would otherwise go unseen.
     */
    pub fn acknowledge(&mut self, result: Result<(), Error>) -> Option<Result<(), Error>> {
        match self.reply.take() {
            /* The channel has room for exactly one message; a poster that
             * already gave up simply never reads it. */
            Some(reply) => {
                let _ = reply.try_send(result);
                None
            }
            None => Some(result),
        }
    }

    fn reset(&mut self) {
        self.tag.clear();
        self.time = 0;
        self.nanos = 0;
        self.subsecond = None;
        self.record = None;
        self.reply = None;
    }
}

// ---------------------------------------------------------------------------
// EnvelopePool
// ---------------------------------------------------------------------------

/**
 * Reuse pool shared by every posting thread and the worker.
 *
 * `acquire` hands out a reset envelope (recycled when one is available);
 * `release` clears all fields, including any unsent reply sender, and keeps
 * the allocation for a later post. At most `MAX_POOLED_ENVELOPES` are kept.
 */
pub struct EnvelopePool<R> {
    free: Mutex<Vec<Box<Envelope<R>>>>,
}

impl<R> EnvelopePool<R> {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /**
     * Takes an envelope from the pool, allocating one when the pool is empty.
     *
     * # Returns
     * A reset envelope, ready for `fill`.
     */
    pub fn acquire(&self) -> Box<Envelope<R>> {
        self.free
            .lock()
            .pop()
            .unwrap_or_else(|| Box::new(Envelope::empty()))
    }

    /**
     * Resets an envelope and keeps it for reuse.
     *
     * Dropping the reply sender here is what turns an unacknowledged
     * `sync_append` post into `WriterClosed` on the posting side. When the
     * pool already holds `MAX_POOLED_ENVELOPES`, the envelope is freed.
     *
     * # Arguments
     * * `envelope` - An envelope the caller no longer needs
     */
    pub fn release(&self, mut envelope: Box<Envelope<R>>) {
        envelope.reset();

        let mut free = self.free.lock();
        if free.len() < MAX_POOLED_ENVELOPES {
            free.push(envelope);
        }
    }

    /// Number of envelopes currently waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

impl<R> Default for EnvelopePool<R> {
    fn default() -> Self {
        Self::new()
    }
}
