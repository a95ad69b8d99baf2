/**
 * Reconnect pacing for the writer: after each failed connect or write the
 * next attempt waits a random delay of at most the current ceiling, and the
 * ceiling doubles up to a cap. A successful write resets it.
 *
 * The random spread keeps many clients that lost the same server from
 * reconnecting in lockstep.
 */
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(5);
const MIN_SLEEP_MS: u64 = 10;

pub struct Backoff {
    /// Ceiling for the next jittered delay.
    current: Duration,
    next_attempt: Option<Instant>,
    rng: StdRng,
}

impl Backoff {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            current: BASE_DELAY,
            next_attempt: None,
            rng,
        }
    }

    /// Whether an attempt may be made at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.next_attempt.map_or(true, |at| now >= at)
    }

    /// Time left before the next attempt; zero when `ready(now)`.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_attempt
            .map_or(Duration::ZERO, |at| at.saturating_duration_since(now))
    }

    /**
     * Schedules the next attempt after a failure at `now`.
     *
     * # Arguments
     * * `now` - When the failed attempt was made
     *
     * # Returns
     * The delay chosen, between `MIN_SLEEP_MS` and the current ceiling.
     */
    pub fn record_failure(&mut self, now: Instant) -> Duration {
        let max_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;
        let sleep_ms = match max_ms {
            0 => MIN_SLEEP_MS,
            1..=MIN_SLEEP_MS => max_ms,
            _ => self.rng.gen_range(MIN_SLEEP_MS..=max_ms),
        };
        let sleep = Duration::from_millis(sleep_ms);

        self.next_attempt = Some(now + sleep);
        self.current = self.current.saturating_mul(2).min(MAX_DELAY);
        sleep
    }

    pub fn record_success(&mut self) {
        self.current = BASE_DELAY;
        self.next_attempt = None;
    }

    /// True while failures are being paced.
    pub fn is_failing(&self) -> bool {
        self.next_attempt.is_some()
    }
}
