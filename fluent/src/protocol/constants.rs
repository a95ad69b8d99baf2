/**
 * Client-wide defaults.
 *
 * Buffer sizes and timings used when the corresponding option is not
 * supplied to `Client::new`.
 */
use std::time::Duration;

/// fluentd's standard forward input address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:24224";

pub const DEFAULT_NETWORK: &str = "tcp";

/// Maximum pending buffer size: 8 MiB.
pub const DEFAULT_BUFFER_LIMIT: usize = 8 * 1024 * 1024;

/// Pending bytes required before the worker starts writing: 8 KiB.
pub const DEFAULT_WRITE_THRESHOLD: usize = 8 * 1024;

/// How long the worker idles before writing whatever is pending.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Final write attempts made while draining after cancellation.
pub const DRAIN_ATTEMPTS: usize = 3;

/// Pause between final write attempts.
pub const DRAIN_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Upper bound on envelopes kept for reuse.
pub const MAX_POOLED_ENVELOPES: usize = 256;
