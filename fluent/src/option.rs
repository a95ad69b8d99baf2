/**
 * Named options used to customize `Client::new` and individual
 * `Client::post` calls.
 *
 * Each option is constructed through its `with_*` function and carries a
 * value whose type is fixed by the option's name. No validation happens at
 * construction time; the consumer (worker configuration or `post`) decides
 * what is valid and ignores the options that do not concern it.
 *
 * | name              | consumer | value            |
 * |-------------------|----------|------------------|
 * | `network`         | new      | `tcp` or `unix`  |
 * | `address`         | new      | host:port / path |
 * | `marshaler`       | new      | `Marshaler`      |
 * | `tag_prefix`      | new      | string           |
 * | `buffer_limit`    | new      | bytes            |
 * | `write_threshold` | new      | bytes            |
 * | `timestamp`       | post     | `SystemTime`     |
 * | `sync_append`     | post     | bool             |
 * | `subsecond`       | new/post | bool             |
 *
 * `subsecond` is the one option both consumers read: given to `new` it is
 * the client-wide default, given to `post` it overrides that default for a
 * single record.
 */
use std::time::SystemTime;

use crate::protocol::marshal::Marshaler;

#[derive(Clone, Debug, PartialEq)]
pub enum Opt {
    Network(String),
    Address(String),
    Timestamp(SystemTime),
    Marshaler(Marshaler),
    TagPrefix(String),
    SyncAppend(bool),
    BufferLimit(usize),
    WriteThreshold(usize),
    Subsecond(bool),
}

impl Opt {
    /// The option's name, as listed in the table above.
    pub fn name(&self) -> &'static str {
        match self {
            Opt::Network(_) => "network",
            Opt::Address(_) => "address",
            Opt::Timestamp(_) => "timestamp",
            Opt::Marshaler(_) => "marshaler",
            Opt::TagPrefix(_) => "tag_prefix",
            Opt::SyncAppend(_) => "sync_append",
            Opt::BufferLimit(_) => "buffer_limit",
            Opt::WriteThreshold(_) => "write_threshold",
            Opt::Subsecond(_) => "subsecond",
        }
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// Network type to connect over, `"tcp"` or `"unix"`.
pub fn with_network(network: impl Into<String>) -> Opt {
    Opt::Network(network.into())
}

/// Address to connect to: `host:port` for TCP, a socket path for Unix.
pub fn with_address(address: impl Into<String>) -> Opt {
    Opt::Address(address.into())
}

/// Overrides the record time for a single `post` (otherwise "now").
pub fn with_timestamp(time: SystemTime) -> Opt {
    Opt::Timestamp(time)
}

/// Serializes records as JSON arrays.
pub fn with_json_marshaler() -> Opt {
    Opt::Marshaler(Marshaler::Json)
}

/// Serializes records as MessagePack (the default).
pub fn with_msgpack_marshaler() -> Opt {
    Opt::Marshaler(Marshaler::Msgpack)
}

/// Prefix joined to every tag as `prefix.tag`.
pub fn with_tag_prefix(prefix: impl Into<String>) -> Opt {
    Opt::TagPrefix(prefix.into())
}

/**
 * Makes a `post` wait for the worker to accept or reject the record.
 *
 * Without it, buffer-capacity and marshaling failures are only visible in
 * the worker's log output.
 */
pub fn with_sync_append(sync: bool) -> Opt {
    Opt::SyncAppend(sync)
}

/**
 * Maximum size in bytes of the worker's pending buffer. A record that would
 * push the buffer past this limit is rejected (observable only with
 * `with_sync_append(true)`).
 */
pub fn with_buffer_limit(bytes: usize) -> Opt {
    Opt::BufferLimit(bytes)
}

/// Minimum number of pending bytes before the worker writes to the server.
pub fn with_write_threshold(bytes: usize) -> Opt {
    Opt::WriteThreshold(bytes)
}

/**
 * Sends record times with nanosecond precision, as fluentd's `EventTime`
 * (MessagePack extension type 0).
 *
 * Accepted by `Client::new` as the default for every record and by
 * `Client::post` for a single record. JSON entries always carry whole
 * seconds, since JSON has no `EventTime` form.
 *
 * # Arguments
 * * `enabled` - `true` for nanosecond times, `false` for whole seconds
 *
 * # Returns
 * The `subsecond` option.
 */
pub fn with_subsecond(enabled: bool) -> Opt {
    Opt::Subsecond(enabled)
}
