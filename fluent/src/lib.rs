/*!
 * Fluent — a client for the fluentd log forwarding daemon.
 *
 * Any number of threads post records through a shared `Client`; a
 * background worker marshals them and a companion writer thread sends them
 * to fluentd over TCP or a Unix socket. Records are fire-and-forget by default, or acknowledged by
 * the worker when posted with `with_sync_append(true)`.
 *
 * # Quick start
 *
 * ```ignore
 * use std::time::Duration;
 * use serde_json::json;
 *
 * let client: fluent::Client = fluent::Client::new(&[
 *     fluent::with_address("127.0.0.1:24224"),
 *     fluent::with_tag_prefix("myapp"),
 * ])?;
 *
 * client.post("access", json!({"path": "/", "status": 200}), &[])?;
 * client.post("audit", json!({"user": "42"}), &[fluent::with_sync_append(true)])?;
 *
 * // close, then wait up to 2 s for queued records to be written
 * client.shutdown(Some(Duration::from_secs(2)))?;
 * ```
 *
 * # Module structure
 *
 * - `option` — named options for construction and for each post
 * - `protocol/` — envelope + pool, entry marshaling, defaults
 * - `transport/` — background worker, connection, worker contract
 * - `client` — post / close / shutdown coordination
 * - `guard` — RAII shutdown-on-drop
 */

mod client;
mod error;
mod guard;
mod option;
mod protocol;
mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use client::Client;
pub use error::{Error, Result};
pub use guard::Guard;
pub use option::{
    with_address, with_buffer_limit, with_json_marshaler, with_msgpack_marshaler,
    with_network, with_subsecond, with_sync_append, with_tag_prefix, with_timestamp,
    with_write_threshold, Opt,
};
pub use protocol::envelope::{Envelope, EnvelopePool, Reply};
pub use protocol::marshal::{EventTime, Marshaler};
pub use transport::{Network, Spawn, Worker, WorkerConfig, WorkerLink};
