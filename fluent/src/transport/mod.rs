/**
 * Transport layer — the background worker and everything it uses to reach
 * fluentd.
 *
 * - `worker` — reader and writer threads, the `WorkerLink`/`Spawn` contract
 * - `config` — worker configuration built from options
 * - `connection` — TCP / Unix socket wrapper
 * - `backoff` — reconnect pacing
 */

mod backoff;
pub mod config;
mod connection;
pub mod worker;

pub use config::{Network, WorkerConfig};
pub use worker::{Spawn, Worker, WorkerLink};
