/**
 * RAII guard that shuts a client down when it goes out of scope.
 *
 * ```ignore
 * fn main() {
 *     let client = Arc::new(fluent::Client::new(&[])?);
 *     let _guard = fluent::Guard::new(Arc::clone(&client), Duration::from_secs(2));
 *
 *     client.post("app.start", json!({"pid": 42}), &[])?;
 *
 * }   // <-- _guard is dropped here: close, then wait up to 2 s for the drain
 * ```
 *
 * If the drain does not finish in time the guard drops anyway; the worker
 * keeps draining in the background until the process exits.
 */
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::client::Client;
use crate::error::Error;

pub struct Guard<R> {
    client: Arc<Client<R>>,
    timeout: Duration,
}

impl<R> Guard<R> {
    /**
     * Wraps a shared client so that it is shut down on drop.
     *
     * # Arguments
     * * `client` - The client to shut down; other clones stay usable until then
     * * `timeout` - How long the drop waits for the worker to drain
     */
    pub fn new(client: Arc<Client<R>>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn client(&self) -> &Arc<Client<R>> {
        &self.client
    }
}

impl<R> Drop for Guard<R> {
    fn drop(&mut self) {
        match self.client.shutdown(Some(self.timeout)) {
            Ok(()) => {}
            Err(Error::DeadlineExceeded) => {
                warn!("shutdown timed out after {:?}; some records may not have been sent", self.timeout);
            }
            Err(err) => warn!("shutdown failed: {err}"),
        }
    }
}
