/**
 * Minimal harness for the fluent client.
 *
 * Start a fluentd (or anything listening) on 127.0.0.1:24224, then run:
 *
 *   cargo run -p fluent_demo
 *   cargo run -p fluent_demo -- --json       # JSON instead of MessagePack
 *   cargo run -p fluent_demo -- --log        # also forward `log` records
 */
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let use_json = args.iter().any(|a| a == "--json");
    let forward_log = args.iter().any(|a| a == "--log");

    let mut options = vec![
        fluent::with_address("127.0.0.1:24224"),
        fluent::with_tag_prefix("demo"),
    ];
    if use_json {
        options.push(fluent::with_json_marshaler());
    }

    let client: Arc<fluent::Client> = match fluent::Client::new(&options) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            eprintln!("[demo] failed to create client: {err}");
            std::process::exit(1);
        }
    };

    /*
     * The log bridge needs its own client because it posts `LogEntry`
     * records rather than JSON values.
     */
    let log_guard = if forward_log {
        match fluent::Client::new(&options) {
            Ok(log_client) => {
                let log_client = Arc::new(log_client);
                if let Err(err) = fluent_log::install(Arc::clone(&log_client), "log", log::LevelFilter::Info) {
                    eprintln!("[demo] failed to install logger: {err}");
                }
                Some(fluent::Guard::new(log_client, Duration::from_secs(2)))
            }
            Err(err) => {
                eprintln!("[demo] failed to create log client: {err}");
                None
            }
        }
    } else {
        None
    };

    /*
     * Fire-and-forget: returns as soon as the worker has the record.
     */
    match client.post("access", json!({"path": "/", "status": 200}), &[]) {
        Ok(()) => println!("[demo] posted access record"),
        Err(err) => eprintln!("[demo] post failed: {err}"),
    }

    /*
     * Synchronous append: waits for the worker to accept or reject it.
     */
    let result = client.post(
        "audit",
        json!({"user": "42", "action": "login"}),
        &[fluent::with_sync_append(true)],
    );
    match result {
        Ok(()) => println!("[demo] audit record accepted"),
        Err(err) => eprintln!("[demo] audit record rejected: {err}"),
    }

    /*
     * Nanosecond time for one record (MessagePack only).
     */
    if let Err(err) = client.post("timing", json!({"step": "warmup"}), &[fluent::with_subsecond(true)]) {
        eprintln!("[demo] post failed: {err}");
    }

    log::info!("demo finished posting");

    match client.shutdown(Some(Duration::from_secs(2))) {
        Ok(()) => println!("[demo] shut down cleanly"),
        Err(err) => eprintln!("[demo] shutdown: {err}"),
    }
    drop(log_guard);
}
