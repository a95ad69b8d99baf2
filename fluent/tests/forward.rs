/**
 * End-to-end tests: a real `Client` and worker forwarding to a local
 * listener standing in for fluentd.
 */
use std::io::Read;
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, UNIX_EPOCH};

use fluent::{
    with_address, with_buffer_limit, with_json_marshaler, with_msgpack_marshaler, with_subsecond,
    with_sync_append, with_tag_prefix, with_timestamp, with_write_threshold, Client, Error, Opt,
};
use rstest::rstest;
use serde_json::{json, Value};

type Entry = (String, i64, Value);

/// Accepts one connection and returns everything written to it.
fn collect_one_connection(listener: TcpListener) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).unwrap();
        received
    })
}

fn decode(marshaler: &Opt, bytes: &[u8]) -> Vec<Entry> {
    match marshaler {
        Opt::Marshaler(fluent::Marshaler::Json) => serde_json::Deserializer::from_slice(bytes)
            .into_iter::<Entry>()
            .map(|entry| entry.unwrap())
            .collect(),
        _ => {
            let mut reader = bytes;
            let mut entries = Vec::new();
            while !reader.is_empty() {
                entries.push(rmp_serde::decode::from_read::<_, Entry>(&mut reader).unwrap());
            }
            entries
        }
    }
}

#[rstest]
#[case::msgpack(with_msgpack_marshaler())]
#[case::json(with_json_marshaler())]
fn test_records_reach_the_server_in_order(#[case] marshaler: Opt) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let server = collect_one_connection(listener);

    let client: Client = Client::new(&[with_address(address), marshaler.clone()]).unwrap();
    let at = UNIX_EPOCH + Duration::from_secs(1_600_000_000);

    client
        .post("web.access", json!({"path": "/", "status": 200}), &[with_timestamp(at)])
        .unwrap();
    client
        .post("web.access", json!({"path": "/login", "status": 302}), &[with_timestamp(at)])
        .unwrap();
    client
        .post("audit", json!({"user": "42"}), &[with_sync_append(true), with_timestamp(at)])
        .unwrap();

    client.shutdown(Some(Duration::from_secs(5))).unwrap();

    let entries = decode(&marshaler, &server.join().unwrap());
    assert_eq!(
        entries,
        vec![
            ("web.access".into(), 1_600_000_000, json!({"path": "/", "status": 200})),
            ("web.access".into(), 1_600_000_000, json!({"path": "/login", "status": 302})),
            ("audit".into(), 1_600_000_000, json!({"user": "42"})),
        ]
    );
}

#[test]
fn test_tag_prefix_is_applied() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let server = collect_one_connection(listener);

    let client: Client = Client::new(&[
        with_address(address),
        with_json_marshaler(),
        with_tag_prefix("myapp"),
    ])
    .unwrap();
    client.post("started", json!(true), &[with_sync_append(true)]).unwrap();
    client.shutdown(None).unwrap();

    let entries = decode(&with_json_marshaler(), &server.join().unwrap());
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, "myapp.started");
    assert_eq!(entries[0].2, json!(true));
}

#[test]
fn test_oversized_record_is_rejected_with_sync_append() {
    /* Bound but never accepted; the connection just sits in the backlog. */
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let client: Client = Client::new(&[
        with_address(address),
        with_buffer_limit(64),
        with_write_threshold(64),
    ])
    .unwrap();

    let big = json!({"message": "x".repeat(128)});
    match client.post("big", big.clone(), &[with_sync_append(true)]) {
        Err(Error::BufferFull { limit, .. }) => assert_eq!(limit, 64),
        other => panic!("expected BufferFull, got {other:?}"),
    }

    /* Without sync_append the same rejection goes unreported. */
    client.post("big", big, &[]).unwrap();
    client.post("small", json!(1), &[with_sync_append(true)]).unwrap();

    client.shutdown(Some(Duration::from_secs(5))).unwrap();
    drop(listener);
}

#[test]
fn test_unreachable_server_does_not_block_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let client: Client = Client::new(&[with_address(address)]).unwrap();
    client.post("lost", json!({"n": 1}), &[with_sync_append(true)]).unwrap();

    client.shutdown(Some(Duration::from_secs(5))).unwrap();
    assert!(client.is_drained());
    assert!(matches!(client.post("lost", json!({}), &[]), Err(Error::ClientClosed)));
}

#[test]
fn test_stalled_server_does_not_block_posts() {
    /* Connections land in the backlog and are never read, so the writer
     * blocks once the socket buffers are full. */
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let client: Client = Client::new(&[
        with_address(address),
        with_buffer_limit(128 << 20),
        with_write_threshold(0),
    ])
    .unwrap();

    client.post("big", json!("x".repeat(32 << 20)), &[]).unwrap();
    thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    client.post("small", json!(1), &[]).unwrap();
    client.post("small", json!(2), &[with_sync_append(true)]).unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed < Duration::from_millis(500), "posts took {elapsed:?} behind a stalled server");

    client.close().unwrap();
    drop(listener);
}

#[test]
fn test_steady_trickle_is_flushed_every_interval() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (arrived_tx, arrived_rx) = crossbeam_channel::bounded(1);
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut first = [0u8; 1];
        stream.read_exact(&mut first).unwrap();
        let _ = arrived_tx.send(());
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
    });

    /* Default 8 KiB threshold; forty small records stay well below it. */
    let client: Client = Client::new(&[with_address(address), with_json_marshaler()]).unwrap();

    let mut arrived = false;
    for n in 0..40 {
        client.post("trickle", json!({"n": n}), &[]).unwrap();
        thread::sleep(Duration::from_millis(25));
        if arrived_rx.try_recv().is_ok() {
            arrived = true;
            break;
        }
    }
    assert!(arrived, "no bytes reached the server while records kept arriving");

    client.shutdown(Some(Duration::from_secs(5))).unwrap();
    server.join().unwrap();
}

#[test]
fn test_subsecond_time_is_sent_as_event_time() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let server = collect_one_connection(listener);

    let client: Client = Client::new(&[with_address(address), with_subsecond(true)]).unwrap();
    let at = UNIX_EPOCH + Duration::new(1_600_000_000, 250_000_000);
    client.post("t", json!(1), &[with_timestamp(at)]).unwrap();
    client.shutdown(Some(Duration::from_secs(5))).unwrap();

    let mut expected = vec![0x93, 0xa1, b't', 0xd7, 0x00];
    expected.extend_from_slice(&1_600_000_000u32.to_be_bytes());
    expected.extend_from_slice(&250_000_000u32.to_be_bytes());
    expected.push(0x01);
    assert_eq!(server.join().unwrap(), expected);
}

#[test]
fn test_invalid_options_fail_construction() {
    let result: fluent::Result<Client> = Client::new(&[fluent::with_network("udp")]);
    assert!(matches!(result, Err(Error::InvalidOption { name: "network", .. })));
}

#[cfg(unix)]
#[test]
fn test_unix_socket_transport() {
    use std::os::unix::net::UnixListener;

    let path = std::env::temp_dir().join(format!("fluent-test-{}.sock", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).unwrap();
    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).unwrap();
        received
    });

    let client: Client = Client::new(&[
        fluent::with_network("unix"),
        with_address(path.to_string_lossy()),
        with_json_marshaler(),
    ])
    .unwrap();
    client
        .post("local", json!("hi"), &[with_timestamp(UNIX_EPOCH + Duration::from_secs(7))])
        .unwrap();
    client.shutdown(Some(Duration::from_secs(5))).unwrap();

    let received = server.join().unwrap();
    assert_eq!(received, br#"["local",7,"hi"]"#.to_vec());
    let _ = std::fs::remove_file(&path);
}
