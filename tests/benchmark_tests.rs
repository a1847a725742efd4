//! Performance benchmarks for the replication hot paths

use drone_client::replication::ReplicationTable;
use drone_client::snapshot_buffer::SnapshotBuffer;
use drone_server::network::{Server, ServerConfig};
use drone_shared::transport::MemoryTransport;
use drone_shared::{decode, encode, Packet, PlayerId, Pose, Snapshot, SNAPSHOT_BUFFER_CAPACITY};
use std::net::SocketAddr;
use std::time::Instant;

fn snapshot(id: PlayerId, time: f64) -> Snapshot {
    Snapshot::new(id, Pose::new(time as f32, 1.0, 2.0, 0.0, 0.0, 0.0), time)
}

fn client_addr(i: u16) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], 20_000 + i))
}

/// Benchmarks snapshot buffer ingestion at steady state (always evicting)
#[test]
fn benchmark_buffer_push() {
    let mut buffer = SnapshotBuffer::default();
    let iterations = 200_000;
    let start = Instant::now();

    for i in 0..iterations {
        buffer.push(snapshot(1, i as f64));
    }

    let duration = start.elapsed();
    println!(
        "Buffer push: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(buffer.len(), SNAPSHOT_BUFFER_CAPACITY);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks bracket lookup across a full buffer
#[test]
fn benchmark_buffer_sample() {
    let mut buffer = SnapshotBuffer::default();
    for i in 0..SNAPSHOT_BUFFER_CAPACITY {
        buffer.push(snapshot(1, i as f64));
    }

    let iterations = 100_000;
    let span = SNAPSHOT_BUFFER_CAPACITY as f64 - 1.0;
    let start = Instant::now();
    let mut found = 0;

    for i in 0..iterations {
        let t = (i as f64 / iterations as f64) * span;
        if buffer.interpolate(t).is_some() {
            found += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Buffer sample: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(found, iterations);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks snapshot encode + strict decode
#[test]
fn benchmark_packet_codec() {
    let packet = Packet::Snapshot(snapshot(7, 123.456));
    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let data = encode(&packet).unwrap();
        assert!(decode(&data).is_some());
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks the O(players²) broadcast for a busy session
#[test]
fn benchmark_server_broadcast() {
    let players: u16 = 32;
    let mut server = Server::with_transport(
        MemoryTransport::new(SocketAddr::from(([0, 0, 0, 0], 7777))),
        ServerConfig::default(),
    );

    for i in 0..players {
        let data = encode(&Packet::Snapshot(snapshot(0, 0.0))).unwrap();
        server.handle_datagram(&data, client_addr(i));
    }
    server.transport().take_sent();

    let rounds = 100;
    let start = Instant::now();
    let mut total_sent = 0;

    for round in 0..rounds {
        let sender = (round % players as usize) as u16;
        let id = server.registry().find_by_addr(client_addr(sender)).unwrap();
        let data = encode(&Packet::Snapshot(snapshot(id, 0.0))).unwrap();
        server.handle_datagram(&data, client_addr(sender));
        total_sent += server.transport().take_sent().len();
    }

    let duration = start.elapsed();
    println!(
        "Broadcast: {} players × {} snapshots -> {} datagrams in {:?}",
        players, rounds, total_sent, duration
    );

    let per_round = players as usize * players as usize;
    assert_eq!(total_sent, rounds * per_round);
    assert!(duration.as_millis() < 10_000);
}

/// Benchmarks table ingestion spread across many players
#[test]
fn benchmark_table_ingest() {
    let mut table = ReplicationTable::default();
    let players = 50;
    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let id = (i % players) as PlayerId + 1;
        table.ingest(snapshot(id, (i / players) as f64));
    }

    let duration = start.elapsed();
    println!(
        "Table ingest: {} snapshots over {} players in {:?}",
        iterations, players, duration
    );

    assert_eq!(table.len(), players);
    assert!(duration.as_millis() < 5000);
}
