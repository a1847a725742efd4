//! Integration tests for the replication core
//!
//! These tests run the real server loop on localhost UDP and talk to it both
//! with raw sockets and with the client library.

use drone_client::network::{Client, ClientConfig};
use drone_server::network::{Server, ServerConfig};
use drone_shared::transport::UdpTransport;
use drone_shared::{decode, encode, Packet, PlayerId, Pose, Snapshot, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::LocalSet;
use tokio::time::{sleep, timeout};
use tokio_test::assert_ok;

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// A snapshot record survives a real UDP hop as exactly one datagram
    #[tokio::test]
    async fn snapshot_crosses_udp_as_one_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let snapshot = Snapshot::new(4, Pose::new(1.0, 2.0, 3.0, 0.1, 0.2, 0.3), 8.0);
        let data = encode(&Packet::Snapshot(snapshot)).unwrap();
        sender
            .send_to(&data, receiver.local_addr().unwrap())
            .await
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("datagram never arrived")
            .unwrap();

        assert_eq!(len, data.len());
        assert_eq!(decode(&buf[..len]), Some(Packet::Snapshot(snapshot)));
    }

    /// Truncated, corrupted, padded and empty datagrams are all rejected
    #[test]
    fn malformed_packet_handling() {
        let valid = encode(&Packet::Snapshot(Snapshot::new(1, Pose::default(), 0.0))).unwrap();

        let truncated = &valid[..valid.len() / 2];
        assert!(decode(truncated).is_none(), "truncated datagram accepted");

        let mut corrupted = valid.clone();
        corrupted[0] = 0xFF;
        assert!(decode(&corrupted).is_none(), "corrupted tag accepted");

        let mut padded = valid.clone();
        padded.extend_from_slice(&[0, 0, 0, 0]);
        assert!(decode(&padded).is_none(), "padded datagram accepted");

        assert!(decode(&[]).is_none(), "empty datagram accepted");

        // Raw bincode of a bare snapshot struct lacks the record tag
        let untagged = bincode::serialize(&Snapshot::new(1, Pose::default(), 0.0)).unwrap();
        assert!(decode(&untagged).is_none(), "untagged record accepted");
    }
}

/// CLIENT-SERVER INTEGRATION TESTS
mod client_server_tests {
    use super::*;

    async fn start_server() -> SocketAddr {
        let mut server = Server::bind("127.0.0.1:0", ServerConfig::default())
            .await
            .expect("failed to bind server");
        let addr = server.local_addr().unwrap();
        tokio::task::spawn_local(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn send_snapshot(socket: &UdpSocket, server: SocketAddr, player_id: PlayerId) {
        let snapshot = Snapshot::new(player_id, Pose::new(1.0, 2.0, 3.0, 0.0, 0.0, 0.0), 0.0);
        let data = assert_ok!(encode(&Packet::Snapshot(snapshot)));
        assert_ok!(socket.send_to(&data, server).await);
    }

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for server")
            .unwrap();
        decode(&buf[..len]).expect("server sent undecodable datagram")
    }

    fn snapshot_id(packet: &Packet) -> PlayerId {
        match packet {
            Packet::Snapshot(s) => s.player_id,
            other => panic!("Expected snapshot, got {:?}", other),
        }
    }

    /// Waits briefly for the client socket, then drains whatever arrived
    async fn pump(client: &mut Client<UdpTransport>) {
        let ready = timeout(Duration::from_millis(20), client.transport().readable())
            .await
            .is_ok();
        if ready {
            client.poll();
        }
    }

    /// Address learning, Welcome records and world broadcast over real UDP
    #[tokio::test]
    async fn server_assigns_ids_and_broadcasts_world() {
        LocalSet::new()
            .run_until(async {
                let server = start_server().await;
                let alpha = UdpSocket::bind("127.0.0.1:0").await.unwrap();
                let bravo = UdpSocket::bind("127.0.0.1:0").await.unwrap();

                send_snapshot(&alpha, server, 0).await;
                match recv_packet(&alpha).await {
                    Packet::Welcome { player_id, .. } => assert_eq!(player_id, 1),
                    other => panic!("Expected welcome, got {:?}", other),
                }
                assert_eq!(snapshot_id(&recv_packet(&alpha).await), 1);

                send_snapshot(&bravo, server, 0).await;
                match recv_packet(&bravo).await {
                    Packet::Welcome { player_id, .. } => assert_eq!(player_id, 2),
                    other => panic!("Expected welcome, got {:?}", other),
                }

                // Both clients now receive the full world: players 1 and 2
                let mut alpha_ids = vec![
                    snapshot_id(&recv_packet(&alpha).await),
                    snapshot_id(&recv_packet(&alpha).await),
                ];
                let mut bravo_ids = vec![
                    snapshot_id(&recv_packet(&bravo).await),
                    snapshot_id(&recv_packet(&bravo).await),
                ];
                alpha_ids.sort();
                bravo_ids.sort();
                assert_eq!(alpha_ids, vec![1, 2]);
                assert_eq!(bravo_ids, vec![1, 2]);

                // Echoing the assigned id gets no further Welcome
                send_snapshot(&alpha, server, 1).await;
                assert_eq!(snapshot_id(&recv_packet(&alpha).await), 1);
            })
            .await;
    }

    /// Server-stamped times received by one client strictly increase per player
    #[tokio::test]
    async fn broadcast_times_are_monotonic() {
        LocalSet::new()
            .run_until(async {
                let server = start_server().await;
                let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

                send_snapshot(&socket, server, 0).await;
                let _welcome = recv_packet(&socket).await;

                let mut times = Vec::new();
                for _ in 0..5 {
                    if let Packet::Snapshot(s) = recv_packet(&socket).await {
                        times.push(s.server_time);
                    }
                    sleep(Duration::from_millis(5)).await;
                    send_snapshot(&socket, server, 1).await;
                }

                assert_eq!(times.len(), 5);
                assert!(times.windows(2).all(|w| w[0] < w[1]), "{:?}", times);
            })
            .await;
    }

    /// Two library clients see each other through the server
    #[tokio::test]
    async fn clients_replicate_each_other() {
        LocalSet::new()
            .run_until(async {
                let server = start_server().await.to_string();
                let mut alpha: Client<UdpTransport> =
                    Client::connect(&server, ClientConfig::default()).await.unwrap();
                let mut bravo: Client<UdpTransport> =
                    Client::connect(&server, ClientConfig::default()).await.unwrap();

                for i in 0..25 {
                    let x = i as f32;
                    assert_ok!(alpha.send_pose(Pose::new(x, 10.0, 0.0, 0.0, 0.0, 0.0)));
                    assert_ok!(bravo.send_pose(Pose::new(-x, 10.0, 0.0, 0.0, 0.0, 0.0)));
                    sleep(Duration::from_millis(10)).await;

                    pump(&mut alpha).await;
                    pump(&mut bravo).await;
                }

                assert!(alpha.is_assigned());
                assert!(bravo.is_assigned());
                assert_ne!(alpha.player_id(), bravo.player_id());

                let bravo_buffer = alpha
                    .table()
                    .get(bravo.player_id())
                    .expect("alpha never heard of bravo");
                assert!(bravo_buffer.len() >= 2);
                assert!(bravo_buffer
                    .iter()
                    .collect::<Vec<_>>()
                    .windows(2)
                    .all(|w| w[0].server_time < w[1].server_time));

                let poses = alpha.remote_poses();
                assert_eq!(poses.len(), 1);
                assert_eq!(poses[0].0, bravo.player_id());
                assert!(poses[0].1.x <= 0.0);
            })
            .await;
    }
}
