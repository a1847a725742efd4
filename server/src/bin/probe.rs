//! Minimal protocol probe: joins a running server, flies a few snapshots and
//! prints what comes back.

use clap::Parser;
use drone_shared::{decode, encode, Packet, Pose, Snapshot, DEFAULT_PORT, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[command(about = "Send a few snapshots to a replication server and dump the replies")]
struct Args {
    /// Server address
    #[arg(short, long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    server: SocketAddr,

    /// Number of snapshots to send
    #[arg(short, long, default_value = "5")]
    count: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Probe socket bound to {}", socket.local_addr()?);

    let mut player_id = 0;
    let mut buf = [0u8; MAX_DATAGRAM_SIZE];

    for i in 0..args.count {
        let angle = i as f32 * 0.5;
        let pose = Pose::new(angle.cos() * 10.0, 5.0, angle.sin() * 10.0, angle, 0.0, 0.0);
        let data = encode(&Packet::Snapshot(Snapshot::new(player_id, pose, 0.0)))?;
        socket.send_to(&data, args.server).await?;
        println!("Sent snapshot {} as player {}", i, player_id);

        // Print everything that arrives within the next 200ms
        while let Ok(received) = timeout(Duration::from_millis(200), socket.recv_from(&mut buf)).await {
            let (len, from) = received?;
            match decode(&buf[..len]) {
                Some(Packet::Welcome {
                    player_id: assigned,
                    server_time,
                }) => {
                    println!("Welcome from {}: player {} at t={:.3}", from, assigned, server_time);
                    player_id = assigned;
                }
                Some(Packet::Snapshot(s)) => println!(
                    "  player {} at ({:.2}, {:.2}, {:.2}) t={:.3}",
                    s.player_id, s.x, s.y, s.z, s.server_time
                ),
                Some(other) => println!("  {:?}", other),
                None => println!("  undecodable {}-byte datagram from {}", len, from),
            }
        }

        sleep(Duration::from_millis(100)).await;
    }

    println!("Probe finished");
    Ok(())
}
