use clap::Parser;
use drone_client::input::FlightPath;
use drone_client::network::{Client, ClientConfig, SessionOptions};
use drone_shared::{DEFAULT_PORT, SNAPSHOT_BUFFER_CAPACITY};
use log::{error, info};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server UDP port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Pilot name shown in chat
    #[arg(short, long, default_value = "pilot")]
    name: String,

    /// Pose updates sent per second
    #[arg(short, long, default_value = "30")]
    send_rate: u32,

    /// How far behind the server clock remote players are drawn
    #[arg(long, default_value = "100")]
    interp_delay_ms: u64,

    /// Drop remote players silent for this many seconds
    #[arg(long, default_value = "5")]
    stale_timeout_secs: u64,

    /// Radius of the circle the headless drone flies
    #[arg(short, long, default_value = "20.0")]
    radius: f32,

    /// Fire an event every N seconds (0 disables)
    #[arg(long, default_value = "0")]
    fire_every_secs: u64,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let server = format!("{}:{}", args.host, args.port);

    info!("Starting client...");
    info!("Connecting to: {}", server);

    let config = ClientConfig {
        interpolation_delay: Duration::from_millis(args.interp_delay_ms),
        buffer_capacity: SNAPSHOT_BUFFER_CAPACITY,
        ..ClientConfig::default()
    };

    let mut client = match Client::connect(&server, config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to set up client for {}: {}", server, e);
            std::process::exit(1);
        }
    };

    let options = SessionOptions {
        name: args.name,
        send_interval: Duration::from_secs_f64(1.0 / args.send_rate.max(1) as f64),
        render_interval: Duration::from_millis(16),
        stale_timeout: Duration::from_secs(args.stale_timeout_secs),
        fire_interval: (args.fire_every_secs > 0).then(|| Duration::from_secs(args.fire_every_secs)),
    };
    let path = FlightPath::new(args.radius, 10.0, Duration::from_secs(12));

    tokio::select! {
        result = client.run(path, options) => {
            if let Err(e) = result {
                error!("Client stopped: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, leaving as player {}", client.player_id());
        }
    }
}
