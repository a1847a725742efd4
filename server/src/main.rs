use clap::Parser;
use drone_server::network::{Server, ServerConfig};
use drone_shared::DEFAULT_PORT;
use log::{error, info};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// UDP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Maximum number of concurrent players
    #[arg(short, long, default_value = "64")]
    max_players: usize,

    /// Datagrams handled per wakeup before yielding
    #[arg(long, default_value = "256")]
    max_datagrams_per_poll: usize,

    /// Forget players silent for this many seconds (0 keeps them forever)
    #[arg(long, default_value = "0")]
    idle_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let config = ServerConfig {
        max_players: args.max_players,
        max_datagrams_per_poll: args.max_datagrams_per_poll.max(1),
        idle_timeout: (args.idle_timeout_secs > 0)
            .then(|| Duration::from_secs(args.idle_timeout_secs)),
    };

    let mut server = match Server::bind(&address, config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {}", address, e);
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    let stats = server.stats();
    info!(
        "Served {} players: {} datagrams in, {} out, {} dropped",
        server.registry().len(),
        stats.received,
        stats.sent,
        stats.dropped
    );
}
