//! Server network layer: datagram ingestion, identity stamping and broadcast

use crate::registry::SessionRegistry;
use drone_shared::transport::{Transport, UdpTransport};
use drone_shared::{
    decode, encode, ChatMessage, GameEvent, Packet, PlayerId, Snapshot, MAX_DATAGRAM_SIZE,
    UNASSIGNED_PLAYER,
};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};

/// Tunables for the replication loop
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Sessions beyond this count are ignored until one is evicted
    pub max_players: usize,
    /// Upper bound on datagrams drained per poll so one burst cannot starve the loop
    pub max_datagrams_per_poll: usize,
    /// Sessions silent for longer than this are forgotten; None keeps them forever
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_players: 64,
            max_datagrams_per_poll: 256,
            idle_timeout: None,
        }
    }
}

/// Counters for periodic monitoring
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerStats {
    pub received: u64,
    pub dropped: u64,
    pub snapshots: u64,
    pub relayed: u64,
    pub sent: u64,
    pub send_failures: u64,
}

/// Authoritative replication server
///
/// Owns its transport and session registry. Every accepted snapshot is
/// stamped with the server clock, stored as the player's latest state and
/// followed by a broadcast of all stored snapshots to all known addresses.
pub struct Server<T: Transport> {
    transport: T,
    registry: SessionRegistry,
    config: ServerConfig,
    started: Instant,
    last_stamp: f64,
    stats: ServerStats,
}

impl Server<UdpTransport> {
    /// Binds the UDP socket. A bind failure is fatal for the caller.
    pub async fn bind(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let transport = UdpTransport::bind(addr).await?;
        info!("Server listening on {}", transport.local_addr()?);
        Ok(Self::with_transport(transport, config))
    }

    /// Main server loop: wait for socket readiness, drain, repeat
    ///
    /// Runs until the socket reports an unrecoverable error. Maintenance
    /// (idle eviction, stats) runs once per second in between.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut maintenance = interval(Duration::from_secs(1));
        maintenance.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                ready = self.transport.readable() => {
                    if let Err(e) = ready {
                        error!("Socket failed: {}", e);
                        return Err(e.into());
                    }
                    self.poll();
                },

                _ = maintenance.tick() => {
                    ticks += 1;
                    self.maintain();

                    if ticks % 10 == 0 && !self.registry.is_empty() {
                        let stats = self.stats;
                        debug!(
                            "{} players, {} received, {} dropped, {} sent, {} send failures",
                            self.registry.len(),
                            stats.received,
                            stats.dropped,
                            stats.sent,
                            stats.send_failures
                        );
                    }
                },
            }
        }
    }
}

impl<T: Transport> Server<T> {
    pub fn with_transport(transport: T, config: ServerConfig) -> Self {
        Self {
            transport,
            registry: SessionRegistry::new(config.max_players),
            config,
            started: Instant::now(),
            last_stamp: 0.0,
            stats: ServerStats::default(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Seconds since the server started, never smaller than a previous stamp
    pub fn server_time(&mut self) -> f64 {
        let now = self.started.elapsed().as_secs_f64().max(self.last_stamp);
        self.last_stamp = now;
        now
    }

    /// Drains queued datagrams without blocking
    ///
    /// Stops when the transport has nothing queued or after
    /// `max_datagrams_per_poll` datagrams. Returns how many were handled.
    pub fn poll(&mut self) -> usize {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let mut handled = 0;

        while handled < self.config.max_datagrams_per_poll {
            match self.transport.try_recv_from(&mut buffer) {
                Ok(Some((len, addr))) => {
                    handled += 1;
                    self.handle_datagram(&buffer[..len], addr);
                }
                Ok(None) => break,
                Err(e) => {
                    // e.g. ICMP port unreachable surfacing on the next receive
                    warn!("Error receiving datagram: {}", e);
                    break;
                }
            }
        }

        handled
    }

    /// Processes one datagram from `from`
    pub fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        self.stats.received += 1;

        let Some(packet) = decode(bytes) else {
            debug!("Dropping malformed {}-byte datagram from {}", bytes.len(), from);
            self.stats.dropped += 1;
            return;
        };

        match packet {
            Packet::Snapshot(snapshot) => self.handle_snapshot(snapshot, from),
            Packet::Chat(chat) => self.handle_chat(chat, from),
            Packet::Event(event) => self.handle_event(event, from),
            Packet::Welcome { .. } => {
                debug!("Ignoring server-only record from {}", from);
                self.stats.dropped += 1;
            }
        }
    }

    /// Forgets idle sessions if an idle timeout is configured
    pub fn maintain(&mut self) -> Vec<PlayerId> {
        match self.config.idle_timeout {
            Some(timeout) => self.registry.evict_idle(timeout),
            None => Vec::new(),
        }
    }

    fn resolve(&mut self, from: SocketAddr) -> Option<PlayerId> {
        match self.registry.resolve(from) {
            Some((id, is_new)) => {
                if is_new {
                    debug!("Learned {} as player {}", from, id);
                }
                Some(id)
            }
            None => {
                warn!("Server full, ignoring {}", from);
                self.stats.dropped += 1;
                None
            }
        }
    }

    fn handle_snapshot(&mut self, mut snapshot: Snapshot, from: SocketAddr) {
        let Some(id) = self.resolve(from) else {
            return;
        };

        // Anything but our own id means the client has not learned it yet
        // (or lost the previous Welcome), so teach it again.
        if snapshot.player_id != id {
            if snapshot.player_id != UNASSIGNED_PLAYER {
                warn!(
                    "{} claimed player {} but is bound to player {}",
                    from, snapshot.player_id, id
                );
            }
            let welcome = Packet::Welcome {
                player_id: id,
                server_time: self.server_time(),
            };
            self.send_packet(&welcome, from);
        }

        snapshot.player_id = id;
        snapshot.server_time = self.server_time();
        self.registry.store_snapshot(id, snapshot);
        self.stats.snapshots += 1;

        self.broadcast_world();
    }

    fn handle_chat(&mut self, mut chat: ChatMessage, from: SocketAddr) {
        let Some(id) = self.resolve(from) else {
            return;
        };

        chat.player_id = id;
        info!("[chat] {} ({}): {}", chat.name, id, chat.text);
        self.relay(&Packet::Chat(chat));
    }

    fn handle_event(&mut self, mut event: GameEvent, from: SocketAddr) {
        let Some(id) = self.resolve(from) else {
            return;
        };

        event.owner_id = id;
        event.server_time = self.server_time();
        self.relay(&Packet::Event(event));
    }

    /// Sends every stored snapshot to every known address
    ///
    /// O(players²) datagrams per call. Returns the number of successful sends.
    fn broadcast_world(&mut self) -> usize {
        let addrs = self.registry.addresses();
        let payloads: Vec<Vec<u8>> = self
            .registry
            .snapshots()
            .into_iter()
            .filter_map(|snapshot| match encode(&Packet::Snapshot(snapshot)) {
                Ok(data) => Some(data),
                Err(e) => {
                    error!("Failed to encode snapshot of player {}: {}", snapshot.player_id, e);
                    None
                }
            })
            .collect();

        let mut sent = 0;
        for addr in addrs {
            for payload in &payloads {
                if self.send_bytes(payload, addr) {
                    sent += 1;
                }
            }
        }
        sent
    }

    /// Sends one packet to every known address
    fn relay(&mut self, packet: &Packet) -> usize {
        let data = match encode(packet) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode relayed packet: {}", e);
                return 0;
            }
        };

        self.stats.relayed += 1;
        let mut sent = 0;
        for addr in self.registry.addresses() {
            if self.send_bytes(&data, addr) {
                sent += 1;
            }
        }
        sent
    }

    fn send_packet(&mut self, packet: &Packet, addr: SocketAddr) -> bool {
        match encode(packet) {
            Ok(data) => self.send_bytes(&data, addr),
            Err(e) => {
                error!("Failed to encode packet for {}: {}", addr, e);
                false
            }
        }
    }

    fn send_bytes(&mut self, data: &[u8], addr: SocketAddr) -> bool {
        match self.transport.send_to(data, addr) {
            Ok(_) => {
                self.stats.sent += 1;
                true
            }
            Err(e) => {
                warn!("Failed to send to {}: {}", addr, e);
                self.stats.send_failures += 1;
                false
            }
        }
    }
}
