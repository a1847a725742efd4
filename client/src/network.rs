use crate::game::{RemoteView, ServerClock, DEFAULT_INTERPOLATION_DELAY};
use crate::input::FlightPath;
use crate::replication::ReplicationTable;
use drone_shared::transport::{Transport, UdpTransport};
use drone_shared::{
    decode, encode, ChatMessage, EventKind, GameEvent, Packet, PlayerId, Pose, Snapshot,
    MAX_DATAGRAM_SIZE, SNAPSHOT_BUFFER_CAPACITY, UNASSIGNED_PLAYER,
};
use log::{debug, error, info, warn};
use rand::Rng;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::time::{interval, MissedTickBehavior};

const CHAT_HISTORY: usize = 32;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub interpolation_delay: Duration,
    pub buffer_capacity: usize,
    pub max_datagrams_per_poll: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interpolation_delay: DEFAULT_INTERPOLATION_DELAY,
            buffer_capacity: SNAPSHOT_BUFFER_CAPACITY,
            max_datagrams_per_poll: 256,
        }
    }
}

/// Timers and identity used by [`Client::run`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub name: String,
    pub send_interval: Duration,
    pub render_interval: Duration,
    /// Remote players silent for longer than this are dropped from the table.
    pub stale_timeout: Duration,
    pub fire_interval: Option<Duration>,
}

pub struct Client<T: Transport> {
    transport: T,
    server_addr: SocketAddr,
    player_id: PlayerId,
    config: ClientConfig,

    table: ReplicationTable,
    clock: ServerClock,
    view: RemoteView,

    chat_log: VecDeque<ChatMessage>,
    events: Vec<GameEvent>,
}

impl Client<UdpTransport> {
    /// Resolves the server address and binds an ephemeral local socket.
    pub async fn connect(
        server: &str,
        config: ClientConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let candidates: Vec<SocketAddr> = lookup_host(server).await?.collect();
        let server_addr =
            preferred_addr(&candidates).ok_or_else(|| format!("could not resolve {}", server))?;

        let local = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let transport = UdpTransport::bind(local).await?;
        info!(
            "Client bound to {}, server at {}",
            transport.local_addr()?,
            server_addr
        );

        Ok(Self::with_transport(transport, server_addr, config))
    }

    pub async fn run(
        &mut self,
        mut path: FlightPath,
        options: SessionOptions,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut send_interval = interval(options.send_interval);
        let mut render_interval = interval(options.render_interval);
        let mut status_interval = interval(Duration::from_secs(2));
        let mut fire_interval = interval(options.fire_interval.unwrap_or(Duration::from_secs(3600)));
        for timer in [
            &mut send_interval,
            &mut render_interval,
            &mut status_interval,
            &mut fire_interval,
        ] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        }

        let mut greeted = false;
        let mut last_pose = Pose::default();

        loop {
            tokio::select! {
                ready = self.transport.readable() => {
                    if let Err(e) = ready {
                        error!("Socket failed: {}", e);
                        return Err(e.into());
                    }
                    self.poll();
                },

                _ = send_interval.tick() => {
                    let (sequence, pose) = path.sample();
                    last_pose = pose;
                    if let Err(e) = self.send_pose(pose) {
                        warn!("Failed to send pose {}: {}", sequence, e);
                    }
                },

                _ = render_interval.tick() => {
                    let poses = self.remote_poses();
                    for (id, pose) in &poses {
                        debug!("player {} at ({:.2}, {:.2}, {:.2}) yaw {:.2}", id, pose.x, pose.y, pose.z, pose.yaw);
                    }
                    for event in self.take_events() {
                        info!("{:?} by player {} at ({:.1}, {:.1}, {:.1})", event.kind, event.owner_id, event.x, event.y, event.z);
                    }
                },

                _ = fire_interval.tick(), if options.fire_interval.is_some() && self.is_assigned() => {
                    let seed = rand::thread_rng().gen();
                    if let Err(e) = self.send_event(EventKind::Fire, last_pose, seed) {
                        warn!("Failed to send event: {}", e);
                    }
                },

                _ = status_interval.tick() => {
                    for id in self.evict_stale(options.stale_timeout) {
                        info!("Player {} went silent, dropping", id);
                    }

                    if self.is_assigned() && !greeted {
                        greeted = true;
                        if let Err(e) = self.send_chat(&options.name, "joined") {
                            warn!("Failed to send chat: {}", e);
                        }
                    }

                    info!(
                        "Player {}: tracking {} remote players, server time {:.2}",
                        self.player_id,
                        self.table.ids().into_iter().filter(|id| *id != self.player_id).count(),
                        self.clock.now().unwrap_or(0.0)
                    );
                },
            }
        }
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T, server_addr: SocketAddr, config: ClientConfig) -> Self {
        Self {
            transport,
            server_addr,
            player_id: UNASSIGNED_PLAYER,
            table: ReplicationTable::new(config.buffer_capacity),
            clock: ServerClock::new(config.interpolation_delay),
            view: RemoteView::new(),
            chat_log: VecDeque::with_capacity(CHAT_HISTORY),
            events: Vec::new(),
            config,
        }
    }

    /// Identity assigned by the server, `0` until the first `Welcome`.
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    pub fn is_assigned(&self) -> bool {
        self.player_id != UNASSIGNED_PLAYER
    }

    pub fn table(&self) -> &ReplicationTable {
        &self.table
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends the local pose, echoing the assigned id (0 before assignment).
    pub fn send_pose(&self, pose: Pose) -> Result<(), Box<dyn std::error::Error>> {
        let snapshot = Snapshot::new(self.player_id, pose, 0.0);
        self.send_packet(&Packet::Snapshot(snapshot))
    }

    pub fn send_chat(&self, name: &str, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        let chat = ChatMessage::new(self.player_id, name, text);
        self.send_packet(&Packet::Chat(chat))
    }

    pub fn send_event(
        &self,
        kind: EventKind,
        at: Pose,
        seed: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let event = GameEvent {
            owner_id: self.player_id,
            kind,
            x: at.x,
            y: at.y,
            z: at.z,
            server_time: 0.0,
            seed,
        };
        self.send_packet(&Packet::Event(event))
    }

    fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = encode(packet)?;
        self.transport.send_to(&data, self.server_addr)?;
        Ok(())
    }

    /// Drains queued datagrams without blocking. Returns how many were read.
    pub fn poll(&mut self) -> usize {
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];
        let mut handled = 0;

        while handled < self.config.max_datagrams_per_poll {
            match self.transport.try_recv_from(&mut buffer) {
                Ok(Some((len, from))) => {
                    handled += 1;
                    self.handle_datagram(&buffer[..len], from);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Error receiving datagram: {}", e);
                    break;
                }
            }
        }

        handled
    }

    pub fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        if from != self.server_addr {
            debug!("Ignoring datagram from {}", from);
            return;
        }

        let Some(packet) = decode(bytes) else {
            debug!("Dropping malformed {}-byte datagram", bytes.len());
            return;
        };

        match packet {
            Packet::Welcome {
                player_id,
                server_time,
            } => {
                if player_id == UNASSIGNED_PLAYER {
                    warn!("Server sent an unassigned id");
                    return;
                }
                if self.player_id != player_id {
                    info!("Assigned player id {}", player_id);
                    self.player_id = player_id;
                }
                self.clock.observe(server_time);
            }
            Packet::Snapshot(snapshot) => {
                self.clock.observe(snapshot.server_time);
                self.table.ingest(snapshot);
            }
            Packet::Chat(chat) => {
                info!("[chat] {}: {}", chat.name, chat.text);
                if self.chat_log.len() == CHAT_HISTORY {
                    self.chat_log.pop_front();
                }
                self.chat_log.push_back(chat);
            }
            Packet::Event(event) => self.events.push(event),
        }
    }

    /// Estimated server time to render remote players at.
    pub fn render_time(&self) -> Option<f64> {
        self.clock.render_time()
    }

    /// One pose per remote player for the current frame.
    pub fn remote_poses(&mut self) -> Vec<(PlayerId, Pose)> {
        let render_time = self.render_time();
        self.view.resolve(&self.table, self.player_id, render_time)
    }

    /// Remote poses at an explicit render time.
    pub fn remote_poses_at(&mut self, render_time: f64) -> Vec<(PlayerId, Pose)> {
        self.view
            .resolve(&self.table, self.player_id, Some(render_time))
    }

    pub fn evict_stale(&mut self, timeout: Duration) -> Vec<PlayerId> {
        self.table.evict_stale(timeout)
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn chat_log(&self) -> impl Iterator<Item = &ChatMessage> {
        self.chat_log.iter()
    }
}

/// Picks the first IPv4 address if there is one. The server binds
/// `0.0.0.0` by default and is unreachable over IPv6.
fn preferred_addr(candidates: &[SocketAddr]) -> Option<SocketAddr> {
    candidates
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
}
