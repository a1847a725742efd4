//! Datagram transports used by the server and client loops.
//!
//! Both operations are non-blocking: `send_to` reports short writes and
//! errors without retrying, and `try_recv_from` returns `Ok(None)` when no
//! datagram is queued. Platform differences (BSD sockets vs. Winsock) are
//! resolved at build time by tokio, so callers only ever see this trait.

use log::debug;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::{ToSocketAddrs, UdpSocket};

pub trait Transport {
    /// Sends one datagram. Best effort; never retried.
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize>;

    /// Receives one datagram if any is queued.
    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// UDP transport backed by a non-blocking tokio socket.
///
/// Sends go through a non-blocking std handle to the same socket. tokio's
/// `try_send_to` reports `WouldBlock` until the reactor has seen the socket
/// become writable, which drops the first datagrams after `bind`.
pub struct UdpTransport {
    socket: UdpSocket,
    sender: std::net::UdpSocket,
}

impl UdpTransport {
    /// Binds the socket. Failure is returned as-is; callers treat it as fatal.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?.into_std()?;
        let sender = socket.try_clone()?;
        sender.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket)?;
        debug!("UDP transport bound to {}", socket.local_addr()?);
        Ok(Self { socket, sender })
    }

    /// Waits until the socket may have a datagram queued. Wakeups can be
    /// spurious, so follow with `try_recv_from`.
    pub async fn readable(&self) -> io::Result<()> {
        self.socket.readable().await
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        let sent = self.sender.send_to(bytes, addr)?;
        if sent < bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write to {}: {} of {} bytes", addr, sent, bytes.len()),
            ));
        }
        Ok(sent)
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        match self.socket.try_recv_from(buf) {
            Ok((len, addr)) => Ok(Some((len, addr))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// In-process transport: datagrams are injected by hand and every send is
/// recorded. Sends to addresses marked with [`MemoryTransport::fail_sends_to`]
/// return an error instead.
pub struct MemoryTransport {
    local: SocketAddr,
    inbox: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    failing: Mutex<HashSet<SocketAddr>>,
}

impl MemoryTransport {
    pub fn new(local: SocketAddr) -> Self {
        Self {
            local,
            inbox: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Queues a datagram as if it had arrived from `from`.
    pub fn inject(&self, bytes: Vec<u8>, from: SocketAddr) {
        lock(&self.inbox).push_back((bytes, from));
    }

    pub fn fail_sends_to(&self, addr: SocketAddr) {
        lock(&self.failing).insert(addr);
    }

    /// Drains the log of successfully sent datagrams.
    pub fn take_sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        std::mem::take(&mut *lock(&self.sent))
    }

    pub fn pending(&self) -> usize {
        lock(&self.inbox).len()
    }
}

impl Transport for MemoryTransport {
    fn send_to(&self, bytes: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if lock(&self.failing).contains(&addr) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("send to {} refused", addr),
            ));
        }
        lock(&self.sent).push((addr, bytes.to_vec()));
        Ok(bytes.len())
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> io::Result<Option<(usize, SocketAddr)>> {
        let Some((bytes, from)) = lock(&self.inbox).pop_front() else {
            return Ok(None);
        };
        // Like a real datagram socket, excess bytes are cut off.
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        Ok(Some((len, from)))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }
}

// A poisoned lock only means a test thread panicked mid-push; the data is still usable.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
