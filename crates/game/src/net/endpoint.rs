use std::collections::VecDeque;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use super::protocol::{Chunk, ChunkFlags};
use super::stats::NetworkStats;
use super::transport::{Transport, TransportError, TransportState};

pub const MAX_DATAGRAM_SIZE: usize = 1400;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const CONNECT_RESEND_MS: u64 = 500;
const KEEPALIVE_MS: u64 = 1000;

pub const KIND_CONNECT: u8 = 1;
pub const KIND_ACCEPT: u8 = 2;
pub const KIND_CLOSE: u8 = 3;
pub const KIND_KEEPALIVE: u8 = 4;
pub const KIND_CHUNK: u8 = 5;

/// One chunk per datagram: `[kind][flags][payload]`. Meant for a session
/// relay that terminates the server's reliable layer.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
    state: TransportState,
    stats: NetworkStats,
    recv_buffer: [u8; MAX_DATAGRAM_SIZE],
    incoming: VecDeque<Chunk>,
    timeout: Duration,
    last_receive_time: Instant,
    last_send_time: Instant,
    error: Option<String>,
}

impl UdpTransport {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        Ok(Self {
            socket,
            local_addr,
            remote_addr: None,
            state: TransportState::Offline,
            stats: NetworkStats::default(),
            recv_buffer: [0u8; MAX_DATAGRAM_SIZE],
            incoming: VecDeque::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            last_receive_time: Instant::now(),
            last_send_time: Instant::now(),
            error: None,
        })
    }

    pub fn resolve(host: &str) -> Result<SocketAddr, TransportError> {
        host.to_socket_addrs()
            .map_err(|_| TransportError::AddressResolution(host.to_string()))?
            .next()
            .ok_or_else(|| TransportError::AddressResolution(host.to_string()))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    fn send_datagram(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let addr = self.remote_addr.ok_or(TransportError::NotConnected)?;
        if data.len() > MAX_DATAGRAM_SIZE {
            return Err(TransportError::ChunkTooLarge(data.len()));
        }

        let bytes = self.socket.send_to(data, addr)?;
        self.stats.record_sent(bytes);
        self.last_send_time = Instant::now();
        Ok(())
    }

    fn go_offline(&mut self, reason: &str) {
        log::info!("Transport offline: {}", reason);
        self.state = TransportState::Offline;
        self.error = Some(reason.to_string());
    }

    fn receive(&mut self) -> Result<(), TransportError> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => {
                    if Some(addr) != self.remote_addr || size == 0 {
                        self.stats.datagrams_dropped += 1;
                        continue;
                    }

                    self.stats.record_received(size);
                    self.last_receive_time = Instant::now();

                    let kind = self.recv_buffer[0];
                    match kind {
                        KIND_ACCEPT if self.state == TransportState::Connecting => {
                            log::debug!("Relay accepted connection");
                            self.state = TransportState::Online;
                        }
                        KIND_CLOSE => {
                            let reason = String::from_utf8_lossy(&self.recv_buffer[1..size])
                                .into_owned();
                            self.go_offline(&reason);
                        }
                        KIND_CHUNK if self.state == TransportState::Online && size >= 2 => {
                            let flags = ChunkFlags::from_bits_truncate(self.recv_buffer[1]);
                            let data = self.recv_buffer[2..size].to_vec();
                            self.incoming.push_back(Chunk::new(flags, data));
                        }
                        KIND_KEEPALIVE => {}
                        _ => self.stats.datagrams_dropped += 1,
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }
}

impl Transport for UdpTransport {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        self.remote_addr = Some(addr);
        self.state = TransportState::Connecting;
        self.error = None;
        self.incoming.clear();
        self.last_receive_time = Instant::now();
        self.send_datagram(&[KIND_CONNECT])
    }

    fn disconnect(&mut self, reason: &str) {
        if self.state != TransportState::Offline {
            let mut data = vec![KIND_CLOSE];
            data.extend_from_slice(reason.as_bytes());
            data.truncate(MAX_DATAGRAM_SIZE);
            let _ = self.send_datagram(&data);
        }
        self.go_offline(reason);
        self.incoming.clear();
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn error_reason(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn update(&mut self) -> Result<(), TransportError> {
        if self.state == TransportState::Offline {
            return Ok(());
        }

        self.receive()?;

        if self.state == TransportState::Offline {
            return Ok(());
        }

        if self.last_receive_time.elapsed() > self.timeout {
            self.go_offline("Timeout");
            return Ok(());
        }

        let since_send = self.last_send_time.elapsed();
        match self.state {
            TransportState::Connecting if since_send >= Duration::from_millis(CONNECT_RESEND_MS) => {
                self.send_datagram(&[KIND_CONNECT])?;
            }
            TransportState::Online if since_send >= Duration::from_millis(KEEPALIVE_MS) => {
                self.send_datagram(&[KIND_KEEPALIVE])?;
            }
            _ => {}
        }

        Ok(())
    }

    fn recv(&mut self) -> Option<Chunk> {
        self.incoming.pop_front()
    }

    fn send(&mut self, chunk: Chunk) -> Result<(), TransportError> {
        if self.state != TransportState::Online {
            return Err(TransportError::NotConnected);
        }
        let mut data = Vec::with_capacity(chunk.data.len() + 2);
        data.push(KIND_CHUNK);
        data.push(chunk.flags.bits());
        data.extend_from_slice(&chunk.data);
        self.send_datagram(&data)
    }
}
