use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use super::protocol::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Offline,
    Connecting,
    Online,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Socket error: {0}")]
    Io(#[from] io::Error),
    #[error("Could not resolve address {0}")]
    AddressResolution(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Chunk of {0} bytes exceeds the datagram size")]
    ChunkTooLarge(usize),
}

/// Carries message chunks to and from the game server. Reliability and
/// session management are the implementation's concern.
pub trait Transport {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError>;
    fn disconnect(&mut self, reason: &str);
    fn state(&self) -> TransportState;
    fn error_reason(&self) -> Option<&str>;
    fn update(&mut self) -> Result<(), TransportError>;
    fn recv(&mut self) -> Option<Chunk>;
    fn send(&mut self, chunk: Chunk) -> Result<(), TransportError>;
}

/// In-process transport. Incoming chunks are queued by the owner and sent
/// chunks are collected for inspection.
#[derive(Debug)]
pub struct MemoryTransport {
    state: TransportState,
    remote: Option<SocketAddr>,
    incoming: VecDeque<Chunk>,
    sent: Vec<Chunk>,
    error: Option<String>,
    auto_accept: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self {
            state: TransportState::Offline,
            remote: None,
            incoming: VecDeque::new(),
            sent: Vec::new(),
            error: None,
            auto_accept: true,
        }
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stays in `Connecting` until `accept` is called.
    pub fn manual_accept() -> Self {
        Self {
            auto_accept: false,
            ..Self::default()
        }
    }

    pub fn accept(&mut self) {
        if self.state == TransportState::Connecting {
            self.state = TransportState::Online;
        }
    }

    pub fn push_incoming(&mut self, chunk: Chunk) {
        self.incoming.push_back(chunk);
    }

    pub fn take_sent(&mut self) -> Vec<Chunk> {
        std::mem::take(&mut self.sent)
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    pub fn fail(&mut self, reason: &str) {
        self.state = TransportState::Offline;
        self.error = Some(reason.to_string());
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        self.remote = Some(addr);
        self.error = None;
        self.state = TransportState::Connecting;
        Ok(())
    }

    fn disconnect(&mut self, reason: &str) {
        self.state = TransportState::Offline;
        self.error = Some(reason.to_string());
        self.incoming.clear();
    }

    fn state(&self) -> TransportState {
        self.state
    }

    fn error_reason(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn update(&mut self) -> Result<(), TransportError> {
        if self.auto_accept && self.state == TransportState::Connecting {
            self.state = TransportState::Online;
        }
        Ok(())
    }

    fn recv(&mut self) -> Option<Chunk> {
        if self.state != TransportState::Online {
            return None;
        }
        self.incoming.pop_front()
    }

    fn send(&mut self, chunk: Chunk) -> Result<(), TransportError> {
        if self.state == TransportState::Offline {
            return Err(TransportError::NotConnected);
        }
        self.sent.push(chunk);
        Ok(())
    }
}
