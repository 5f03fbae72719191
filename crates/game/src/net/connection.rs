use std::net::SocketAddr;

pub const MAX_CRC_ERRORS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ClientState {
    Offline,
    Connecting,
    Loading,
    Online,
    Quitting,
}

impl ClientState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Connecting => "connecting",
            Self::Loading => "loading",
            Self::Online => "online",
            Self::Quitting => "quitting",
        }
    }

    pub fn accepts_snapshots(&self) -> bool {
        matches!(self, Self::Loading | Self::Online)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    state: ClientState,
    pub local_addr: Option<SocketAddr>,
    pub remote_addr: Option<SocketAddr>,
    pub ack_tick: i32,
    crc_errors: u32,
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            state: ClientState::Offline,
            local_addr: None,
            remote_addr: None,
            ack_tick: -1,
            crc_errors: 0,
        }
    }
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Returns false when the transition was refused.
    pub fn set_state(&mut self, state: ClientState) -> bool {
        if self.state == ClientState::Quitting {
            return false;
        }
        if self.state != state {
            log::info!("State {} -> {}", self.state.as_str(), state.as_str());
        }
        self.state = state;
        true
    }

    pub fn crc_errors(&self) -> u32 {
        self.crc_errors
    }

    /// Returns true when the error budget ran out and a full resend was
    /// requested.
    pub fn record_crc_error(&mut self) -> bool {
        self.crc_errors += 1;
        if self.crc_errors > MAX_CRC_ERRORS {
            self.ack_tick = -1;
            self.crc_errors = 0;
            return true;
        }
        false
    }

    pub fn record_crc_ok(&mut self) {
        self.crc_errors = 0;
    }

    pub fn request_resync(&mut self) {
        self.ack_tick = -1;
    }

    pub fn reset(&mut self) {
        let state = self.state;
        *self = Self::default();
        if state == ClientState::Quitting {
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quitting_is_terminal() {
        let mut connection = Connection::new();
        assert!(connection.set_state(ClientState::Connecting));
        assert!(connection.set_state(ClientState::Quitting));
        assert!(!connection.set_state(ClientState::Offline));
        connection.reset();
        assert_eq!(connection.state(), ClientState::Quitting);
    }

    #[test]
    fn test_eleven_crc_errors_force_one_resync() {
        let mut connection = Connection::new();
        connection.ack_tick = 500;

        let resyncs = (0..11).filter(|_| connection.record_crc_error()).count();
        assert_eq!(resyncs, 1);
        assert_eq!(connection.crc_errors(), 0);
        assert_eq!(connection.ack_tick, -1);
    }

    #[test]
    fn test_ten_crc_errors_are_tolerated() {
        let mut connection = Connection::new();
        connection.ack_tick = 500;
        for _ in 0..10 {
            assert!(!connection.record_crc_error());
        }
        connection.record_crc_ok();
        assert!(!connection.record_crc_error());
        assert_eq!(connection.ack_tick, 500);
    }
}
