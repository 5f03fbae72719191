use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected {
        addr: SocketAddr,
    },
    MapLoaded {
        name: String,
        crc: i32,
        downloaded: bool,
    },
    Online {
        game_tick: i32,
    },
    Disconnected {
        reason: DisconnectReason,
    },
    Chat {
        client_id: i32,
        message: String,
    },
    Broadcast {
        message: String,
    },
    Motd {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    Transport(String),
    Rejected(String),
    MapFailed(String),
}

impl DisconnectReason {
    pub fn as_str(&self) -> &str {
        match self {
            DisconnectReason::Requested => "disconnected",
            DisconnectReason::Transport(reason)
            | DisconnectReason::Rejected(reason)
            | DisconnectReason::MapFailed(reason) => reason,
        }
    }
}
