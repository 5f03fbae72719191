pub mod connection;
mod download;
mod endpoint;
mod input;
pub mod packer;
pub mod protocol;
mod stats;
mod transport;

pub use connection::{ClientState, Connection, MAX_CRC_ERRORS};
pub use download::{DownloadStep, MapDownload};
pub use endpoint::{
    KIND_ACCEPT, KIND_CHUNK, KIND_CLOSE, KIND_CONNECT, KIND_KEEPALIVE, MAX_DATAGRAM_SIZE,
    UdpTransport,
};
pub use input::{INPUT_RING_SIZE, InputDispatcher};
pub use packer::{PackError, Packer, Unpacker};
pub use protocol::{
    Chunk, ChunkFlags, ClientMessage, MAX_CLIENTS, NET_VERSION, ProtocolError,
    SERVER_TICK_SPEED, ServerMessage, SnapKind, SnapPart, StartInfo,
};
pub use stats::NetworkStats;
pub use transport::{MemoryTransport, Transport, TransportError, TransportState};
