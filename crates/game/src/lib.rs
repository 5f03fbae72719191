pub mod bot;
pub mod chat;
pub mod client;
pub mod config;
pub mod events;
pub mod map;
pub mod nav;
pub mod net;
pub mod physics;
pub mod snapshot;
pub mod timing;
pub mod world;

pub use bot::{BotConfig, BotDecisionEngine, BotInput, Class, Classifier, PlayerFlags};
pub use chat::{ChatBackend, ChatError, ChatPolicy, ChatQueue, ReplyCallback};
pub use client::GameClient;
pub use config::{ClientConfig, Identity};
pub use events::{ClientEvent, DisconnectReason};
pub use map::{
    DirStore, MapCache, MapDecoder, MapError, MemoryStore, PersistentStore, RawGridDecoder,
    TileGridProvider,
};
pub use nav::{HazardOverlay, OccupancyGrid, Pathfinder};
pub use net::{
    ClientMessage, ClientState, Connection, InputDispatcher, MemoryTransport, NET_VERSION,
    ServerMessage, Transport, TransportError, TransportState, UdpTransport,
};
pub use physics::{CharacterCore, HookState, MapGrid, PhysicsPredictor, TileFlags, TuningParams};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotCodec, SnapshotRing};
pub use timing::{SmoothTimeConfig, TickClock};
pub use world::{ClientEntry, LaserSegment, WorldModel};
