use bitflags::bitflags;
use thiserror::Error;

use super::packer::{PackError, Packer, Unpacker};
use crate::bot::{BotInput, INPUT_WORDS};

pub const NET_VERSION: &str = "0.6 626fce9a778df4d4";
pub const SERVER_TICK_SPEED: i32 = 50;
pub const MAX_CLIENTS: usize = 16;
pub const MAX_SNAPSHOT_PACKSIZE: usize = 900;
pub const MAX_SNAPSHOT_PARTS: usize = 64;
pub const INPUT_SIZE_BYTES: i32 = 40;
pub const NUM_TUNING_PARAMS: usize = 33;

pub mod system {
    pub const INFO: i32 = 1;
    pub const MAP_CHANGE: i32 = 2;
    pub const MAP_DATA: i32 = 3;
    pub const CON_READY: i32 = 4;
    pub const SNAP: i32 = 5;
    pub const SNAP_EMPTY: i32 = 6;
    pub const SNAP_SINGLE: i32 = 7;
    pub const INPUT_TIMING: i32 = 9;
    pub const READY: i32 = 14;
    pub const ENTER_GAME: i32 = 15;
    pub const INPUT: i32 = 16;
    pub const REQUEST_MAP_DATA: i32 = 19;
    pub const PING: i32 = 22;
    pub const PING_REPLY: i32 = 23;
}

pub mod game {
    pub const SV_MOTD: i32 = 1;
    pub const SV_BROADCAST: i32 = 2;
    pub const SV_CHAT: i32 = 3;
    pub const SV_TUNE_PARAMS: i32 = 6;
    pub const SV_READY_TO_ENTER: i32 = 8;
    pub const CL_SAY: i32 = 17;
    pub const CL_SET_TEAM: i32 = 18;
    pub const CL_START_INFO: i32 = 20;
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ChunkFlags: u8 {
        const VITAL = 1 << 0;
        const FLUSH = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub flags: ChunkFlags,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn new(flags: ChunkFlags, data: Vec<u8>) -> Self {
        Self { flags, data }
    }

    pub fn is_vital(&self) -> bool {
        self.flags.contains(ChunkFlags::VITAL)
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] PackError),
    #[error("Message {id} requires the vital flag")]
    NotVital { id: i32 },
    #[error("Invalid snapshot part {part}/{num_parts}")]
    InvalidSnapPart { part: i32, num_parts: i32 },
    #[error("Snapshot delta offset {offset} out of range for tick {game_tick}")]
    InvalidDeltaTick { game_tick: i32, offset: i32 },
    #[error("Unknown client message {id} (system: {system})")]
    UnknownClientMessage { id: i32, system: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    Full,
    Single,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapPart {
    pub kind: SnapKind,
    pub game_tick: i32,
    pub delta_tick: i32,
    pub num_parts: usize,
    pub part: usize,
    pub crc: i32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    MapChange {
        name: String,
        crc: i32,
        size: i32,
    },
    MapData {
        last: bool,
        crc: i32,
        chunk: i32,
        data: Vec<u8>,
    },
    ConReady,
    Snap(SnapPart),
    InputTiming {
        input_pred_tick: i32,
        time_left: i32,
    },
    Ping,
    Motd {
        message: String,
    },
    Broadcast {
        message: String,
    },
    Chat {
        team: i32,
        client_id: i32,
        message: String,
    },
    TuneParams(Vec<i32>),
    ReadyToEnter,
    Unrecognized {
        id: i32,
        system: bool,
    },
}

impl ServerMessage {
    pub fn decode(chunk: &Chunk) -> Result<Self, ProtocolError> {
        let mut unpacker = Unpacker::new(&chunk.data);
        let header = unpacker.get_int()?;
        let id = header >> 1;
        let system = header & 1 != 0;

        if system {
            Self::decode_system(id, chunk.is_vital(), &mut unpacker)
        } else {
            if !chunk.is_vital() {
                return Err(ProtocolError::NotVital { id });
            }
            Self::decode_game(id, &mut unpacker)
        }
    }

    fn decode_system(id: i32, vital: bool, unpacker: &mut Unpacker) -> Result<Self, ProtocolError> {
        let message = match id {
            system::MAP_CHANGE => {
                if !vital {
                    return Err(ProtocolError::NotVital { id });
                }
                Self::MapChange {
                    name: unpacker.get_sanitized_string()?,
                    crc: unpacker.get_int()?,
                    size: unpacker.get_int()?,
                }
            }
            system::MAP_DATA => {
                let last = unpacker.get_bool()?;
                let crc = unpacker.get_int()?;
                let chunk = unpacker.get_int()?;
                let size = unpacker.get_int()?;
                let data = unpacker.get_raw(size)?.to_vec();
                Self::MapData {
                    last,
                    crc,
                    chunk,
                    data,
                }
            }
            system::CON_READY => {
                if !vital {
                    return Err(ProtocolError::NotVital { id });
                }
                Self::ConReady
            }
            system::SNAP | system::SNAP_SINGLE | system::SNAP_EMPTY => {
                Self::Snap(Self::decode_snap(id, unpacker)?)
            }
            system::INPUT_TIMING => Self::InputTiming {
                input_pred_tick: unpacker.get_int()?,
                time_left: unpacker.get_int()?,
            },
            system::PING => Self::Ping,
            _ => Self::Unrecognized { id, system: true },
        };
        Ok(message)
    }

    fn decode_snap(id: i32, unpacker: &mut Unpacker) -> Result<SnapPart, ProtocolError> {
        let game_tick = unpacker.get_int()?;
        let offset = unpacker.get_int()?;
        let delta_tick = game_tick
            .checked_sub(offset)
            .ok_or(ProtocolError::InvalidDeltaTick { game_tick, offset })?;

        let (num_parts, part) = if id == system::SNAP {
            (unpacker.get_int()?, unpacker.get_int()?)
        } else {
            (1, 0)
        };

        if num_parts < 1 || num_parts as usize > MAX_SNAPSHOT_PARTS || part < 0 || part >= num_parts
        {
            return Err(ProtocolError::InvalidSnapPart { part, num_parts });
        }

        let (kind, crc, data) = if id == system::SNAP_EMPTY {
            (SnapKind::Empty, 0, Vec::new())
        } else {
            let crc = unpacker.get_int()?;
            let size = unpacker.get_int()?;
            if size as usize > MAX_SNAPSHOT_PACKSIZE {
                return Err(ProtocolError::InvalidSnapPart { part, num_parts });
            }
            let data = unpacker.get_raw(size)?.to_vec();
            let kind = if id == system::SNAP {
                SnapKind::Full
            } else {
                SnapKind::Single
            };
            (kind, crc, data)
        };

        Ok(SnapPart {
            kind,
            game_tick,
            delta_tick,
            num_parts: num_parts as usize,
            part: part as usize,
            crc,
            data,
        })
    }

    fn decode_game(id: i32, unpacker: &mut Unpacker) -> Result<Self, ProtocolError> {
        let message = match id {
            game::SV_MOTD => Self::Motd {
                message: unpacker.get_string()?,
            },
            game::SV_BROADCAST => Self::Broadcast {
                message: unpacker.get_string()?,
            },
            game::SV_CHAT => Self::Chat {
                team: unpacker.get_int()?,
                client_id: unpacker.get_int()?,
                message: unpacker.get_sanitized_string()?,
            },
            game::SV_TUNE_PARAMS => {
                let mut values = Vec::with_capacity(NUM_TUNING_PARAMS);
                for _ in 0..NUM_TUNING_PARAMS {
                    values.push(unpacker.get_int()?);
                }
                Self::TuneParams(values)
            }
            game::SV_READY_TO_ENTER => Self::ReadyToEnter,
            _ => Self::Unrecognized { id, system: false },
        };
        Ok(message)
    }

    pub fn is_system(&self) -> bool {
        match self {
            Self::Motd { .. }
            | Self::Broadcast { .. }
            | Self::Chat { .. }
            | Self::TuneParams(_)
            | Self::ReadyToEnter => false,
            Self::Unrecognized { system, .. } => *system,
            _ => true,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Self::MapChange { .. } => system::MAP_CHANGE,
            Self::MapData { .. } => system::MAP_DATA,
            Self::ConReady => system::CON_READY,
            Self::Snap(part) => match part.kind {
                SnapKind::Full => system::SNAP,
                SnapKind::Single => system::SNAP_SINGLE,
                SnapKind::Empty => system::SNAP_EMPTY,
            },
            Self::InputTiming { .. } => system::INPUT_TIMING,
            Self::Ping => system::PING,
            Self::Motd { .. } => game::SV_MOTD,
            Self::Broadcast { .. } => game::SV_BROADCAST,
            Self::Chat { .. } => game::SV_CHAT,
            Self::TuneParams(_) => game::SV_TUNE_PARAMS,
            Self::ReadyToEnter => game::SV_READY_TO_ENTER,
            Self::Unrecognized { id, .. } => *id,
        }
    }

    /// Server side of the wire format, used by in-process servers.
    pub fn encode(&self) -> Vec<u8> {
        let mut packer = Packer::new();
        packer.add_int(self.id() << 1 | self.is_system() as i32);

        match self {
            Self::MapChange { name, crc, size } => {
                packer.add_string(name).add_int(*crc).add_int(*size);
            }
            Self::MapData {
                last,
                crc,
                chunk,
                data,
            } => {
                packer
                    .add_bool(*last)
                    .add_int(*crc)
                    .add_int(*chunk)
                    .add_int(data.len() as i32)
                    .add_raw(data);
            }
            Self::Snap(part) => {
                packer
                    .add_int(part.game_tick)
                    .add_int(part.game_tick.wrapping_sub(part.delta_tick));
                if part.kind == SnapKind::Full {
                    packer.add_int(part.num_parts as i32).add_int(part.part as i32);
                }
                if part.kind != SnapKind::Empty {
                    packer
                        .add_int(part.crc)
                        .add_int(part.data.len() as i32)
                        .add_raw(&part.data);
                }
            }
            Self::InputTiming {
                input_pred_tick,
                time_left,
            } => {
                packer.add_int(*input_pred_tick).add_int(*time_left);
            }
            Self::Motd { message } | Self::Broadcast { message } => {
                packer.add_string(message);
            }
            Self::Chat {
                team,
                client_id,
                message,
            } => {
                packer.add_int(*team).add_int(*client_id).add_string(message);
            }
            Self::TuneParams(values) => {
                for value in values {
                    packer.add_int(*value);
                }
            }
            Self::ConReady | Self::Ping | Self::ReadyToEnter | Self::Unrecognized { .. } => {}
        }

        packer.finish()
    }

    pub fn to_chunk(&self) -> Chunk {
        let flags = match self {
            Self::Snap(_) | Self::InputTiming { .. } | Self::Ping => ChunkFlags::FLUSH,
            _ => ChunkFlags::VITAL | ChunkFlags::FLUSH,
        };
        Chunk::new(flags, self.encode())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartInfo {
    pub name: String,
    pub clan: String,
    pub country: i32,
    pub skin: String,
    pub use_custom_color: bool,
    pub color_body: i32,
    pub color_feet: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Info {
        version: String,
        password: String,
    },
    Ready,
    EnterGame,
    RequestMapData {
        chunk: i32,
    },
    Input {
        ack_tick: i32,
        pred_tick: i32,
        input: BotInput,
    },
    PingReply,
    StartInfo(StartInfo),
    Say {
        team: bool,
        message: String,
    },
    SetTeam {
        team: i32,
    },
}

impl ClientMessage {
    pub fn id(&self) -> i32 {
        match self {
            Self::Info { .. } => system::INFO,
            Self::Ready => system::READY,
            Self::EnterGame => system::ENTER_GAME,
            Self::RequestMapData { .. } => system::REQUEST_MAP_DATA,
            Self::Input { .. } => system::INPUT,
            Self::PingReply => system::PING_REPLY,
            Self::StartInfo(_) => game::CL_START_INFO,
            Self::Say { .. } => game::CL_SAY,
            Self::SetTeam { .. } => game::CL_SET_TEAM,
        }
    }

    pub fn is_system(&self) -> bool {
        !matches!(
            self,
            Self::StartInfo(_) | Self::Say { .. } | Self::SetTeam { .. }
        )
    }

    pub fn flags(&self) -> ChunkFlags {
        match self {
            Self::Input { .. } | Self::PingReply => ChunkFlags::FLUSH,
            _ => ChunkFlags::VITAL | ChunkFlags::FLUSH,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut packer = Packer::new();
        packer.add_int(self.id() << 1 | self.is_system() as i32);

        match self {
            Self::Info { version, password } => {
                packer.add_string(version).add_string(password);
            }
            Self::RequestMapData { chunk } => {
                packer.add_int(*chunk);
            }
            Self::Input {
                ack_tick,
                pred_tick,
                input,
            } => {
                packer
                    .add_int(*ack_tick)
                    .add_int(*pred_tick)
                    .add_int(INPUT_SIZE_BYTES);
                for value in input.to_ints() {
                    packer.add_int(value);
                }
            }
            Self::StartInfo(info) => {
                packer
                    .add_string(&info.name)
                    .add_string(&info.clan)
                    .add_int(info.country)
                    .add_string(&info.skin)
                    .add_bool(info.use_custom_color)
                    .add_int(info.color_body)
                    .add_int(info.color_feet);
            }
            Self::Say { team, message } => {
                packer.add_bool(*team).add_string(message);
            }
            Self::SetTeam { team } => {
                packer.add_int(*team);
            }
            Self::Ready | Self::EnterGame | Self::PingReply => {}
        }

        packer.finish()
    }

    pub fn to_chunk(&self) -> Chunk {
        Chunk::new(self.flags(), self.encode())
    }

    /// Inverse of `encode`, for servers reading client traffic.
    pub fn decode(chunk: &Chunk) -> Result<Self, ProtocolError> {
        let mut unpacker = Unpacker::new(&chunk.data);
        let header = unpacker.get_int()?;
        let id = header >> 1;
        let system = header & 1 != 0;

        let message = match (system, id) {
            (true, system::INFO) => Self::Info {
                version: unpacker.get_string()?,
                password: unpacker.get_string()?,
            },
            (true, system::READY) => Self::Ready,
            (true, system::ENTER_GAME) => Self::EnterGame,
            (true, system::REQUEST_MAP_DATA) => Self::RequestMapData {
                chunk: unpacker.get_int()?,
            },
            (true, system::INPUT) => {
                let ack_tick = unpacker.get_int()?;
                let pred_tick = unpacker.get_int()?;
                let _size = unpacker.get_int()?;
                let mut words = [0; INPUT_WORDS];
                for word in &mut words {
                    *word = unpacker.get_int()?;
                }
                Self::Input {
                    ack_tick,
                    pred_tick,
                    input: BotInput::from_ints(&words).unwrap_or_default(),
                }
            }
            (true, system::PING_REPLY) => Self::PingReply,
            (false, game::CL_START_INFO) => Self::StartInfo(StartInfo {
                name: unpacker.get_string()?,
                clan: unpacker.get_string()?,
                country: unpacker.get_int()?,
                skin: unpacker.get_string()?,
                use_custom_color: unpacker.get_bool()?,
                color_body: unpacker.get_int()?,
                color_feet: unpacker.get_int()?,
            }),
            (false, game::CL_SAY) => Self::Say {
                team: unpacker.get_bool()?,
                message: unpacker.get_string()?,
            },
            (false, game::CL_SET_TEAM) => Self::SetTeam {
                team: unpacker.get_int()?,
            },
            _ => return Err(ProtocolError::UnknownClientMessage { id, system }),
        };
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_chunk(id: i32, system: bool, vital: bool, body: impl FnOnce(&mut Packer)) -> Chunk {
        let mut packer = Packer::new();
        packer.add_int(id << 1 | system as i32);
        body(&mut packer);
        let flags = if vital {
            ChunkFlags::VITAL
        } else {
            ChunkFlags::empty()
        };
        Chunk::new(flags, packer.finish())
    }

    #[test]
    fn test_decode_map_change() {
        let chunk = server_chunk(system::MAP_CHANGE, true, true, |p| {
            p.add_string("dm1").add_int(0x1234).add_int(5000);
        });
        assert_eq!(
            ServerMessage::decode(&chunk).unwrap(),
            ServerMessage::MapChange {
                name: "dm1".into(),
                crc: 0x1234,
                size: 5000
            }
        );
    }

    #[test]
    fn test_map_change_requires_vital() {
        let chunk = server_chunk(system::MAP_CHANGE, true, false, |p| {
            p.add_string("dm1").add_int(1).add_int(1);
        });
        assert!(matches!(
            ServerMessage::decode(&chunk),
            Err(ProtocolError::NotVital { .. })
        ));
    }

    #[test]
    fn test_decode_snap_variants() {
        let chunk = server_chunk(system::SNAP, true, false, |p| {
            p.add_int(100).add_int(5).add_int(2).add_int(1);
            p.add_int(77).add_int(3).add_raw(&[1, 2, 3]);
        });
        let ServerMessage::Snap(part) = ServerMessage::decode(&chunk).unwrap() else {
            panic!("expected snap");
        };
        assert_eq!(part.kind, SnapKind::Full);
        assert_eq!(part.delta_tick, 95);
        assert_eq!((part.num_parts, part.part), (2, 1));
        assert_eq!(part.crc, 77);
        assert_eq!(part.data, vec![1, 2, 3]);

        let chunk = server_chunk(system::SNAP_EMPTY, true, false, |p| {
            p.add_int(100).add_int(-1);
        });
        let ServerMessage::Snap(part) = ServerMessage::decode(&chunk).unwrap() else {
            panic!("expected snap");
        };
        assert_eq!(part.kind, SnapKind::Empty);
        assert_eq!(part.delta_tick, 101);
        assert!(part.data.is_empty());
    }

    #[test]
    fn test_invalid_snap_part() {
        let chunk = server_chunk(system::SNAP, true, false, |p| {
            p.add_int(100).add_int(5).add_int(2).add_int(2);
        });
        assert!(ServerMessage::decode(&chunk).is_err());
    }

    #[test]
    fn test_overflowing_delta_offset_is_error() {
        let chunk = server_chunk(system::SNAP_SINGLE, true, false, |p| {
            p.add_int(i32::MIN).add_int(1).add_int(0).add_int(0);
        });
        assert!(matches!(
            ServerMessage::decode(&chunk),
            Err(ProtocolError::InvalidDeltaTick {
                game_tick: i32::MIN,
                offset: 1
            })
        ));

        let chunk = server_chunk(system::SNAP_EMPTY, true, false, |p| {
            p.add_int(i32::MAX).add_int(-1);
        });
        assert!(ServerMessage::decode(&chunk).is_err());
    }

    #[test]
    fn test_truncated_message_is_error() {
        let chunk = server_chunk(system::INPUT_TIMING, true, false, |p| {
            p.add_int(10);
        });
        assert!(matches!(
            ServerMessage::decode(&chunk),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_ids_fall_back() {
        let chunk = server_chunk(200, true, true, |_| {});
        assert_eq!(
            ServerMessage::decode(&chunk).unwrap(),
            ServerMessage::Unrecognized {
                id: 200,
                system: true
            }
        );
    }

    #[test]
    fn test_game_messages_must_be_vital() {
        let chunk = server_chunk(game::SV_READY_TO_ENTER, false, false, |_| {});
        assert!(ServerMessage::decode(&chunk).is_err());

        let chunk = server_chunk(game::SV_CHAT, false, true, |p| {
            p.add_int(0).add_int(3).add_string("bot: hi");
        });
        assert_eq!(
            ServerMessage::decode(&chunk).unwrap(),
            ServerMessage::Chat {
                team: 0,
                client_id: 3,
                message: "bot: hi".into()
            }
        );
    }

    #[test]
    fn test_encode_input_is_not_vital() {
        let message = ClientMessage::Input {
            ack_tick: 10,
            pred_tick: 12,
            input: BotInput::default(),
        };
        let chunk = message.to_chunk();
        assert!(!chunk.is_vital());

        let mut unpacker = Unpacker::new(&chunk.data);
        assert_eq!(unpacker.get_int().unwrap(), system::INPUT << 1 | 1);
        assert_eq!(unpacker.get_int().unwrap(), 10);
        assert_eq!(unpacker.get_int().unwrap(), 12);
        assert_eq!(unpacker.get_int().unwrap(), INPUT_SIZE_BYTES);
        for _ in 0..10 {
            unpacker.get_int().unwrap();
        }
        assert_eq!(unpacker.remaining(), 0);
    }

    #[test]
    fn test_encode_game_message_header() {
        let chunk = ClientMessage::SetTeam { team: -1 }.to_chunk();
        assert!(chunk.is_vital());
        let mut unpacker = Unpacker::new(&chunk.data);
        assert_eq!(unpacker.get_int().unwrap(), game::CL_SET_TEAM << 1);
        assert_eq!(unpacker.get_int().unwrap(), -1);
    }

    #[test]
    fn test_server_snap_encoding_matches_decoder() {
        let part = SnapPart {
            kind: SnapKind::Full,
            game_tick: 500,
            delta_tick: 495,
            num_parts: 2,
            part: 1,
            crc: -77,
            data: vec![1, 2, 3],
        };
        let chunk = ServerMessage::Snap(part.clone()).to_chunk();
        assert!(!chunk.is_vital());
        assert_eq!(ServerMessage::decode(&chunk).unwrap(), ServerMessage::Snap(part));

        let empty = SnapPart {
            kind: SnapKind::Empty,
            game_tick: 501,
            delta_tick: -1,
            num_parts: 1,
            part: 0,
            crc: 0,
            data: Vec::new(),
        };
        let chunk = ServerMessage::Snap(empty.clone()).to_chunk();
        assert_eq!(ServerMessage::decode(&chunk).unwrap(), ServerMessage::Snap(empty));
    }

    #[test]
    fn test_client_decode() {
        let info = ClientMessage::Info {
            version: NET_VERSION.into(),
            password: String::new(),
        };
        assert_eq!(ClientMessage::decode(&info.to_chunk()).unwrap(), info);

        let say = ClientMessage::Say {
            team: false,
            message: "/alwaysrandom 1".into(),
        };
        assert_eq!(ClientMessage::decode(&say.to_chunk()).unwrap(), say);

        let chunk = server_chunk(99, true, true, |_| {});
        assert!(matches!(
            ClientMessage::decode(&chunk),
            Err(ProtocolError::UnknownClientMessage { id: 99, system: true })
        ));
    }
}
