use super::item::SnapItem;

pub mod obj {
    pub const PLAYER_INPUT: i32 = 1;
    pub const PROJECTILE: i32 = 2;
    pub const LASER: i32 = 3;
    pub const PICKUP: i32 = 4;
    pub const FLAG: i32 = 5;
    pub const GAME_INFO: i32 = 6;
    pub const GAME_DATA: i32 = 7;
    pub const CHARACTER_CORE: i32 = 8;
    pub const CHARACTER: i32 = 9;
    pub const PLAYER_INFO: i32 = 10;
    pub const CLIENT_INFO: i32 = 11;
    pub const SPECTATOR_INFO: i32 = 12;
}

// Word counts for the types the server never sends a size for.
const STATIC_SIZES: [usize; 21] = [
    0, 10, 6, 5, 4, 3, 8, 4, 15, 22, 5, 17, 3, 2, 2, 2, 2, 3, 3, 3, 3,
];

pub fn static_item_size(type_id: i32) -> Option<usize> {
    let size = *STATIC_SIZES.get(usize::try_from(type_id).ok()?)?;
    (size > 0).then_some(size)
}

pub const EMOTE_PAIN: i32 = 1;

pub mod weapon {
    pub const HAMMER: i32 = 0;
    pub const GUN: i32 = 1;
    pub const SHOTGUN: i32 = 2;
    pub const GRENADE: i32 = 3;
    pub const RIFLE: i32 = 4;
    pub const NINJA: i32 = 5;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharacterObj {
    pub tick: i32,
    pub x: i32,
    pub y: i32,
    pub vel_x: i32,
    pub vel_y: i32,
    pub angle: i32,
    pub direction: i32,
    pub jumped: i32,
    pub hooked_player: i32,
    pub hook_state: i32,
    pub hook_tick: i32,
    pub hook_x: i32,
    pub hook_y: i32,
    pub hook_dx: i32,
    pub hook_dy: i32,
    pub player_flags: i32,
    pub health: i32,
    pub armor: i32,
    pub ammo_count: i32,
    pub weapon: i32,
    pub emote: i32,
    pub attack_tick: i32,
}

impl CharacterObj {
    pub fn from_ints(d: &[i32]) -> Option<Self> {
        if d.len() < 22 {
            return None;
        }
        Some(Self {
            tick: d[0],
            x: d[1],
            y: d[2],
            vel_x: d[3],
            vel_y: d[4],
            angle: d[5],
            direction: d[6],
            jumped: d[7],
            hooked_player: d[8],
            hook_state: d[9],
            hook_tick: d[10],
            hook_x: d[11],
            hook_y: d[12],
            hook_dx: d[13],
            hook_dy: d[14],
            player_flags: d[15],
            health: d[16],
            armor: d[17],
            ammo_count: d[18],
            weapon: d[19],
            emote: d[20],
            attack_tick: d[21],
        })
    }

    pub fn to_ints(&self) -> [i32; 22] {
        [
            self.tick,
            self.x,
            self.y,
            self.vel_x,
            self.vel_y,
            self.angle,
            self.direction,
            self.jumped,
            self.hooked_player,
            self.hook_state,
            self.hook_tick,
            self.hook_x,
            self.hook_y,
            self.hook_dx,
            self.hook_dy,
            self.player_flags,
            self.health,
            self.armor,
            self.ammo_count,
            self.weapon,
            self.emote,
            self.attack_tick,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerInfoObj {
    pub local: bool,
    pub client_id: i32,
    pub team: i32,
    pub score: i32,
    pub latency: i32,
}

impl PlayerInfoObj {
    pub fn from_ints(d: &[i32]) -> Option<Self> {
        if d.len() < 5 {
            return None;
        }
        Some(Self {
            local: d[0] != 0,
            client_id: d[1],
            team: d[2],
            score: d[3],
            latency: d[4],
        })
    }

    pub fn to_ints(&self) -> [i32; 5] {
        [
            self.local as i32,
            self.client_id,
            self.team,
            self.score,
            self.latency,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientInfoObj {
    pub name: String,
    pub clan: String,
    pub country: i32,
    pub skin: String,
}

impl ClientInfoObj {
    pub fn from_ints(d: &[i32]) -> Option<Self> {
        if d.len() < 17 {
            return None;
        }
        Some(Self {
            name: ints_to_str(&d[0..4]),
            clan: ints_to_str(&d[4..7]),
            country: d[7],
            skin: ints_to_str(&d[8..14]),
        })
    }

    pub fn to_ints(&self) -> [i32; 17] {
        let mut words = [0; 17];
        str_to_ints(&self.name, &mut words[0..4]);
        str_to_ints(&self.clan, &mut words[4..7]);
        words[7] = self.country;
        str_to_ints(&self.skin, &mut words[8..14]);
        words
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LaserObj {
    pub x: i32,
    pub y: i32,
    pub from_x: i32,
    pub from_y: i32,
    pub start_tick: i32,
}

impl LaserObj {
    pub fn from_ints(d: &[i32]) -> Option<Self> {
        if d.len() < 5 {
            return None;
        }
        Some(Self {
            x: d[0],
            y: d[1],
            from_x: d[2],
            from_y: d[3],
            start_tick: d[4],
        })
    }
}

/// Snapshot items the client acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum NetObject {
    Character { id: i32, obj: CharacterObj },
    PlayerInfo { id: i32, obj: PlayerInfoObj },
    ClientInfo { id: i32, obj: ClientInfoObj },
    Laser { id: i32, obj: LaserObj },
    Other { type_id: i32, id: i32 },
}

impl NetObject {
    pub fn parse(item: &SnapItem) -> Self {
        let id = item.id();
        let parsed = match item.type_id() {
            obj::CHARACTER => {
                CharacterObj::from_ints(item.data).map(|obj| Self::Character { id, obj })
            }
            obj::PLAYER_INFO => {
                PlayerInfoObj::from_ints(item.data).map(|obj| Self::PlayerInfo { id, obj })
            }
            obj::CLIENT_INFO => {
                ClientInfoObj::from_ints(item.data).map(|obj| Self::ClientInfo { id, obj })
            }
            obj::LASER => LaserObj::from_ints(item.data).map(|obj| Self::Laser { id, obj }),
            _ => None,
        };
        parsed.unwrap_or(Self::Other {
            type_id: item.type_id(),
            id,
        })
    }
}

// Four characters per word, each offset by 128; the last byte of the last
// word is always a terminator.
pub fn ints_to_str(words: &[i32]) -> String {
    let mut bytes = Vec::with_capacity(words.len() * 4);
    for &word in words {
        for shift in [24, 16, 8, 0] {
            bytes.push((((word >> shift) & 0xff) - 128) as u8);
        }
    }
    if let Some(last) = bytes.last_mut() {
        *last = 0;
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

pub fn str_to_ints(value: &str, words: &mut [i32]) {
    let bytes = value.as_bytes();
    let capacity = (words.len() * 4).saturating_sub(1);
    for (index, word) in words.iter_mut().enumerate() {
        let mut packed = 0i32;
        for offset in 0..4 {
            let position = index * 4 + offset;
            let byte = if position < capacity {
                bytes.get(position).copied().unwrap_or(0)
            } else {
                0
            };
            packed = (packed << 8) | ((byte as i32 + 128) & 0xff);
        }
        *word = packed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::item::item_key;

    #[test]
    fn test_static_sizes() {
        assert_eq!(static_item_size(obj::CHARACTER), Some(22));
        assert_eq!(static_item_size(obj::CLIENT_INFO), Some(17));
        assert_eq!(static_item_size(0), None);
        assert_eq!(static_item_size(-1), None);
        assert_eq!(static_item_size(300), None);
    }

    #[test]
    fn test_name_words() {
        let mut words = [0; 4];
        str_to_ints("nameless tee", &mut words);
        assert_eq!(ints_to_str(&words), "nameless tee");

        str_to_ints("a name that is far too long", &mut words);
        assert_eq!(ints_to_str(&words), "a name that is ");
    }

    #[test]
    fn test_parse_objects() {
        let info = ClientInfoObj {
            name: "bot".into(),
            clan: "Hunter".into(),
            country: -1,
            skin: "default".into(),
        };
        let words = info.to_ints();
        let item = SnapItem {
            key: item_key(obj::CLIENT_INFO, 4),
            data: &words,
        };
        assert_eq!(NetObject::parse(&item), NetObject::ClientInfo { id: 4, obj: info });

        let short = SnapItem {
            key: item_key(obj::CHARACTER, 1),
            data: &[1, 2],
        };
        assert_eq!(
            NetObject::parse(&short),
            NetObject::Other {
                type_id: obj::CHARACTER,
                id: 1
            }
        );
    }
}
