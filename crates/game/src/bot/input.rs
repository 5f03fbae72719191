use bitflags::bitflags;

pub const INPUT_WORDS: usize = 10;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PlayerFlags: i32 {
        const PLAYING = 1 << 0;
        const IN_MENU = 1 << 1;
        const CHATTING = 1 << 2;
        const SCOREBOARD = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BotInput {
    pub direction: i32,
    pub target_x: i32,
    pub target_y: i32,
    pub jump: bool,
    // press counter, low bit is the button state
    pub fire: i32,
    pub hook: bool,
    pub player_flags: PlayerFlags,
    pub wanted_weapon: i32,
    pub next_weapon: i32,
    pub prev_weapon: i32,
}

impl BotInput {
    pub fn to_ints(&self) -> [i32; INPUT_WORDS] {
        [
            self.direction,
            self.target_x,
            self.target_y,
            self.jump as i32,
            self.fire,
            self.hook as i32,
            self.player_flags.bits(),
            self.wanted_weapon,
            self.next_weapon,
            self.prev_weapon,
        ]
    }

    pub fn from_ints(data: &[i32]) -> Option<Self> {
        if data.len() < INPUT_WORDS {
            return None;
        }
        Some(Self {
            direction: data[0].signum(),
            target_x: data[1],
            target_y: data[2],
            jump: data[3] != 0,
            fire: data[4],
            hook: data[5] != 0,
            player_flags: PlayerFlags::from_bits_truncate(data[6]),
            wanted_weapon: data[7],
            next_weapon: data[8],
            prev_weapon: data[9],
        })
    }

    pub fn is_firing(&self) -> bool {
        self.fire & 1 != 0
    }
}
