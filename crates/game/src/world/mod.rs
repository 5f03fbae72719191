use glam::Vec2;

use crate::net::MAX_CLIENTS;
use crate::physics::{CharacterCore, MapGrid, PeerBody, PhysicsPredictor, TuningParams};
use crate::snapshot::objects::obj;
use crate::snapshot::{NetObject, Snapshot};

pub const TEAM_SPECTATORS: i32 = -1;
pub const TEAM_RED: i32 = 0;
pub const TEAM_BLUE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserSegment {
    pub from: Vec2,
    pub to: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientEntry {
    pub slot: usize,
    pub active: bool,
    pub alive: bool,
    pub name: String,
    pub clan: String,
    pub team: i32,
    pub score: i32,
    pub character: CharacterCore,
    pub last_snapshot_tick: i32,
}

impl ClientEntry {
    fn new(slot: usize) -> Self {
        Self {
            slot,
            active: false,
            alive: false,
            name: String::new(),
            clan: String::new(),
            team: TEAM_SPECTATORS,
            score: 0,
            character: CharacterCore::default(),
            last_snapshot_tick: 0,
        }
    }

    pub fn pos(&self) -> Vec2 {
        self.character.pos
    }

    pub fn is_playing(&self) -> bool {
        self.team != TEAM_SPECTATORS
    }
}

/// Per-slot view of the game assembled from snapshots. Entries are looked up
/// by slot on every use since they can deactivate between ticks.
#[derive(Debug, Clone)]
pub struct WorldModel {
    clients: Vec<ClientEntry>,
    lasers: Vec<LaserSegment>,
    local_slot: Option<usize>,
    game_tick: i32,
}

impl Default for WorldModel {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldModel {
    pub fn new() -> Self {
        Self {
            clients: (0..MAX_CLIENTS).map(ClientEntry::new).collect(),
            lasers: Vec::new(),
            local_slot: None,
            game_tick: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn game_tick(&self) -> i32 {
        self.game_tick
    }

    pub fn local_slot(&self) -> Option<usize> {
        self.local_slot
    }

    pub fn find(&self, slot: usize) -> Option<&ClientEntry> {
        self.clients.get(slot).filter(|entry| entry.active)
    }

    pub fn find_mut(&mut self, slot: usize) -> Option<&mut ClientEntry> {
        self.clients.get_mut(slot).filter(|entry| entry.active)
    }

    pub fn local(&self) -> Option<&ClientEntry> {
        self.find(self.local_slot?)
    }

    pub fn local_mut(&mut self) -> Option<&mut ClientEntry> {
        let slot = self.local_slot?;
        self.find_mut(slot)
    }

    pub fn active(&self) -> impl Iterator<Item = &ClientEntry> {
        self.clients.iter().filter(|entry| entry.active)
    }

    pub fn lasers(&self) -> &[LaserSegment] {
        &self.lasers
    }

    /// Positions of every live character, used as the fixed peer set of a
    /// prediction step.
    pub fn peers(&self) -> Vec<PeerBody> {
        self.active()
            .filter(|entry| entry.alive)
            .map(|entry| PeerBody {
                slot: entry.slot,
                pos: entry.character.pos,
            })
            .collect()
    }

    pub fn apply_snapshot(
        &mut self,
        snapshot: &Snapshot,
        game_tick: i32,
        tuning: &TuningParams,
        grid: Option<&MapGrid>,
        max_catchup: i32,
    ) {
        self.game_tick = game_tick;
        self.scan_roster(snapshot);

        let mut stale = Vec::new();
        for item in snapshot.items() {
            match NetObject::parse(&item) {
                NetObject::ClientInfo { id, obj } => {
                    if let Some(entry) = slot_entry(&mut self.clients, id) {
                        entry.name = obj.name;
                        entry.clan = obj.clan;
                    }
                }
                NetObject::PlayerInfo { id, obj } => {
                    if let Some(entry) = slot_entry(&mut self.clients, id) {
                        if obj.local {
                            self.local_slot = Some(entry.slot);
                        }
                        entry.team = obj.team;
                        entry.score = obj.score;
                        entry.active = true;
                    }
                }
                NetObject::Character { id, obj } => {
                    if let Some(entry) = slot_entry(&mut self.clients, id) {
                        entry.character = CharacterCore::from_obj(&obj);
                        entry.last_snapshot_tick = obj.tick;
                        entry.alive = true;
                        if obj.tick != 0 && obj.tick < game_tick {
                            stale.push(entry.slot);
                        }
                    }
                }
                NetObject::Laser { obj, .. } => self.lasers.push(LaserSegment {
                    from: Vec2::new(obj.from_x as f32, obj.from_y as f32),
                    to: Vec2::new(obj.x as f32, obj.y as f32),
                }),
                NetObject::Other { .. } => {}
            }
        }

        let Some(grid) = grid else {
            return;
        };
        if stale.is_empty() {
            return;
        }

        let peers = self.peers();
        let predictor = PhysicsPredictor::new(tuning, grid);
        for slot in stale {
            let entry = &mut self.clients[slot];
            let mut steps = 0;
            while entry.character.tick < game_tick && steps < max_catchup {
                predictor.step(&mut entry.character, slot, &peers);
                steps += 1;
            }
            if steps > 0 {
                log::trace!("Predicted slot {} forward {} ticks", slot, steps);
            }
        }
    }

    fn scan_roster(&mut self, snapshot: &Snapshot) {
        for entry in self.clients.iter_mut().filter(|entry| entry.active) {
            let id = entry.slot as i32;
            let has_info = snapshot.find_item(obj::PLAYER_INFO, id).is_some();
            if !has_info || snapshot.find_item(obj::CHARACTER, id).is_none() {
                entry.alive = false;
            }
            if !has_info {
                log::debug!("Slot {} left the roster", entry.slot);
                entry.active = false;
            }
        }
        self.lasers.clear();
    }
}

fn slot_entry(clients: &mut [ClientEntry], id: i32) -> Option<&mut ClientEntry> {
    usize::try_from(id).ok().and_then(|slot| clients.get_mut(slot))
}
