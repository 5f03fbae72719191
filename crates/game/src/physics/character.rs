use glam::Vec2;

use super::collision::{MapGrid, TileFlags};
use super::tuning::TuningParams;
use crate::net::SERVER_TICK_SPEED;
use crate::snapshot::CharacterObj;

pub const PHYS_SIZE: f32 = 28.0;
pub const MAX_VELOCITY: f32 = 6000.0;
const HOOK_DRAG_MIN_DISTANCE: f32 = 46.0;
const HOOK_PLAYER_TICKS: i32 = SERVER_TICK_SPEED + SERVER_TICK_SPEED / 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookState {
    Retracted,
    #[default]
    Idle,
    RetractStart,
    Retracting,
    RetractEnd,
    Flying,
    Grabbed,
}

impl HookState {
    pub fn from_network(value: i32) -> Self {
        match value {
            -1 => Self::Retracted,
            1 => Self::RetractStart,
            2 => Self::Retracting,
            3 => Self::RetractEnd,
            4 => Self::Flying,
            5 => Self::Grabbed,
            _ => Self::Idle,
        }
    }

    pub fn to_network(self) -> i32 {
        match self {
            Self::Retracted => -1,
            Self::Idle => 0,
            Self::RetractStart => 1,
            Self::Retracting => 2,
            Self::RetractEnd => 3,
            Self::Flying => 4,
            Self::Grabbed => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CharacterCore {
    pub tick: i32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub angle: i32,
    pub direction: i32,
    pub jumped: i32,
    pub hook_pos: Vec2,
    pub hook_dir: Vec2,
    pub hook_tick: i32,
    pub hook_state: HookState,
    pub hooked_player: Option<usize>,
    pub weapon: i32,
    pub emote: i32,
    pub health: i32,
    pub armor: i32,
    pub ammo: i32,
    pub attack_tick: i32,
    pub player_flags: i32,
}

impl CharacterCore {
    pub fn from_obj(obj: &CharacterObj) -> Self {
        Self {
            tick: obj.tick,
            pos: Vec2::new(obj.x as f32, obj.y as f32),
            vel: Vec2::new(obj.vel_x as f32 / 256.0, obj.vel_y as f32 / 256.0),
            angle: obj.angle,
            direction: obj.direction,
            jumped: obj.jumped,
            hook_pos: Vec2::new(obj.hook_x as f32, obj.hook_y as f32),
            hook_dir: Vec2::new(obj.hook_dx as f32 / 256.0, obj.hook_dy as f32 / 256.0),
            hook_tick: obj.hook_tick,
            hook_state: HookState::from_network(obj.hook_state),
            hooked_player: usize::try_from(obj.hooked_player).ok(),
            weapon: obj.weapon,
            emote: obj.emote,
            health: obj.health,
            armor: obj.armor,
            ammo: obj.ammo_count,
            attack_tick: obj.attack_tick,
            player_flags: obj.player_flags,
        }
    }
}

/// Another live character as seen by a prediction step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerBody {
    pub slot: usize,
    pub pos: Vec2,
}

pub fn saturated_add(min: f32, max: f32, current: f32, modifier: f32) -> f32 {
    if modifier < 0.0 {
        if current < min {
            return current;
        }
        (current + modifier).max(min)
    } else {
        if current > max {
            return current;
        }
        (current + modifier).min(max)
    }
}

pub fn velocity_ramp(value: f32, start: f32, range: f32, curvature: f32) -> f32 {
    if value < start {
        return 1.0;
    }
    1.0 / curvature.powf((value - start) / range)
}

pub fn closest_point_on_line(a: Vec2, b: Vec2, point: Vec2) -> Vec2 {
    let ab = b - a;
    let length_sq = ab.length_squared();
    if length_sq <= f32::EPSILON {
        return a;
    }
    let t = ((point - a).dot(ab) / length_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Advances characters one tick without input. The step only reads the
/// grid, tuning and peers, so replaying it from the same state reproduces
/// the same result.
pub struct PhysicsPredictor<'a> {
    tuning: &'a TuningParams,
    grid: &'a MapGrid,
}

impl<'a> PhysicsPredictor<'a> {
    pub fn new(tuning: &'a TuningParams, grid: &'a MapGrid) -> Self {
        Self { tuning, grid }
    }

    pub fn is_grounded(&self, core: &CharacterCore) -> bool {
        self.grid.is_grounded(core.pos, PHYS_SIZE)
    }

    pub fn step(&self, core: &mut CharacterCore, slot: usize, peers: &[PeerBody]) {
        self.tick(core, slot, peers);
        self.travel(core, slot, peers);
        core.tick += 1;
    }

    fn tick(&self, core: &mut CharacterCore, slot: usize, peers: &[PeerBody]) {
        let tuning = self.tuning;
        let grounded = self.is_grounded(core);

        core.vel.y += tuning.gravity;

        let (max_speed, accel, friction) = if grounded {
            (
                tuning.ground_control_speed,
                tuning.ground_control_accel,
                tuning.ground_friction,
            )
        } else {
            (
                tuning.air_control_speed,
                tuning.air_control_accel,
                tuning.air_friction,
            )
        };

        match core.direction.signum() {
            -1 => core.vel.x = saturated_add(-max_speed, max_speed, core.vel.x, -accel),
            1 => core.vel.x = saturated_add(-max_speed, max_speed, core.vel.x, accel),
            _ => core.vel.x *= friction,
        }

        if grounded {
            core.jumped &= !2;
        }

        self.advance_hook(core, slot, peers);

        for peer in peers.iter().filter(|peer| peer.slot != slot) {
            let distance = core.pos.distance(peer.pos);
            let dir = (core.pos - peer.pos).normalize_or_zero();

            if tuning.player_collision() && distance < PHYS_SIZE * 1.25 && distance > 0.0 {
                let a = PHYS_SIZE * 1.45 - distance;
                let mut velocity = 0.5;
                if core.vel.length() > 0.0001 {
                    velocity = 1.0 - (core.vel.normalize().dot(dir) + 1.0) / 2.0;
                }
                core.vel += dir * a * (velocity * 0.75);
                core.vel *= 0.85;
            }

            if core.hooked_player == Some(peer.slot)
                && tuning.player_hooking()
                && distance > PHYS_SIZE * 1.50
            {
                let accel = tuning.hook_drag_accel * (distance / tuning.hook_length);
                let drag = tuning.hook_drag_speed;
                core.vel.x = saturated_add(-drag, drag, core.vel.x, -accel * dir.x * 0.25);
                core.vel.y = saturated_add(-drag, drag, core.vel.y, -accel * dir.y * 0.25);
            }
        }

        if core.vel.length() > MAX_VELOCITY {
            core.vel = core.vel.normalize() * MAX_VELOCITY;
        }
    }

    fn advance_hook(&self, core: &mut CharacterCore, slot: usize, peers: &[PeerBody]) {
        let tuning = self.tuning;

        match core.hook_state {
            HookState::Idle => {
                core.hooked_player = None;
                core.hook_pos = core.pos;
            }
            HookState::RetractStart => core.hook_state = HookState::Retracting,
            HookState::Retracting => core.hook_state = HookState::RetractEnd,
            HookState::RetractEnd => core.hook_state = HookState::Retracted,
            HookState::Flying => self.fly_hook(core, slot, peers),
            HookState::Retracted | HookState::Grabbed => {}
        }

        if core.hook_state != HookState::Grabbed {
            return;
        }

        if let Some(hooked) = core.hooked_player {
            match peers.iter().find(|peer| peer.slot == hooked) {
                Some(peer) => core.hook_pos = peer.pos,
                None => {
                    release_hook(core);
                    return;
                }
            }
        }

        if core.hooked_player.is_none() && core.hook_pos.distance(core.pos) > HOOK_DRAG_MIN_DISTANCE {
            let mut hook_vel = (core.hook_pos - core.pos).normalize_or_zero() * tuning.hook_drag_accel;

            // pulling down is weaker than pulling up
            if hook_vel.y > 0.0 {
                hook_vel.y *= 0.3;
            }

            let steering_toward =
                (hook_vel.x < 0.0 && core.direction < 0) || (hook_vel.x > 0.0 && core.direction > 0);
            hook_vel.x *= if steering_toward { 0.95 } else { 0.75 };

            let new_vel = core.vel + hook_vel;
            if new_vel.length() < tuning.hook_drag_speed || new_vel.length() < core.vel.length() {
                core.vel = new_vel;
            }
        }

        core.hook_tick += 1;
        if core.hooked_player.is_some() && core.hook_tick > HOOK_PLAYER_TICKS {
            release_hook(core);
        }
    }

    fn fly_hook(&self, core: &mut CharacterCore, slot: usize, peers: &[PeerBody]) {
        let tuning = self.tuning;
        let mut new_pos = core.hook_pos + core.hook_dir * tuning.hook_fire_speed;

        let exceeded = core.pos.distance(new_pos) > tuning.hook_length;
        if exceeded {
            new_pos = core.pos + (new_pos - core.pos).normalize_or_zero() * tuning.hook_length;
        }

        let tile_hit = self.grid.intersect_line(core.hook_pos, new_pos);
        if let Some(hit) = tile_hit {
            new_pos = hit.point;
        }

        if tuning.player_hooking() {
            let mut nearest: Option<(usize, f32)> = None;
            for peer in peers.iter().filter(|peer| peer.slot != slot) {
                let closest = closest_point_on_line(core.hook_pos, new_pos, peer.pos);
                if peer.pos.distance(closest) < PHYS_SIZE + 2.0 {
                    let distance = core.hook_pos.distance(peer.pos);
                    if nearest.is_none_or(|(_, best)| distance < best) {
                        nearest = Some((peer.slot, distance));
                    }
                }
            }

            if let Some((hooked, _)) = nearest {
                core.hook_state = HookState::Grabbed;
                core.hooked_player = Some(hooked);
                return;
            }
        }

        core.hook_pos = new_pos;
        core.hook_state = match tile_hit {
            Some(hit) if hit.flags.contains(TileFlags::UNHOOKABLE) => HookState::RetractStart,
            Some(_) => HookState::Grabbed,
            None if exceeded => HookState::Idle,
            None => HookState::Flying,
        };
    }

    fn travel(&self, core: &mut CharacterCore, slot: usize, peers: &[PeerBody]) {
        let tuning = self.tuning;
        let ramp = velocity_ramp(
            core.vel.length() * 50.0,
            tuning.velramp_start,
            tuning.velramp_range,
            tuning.velramp_curvature,
        );

        core.vel.x *= ramp;
        let (new_pos, vel) = self
            .grid
            .move_box(core.pos, core.vel, Vec2::splat(PHYS_SIZE), 0.0);
        core.vel = vel;
        core.vel.x *= 1.0 / ramp;

        if tuning.player_collision() {
            let distance = core.pos.distance(new_pos);
            let end = (distance + 1.0) as i32;
            let mut last = core.pos;

            for i in 0..end {
                let a = if distance > 0.0 { i as f32 / distance } else { 0.0 };
                let pos = core.pos.lerp(new_pos, a);
                for peer in peers.iter().filter(|peer| peer.slot != slot) {
                    let d = pos.distance(peer.pos);
                    if d < PHYS_SIZE && d > 0.0 {
                        if a > 0.0 {
                            core.pos = last;
                        } else if new_pos.distance(peer.pos) > d {
                            core.pos = new_pos;
                        }
                        return;
                    }
                }
                last = pos;
            }
        }

        core.pos = new_pos;
    }
}

fn release_hook(core: &mut CharacterCore) {
    core.hooked_player = None;
    core.hook_state = HookState::Retracted;
    core.hook_pos = core.pos;
}
