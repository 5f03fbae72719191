use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::classify::{Class, Classifier};
use super::config::BotConfig;
use super::hotzone::{HotZones, SightingClusters};
use super::input::{BotInput, PlayerFlags};
use crate::nav::{HazardOverlay, OccupancyGrid, Pathfinder};
use crate::physics::{
    CharacterCore, HookState, MapGrid, PHYS_SIZE, PhysicsPredictor, TileFlags, TuningParams,
};
use crate::snapshot::objects::{EMOTE_PAIN, weapon};
use crate::world::{ClientEntry, TEAM_RED, TEAM_SPECTATORS, WorldModel};

pub fn weapon_range(weapon_id: i32) -> f32 {
    match weapon_id {
        weapon::HAMMER => 64.0,
        weapon::GUN => 640.0,
        weapon::SHOTGUN => 240.0,
        weapon::GRENADE => 320.0,
        weapon::RIFLE => 640.0,
        weapon::NINJA => 192.0,
        _ => 64.0,
    }
}

pub struct TickContext<'a> {
    /// Client time in microseconds.
    pub now: i64,
    pub tuning: &'a TuningParams,
    pub grid: Option<&'a MapGrid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    pub input: BotInput,
    pub set_team: Option<i32>,
}

struct Navigation {
    pathfinder: Pathfinder,
    overlay: HazardOverlay,
}

pub struct BotDecisionEngine {
    config: BotConfig,
    classifier: Classifier,
    rng: StdRng,
    nav: Option<Navigation>,
    zones: HotZones,

    target: Option<usize>,
    ally: Option<usize>,
    zone_goal: Option<Vec2>,
    goal: Option<Vec2>,

    aim: Vec2,
    last_input: BotInput,

    target_team: Option<i32>,
    last_opponent_seen: i64,
    last_team_request: Option<i64>,
    last_ally_search: i64,
    last_zone_scan: i64,
}

impl BotDecisionEngine {
    pub fn new(config: BotConfig, seed: u64) -> Self {
        let classifier = Classifier::new(&config.infected_keywords, &config.human_keywords);
        let zones = HotZones::new(config.zone_dedup_radius);
        Self {
            config,
            classifier,
            rng: StdRng::seed_from_u64(seed),
            nav: None,
            zones,
            target: None,
            ally: None,
            zone_goal: None,
            goal: None,
            aim: Vec2::new(1.0, 0.0),
            last_input: BotInput::default(),
            target_team: None,
            last_opponent_seen: 0,
            last_team_request: None,
            last_ally_search: 0,
            last_zone_scan: 0,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Builds the navigation grid of a freshly loaded map and forgets
    /// everything learned on the previous one.
    pub fn set_map(&mut self, grid: &MapGrid) {
        let occupancy = OccupancyGrid::from_map(grid);
        let overlay = HazardOverlay::new(occupancy.width(), occupancy.height());
        self.nav = Some(Navigation {
            pathfinder: Pathfinder::new(occupancy),
            overlay,
        });
        self.zones.clear();
        self.zone_goal = None;
    }

    /// Called when entering the game.
    pub fn reset(&mut self, now: i64) {
        self.target = None;
        self.ally = None;
        self.goal = None;
        self.zone_goal = None;
        self.last_input = BotInput::default();
        self.target_team = None;
        self.last_opponent_seen = now;
        self.last_team_request = Some(now);
        self.last_ally_search = now;
        self.last_zone_scan = now;
        if let Some(nav) = &mut self.nav {
            nav.pathfinder.clear_goal();
        }
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn ally(&self) -> Option<usize> {
        self.ally
    }

    pub fn goal(&self) -> Option<Vec2> {
        self.goal
    }

    pub fn hot_zones(&self) -> &HotZones {
        &self.zones
    }

    pub fn pathfinder(&self) -> Option<&Pathfinder> {
        self.nav.as_ref().map(|nav| &nav.pathfinder)
    }

    pub fn class_of(&self, entry: &ClientEntry, local: bool) -> Class {
        if local {
            self.classifier.classify_local(&entry.clan)
        } else {
            self.classifier.classify(&entry.name, &entry.clan)
        }
    }

    pub fn tick(&mut self, world: &mut WorldModel, ctx: &TickContext) -> TickOutcome {
        let set_team = self.balance_team(world, ctx.now);

        let alive = world.local().is_some_and(|local| local.alive);
        let input = if alive {
            self.select_goal(world, ctx);
            self.compose_input(world, ctx)
        } else {
            BotInput {
                player_flags: PlayerFlags::PLAYING,
                fire: self.released_fire(),
                ..Default::default()
            }
        };

        self.last_input = input;
        TickOutcome { input, set_team }
    }

    /// A chat line that starts with our own name becomes a prompt.
    pub fn on_chat(&self, world: &WorldModel, client_id: i32, message: &str) -> Option<String> {
        let local = world.local()?;
        let sender = usize::try_from(client_id).ok()?;
        if sender == local.slot || local.name.is_empty() {
            return None;
        }
        let sender = world.find(sender)?;
        let rest = message.strip_prefix(local.name.as_str())?;
        let rest = rest.trim_start_matches([':', ',', ' ']).trim();
        if rest.is_empty() {
            return None;
        }
        Some(format!("{}: {}", sender.name, rest))
    }

    fn balance_team(&mut self, world: &WorldModel, now: i64) -> Option<i32> {
        let local = world.local()?;
        let self_class = self.class_of(local, true);

        let opponents = world
            .active()
            .filter(|entry| entry.slot != local.slot && entry.is_playing())
            .filter(|entry| self.class_of(entry, false) != self_class)
            .count();

        if opponents > 0 {
            self.last_opponent_seen = now;
            if local.team == TEAM_SPECTATORS {
                self.target_team = Some(TEAM_RED);
            }
        } else if now - self.last_opponent_seen > micros(self.config.spectate_grace) {
            self.target_team = Some(TEAM_SPECTATORS);
        }

        let wanted = self.target_team?;
        if wanted == local.team {
            return None;
        }
        let throttled = self
            .last_team_request
            .is_some_and(|last| now - last < micros(self.config.team_request_interval));
        if throttled {
            return None;
        }

        log::info!("Requesting team {}", wanted);
        self.last_team_request = Some(now);
        Some(wanted)
    }

    fn select_goal(&mut self, world: &WorldModel, ctx: &TickContext) {
        let Some(local) = world.local() else {
            return;
        };
        let now = ctx.now;
        let pos = local.pos();
        let self_class = self.class_of(local, true);
        let infected = self_class == Class::Infected;

        if let Some(slot) = self.target {
            let valid = world
                .find(slot)
                .is_some_and(|e| e.alive && self.class_of(e, false) != self_class);
            if !valid {
                self.target = None;
            }
        }
        if let Some(slot) = self.ally {
            if !world.find(slot).is_some_and(|e| e.alive) {
                self.ally = None;
            }
        }

        let search_ally =
            self.ally.is_none() || now - self.last_ally_search > micros(self.config.ally_search_interval);
        let scan_zones = now - self.last_zone_scan > micros(self.config.zone_scan_interval);

        // stale adversaries look farther for a human, closer for the infected
        let bias_sign = if infected { -1.0 } else { 1.0 };
        let offset = if infected {
            self.config.adversary_offset_infected
        } else {
            self.config.adversary_offset_human
        };

        let mut clusters = SightingClusters::new(self.config.zone_cluster_radius);
        let mut closest = self.config.search_distance;
        for entry in world.active() {
            if !entry.alive || entry.slot == local.slot {
                continue;
            }
            let opposing = self.class_of(entry, false) != self_class;
            let staleness = world
                .game_tick()
                .saturating_sub(entry.last_snapshot_tick)
                .max(0) as f32;
            let bias = staleness * self.config.stale_bias_per_tick * bias_sign;

            let mut distance = entry.pos().distance(pos);
            if opposing {
                distance += bias - offset;
                if scan_zones {
                    clusters.observe(entry.pos());
                }
            } else {
                distance -= bias;
            }

            if distance < closest {
                closest = distance;
                if opposing {
                    self.target = Some(entry.slot);
                } else if search_ally {
                    self.ally = Some(entry.slot);
                }
            }
        }

        if search_ally {
            self.last_ally_search = now;
        }

        if scan_zones {
            for zone in clusters.dense(self.config.zone_min_samples) {
                if self.zones.record(zone) {
                    log::info!("New hot zone at ({:.0}, {:.0})", zone.x, zone.y);
                }
            }
            self.zone_goal = self
                .zones
                .nearest(pos)
                .filter(|zone| zone.distance(pos) > self.config.zone_min_travel);
            if self.zone_goal.is_some() {
                self.ally = None;
            }
            self.last_zone_scan = now;
        }

        if infected && self.target.is_some() {
            self.ally = self.target;
        }

        self.goal = self
            .ally
            .and_then(|slot| world.find(slot))
            .map(|entry| entry.pos())
            .or(self.zone_goal);

        let Some(nav) = &mut self.nav else {
            return;
        };

        nav.overlay.clear();
        if infected {
            for laser in world.lasers() {
                nav.overlay.mark_segment(laser.from, laser.to);
            }
        }

        if let Some(goal) = self.goal {
            nav.pathfinder.set_goal(OccupancyGrid::cell_at(goal));
        }
    }

    fn compose_input(&mut self, world: &mut WorldModel, ctx: &TickContext) -> BotInput {
        let mut input = BotInput {
            player_flags: PlayerFlags::PLAYING,
            ..Default::default()
        };

        let Some(local) = world.local() else {
            return input;
        };
        let pos = local.pos();
        let character = local.character;

        let target = self.target.and_then(|slot| world.find(slot));
        let desired_aim = match (target, self.goal) {
            (Some(target), _) => target.pos() - pos,
            (None, Some(goal)) => {
                (goal - pos).normalize_or_zero() * goal.distance(pos).min(self.config.aim_distance)
            }
            (None, None) => self.aim,
        };

        let mut hook_aim = None;
        let mut climb_jump = None;

        if let (Some(nav), Some(grid)) = (&self.nav, ctx.grid) {
            if nav.pathfinder.goal().is_some() {
                let start = OccupancyGrid::cell_at(pos);
                let path = nav
                    .pathfinder
                    .find_path(start, self.config.path_steps, Some(&nav.overlay));

                if let Some(step) = path.first() {
                    input.direction = step.x;

                    if step.y < 0 {
                        let predictor = PhysicsPredictor::new(ctx.tuning, grid);
                        let grounded = predictor.is_grounded(&character);
                        if character.vel.y > -ctx.tuning.ground_jump_impulse / 2.0 {
                            if grounded {
                                climb_jump = Some((ctx.tuning.ground_jump_impulse, 1));
                            } else if character.jumped & 2 == 0 {
                                climb_jump = Some((ctx.tuning.air_jump_impulse, 3));
                            }
                        }

                        if climb_jump.is_none() {
                            hook_aim = self.climb_hook(grid, ctx.tuning, pos, &character);
                        }
                    }
                }
            }
        }

        if let Some((impulse, bits)) = climb_jump {
            input.jump = true;
            if let Some(local) = world.local_mut() {
                local.character.vel.y = -impulse;
                local.character.jumped |= bits;
            }
        }

        if let Some(dir) = hook_aim {
            input.hook = true;
            self.aim = dir * self.config.aim_distance;
        } else {
            self.ease_aim(desired_aim);
        }

        let target = self.target.and_then(|slot| world.find(slot));
        let wants_fire = match (target, ctx.grid) {
            (Some(target), Some(grid)) if hook_aim.is_none() => {
                target.character.emote != EMOTE_PAIN
                    && grid
                        .intersect_line(pos, target.pos())
                        .is_none_or(|hit| !hit.flags.contains(TileFlags::SOLID))
                    && target.pos().distance(pos) < weapon_range(character.weapon)
                    && self.aim.normalize_or_zero().distance(desired_aim.normalize_or_zero())
                        < self.config.aim_alignment
            }
            _ => false,
        };

        input.fire = if wants_fire {
            self.last_input.fire + 1
        } else {
            self.released_fire()
        };
        input.target_x = self.aim.x.round() as i32;
        input.target_y = self.aim.y.round() as i32;
        input
    }

    /// Picks a hookable surface above the character to climb toward, or
    /// keeps the current grab while it still makes upward progress.
    fn climb_hook(
        &self,
        grid: &MapGrid,
        tuning: &TuningParams,
        pos: Vec2,
        character: &CharacterCore,
    ) -> Option<Vec2> {
        if character.hook_state == HookState::Grabbed {
            let close = character.hook_pos.distance(pos) < self.config.hook_release_distance;
            let stalled = character.vel.y >= 0.0;
            if close || stalled {
                return None;
            }
            return Some((character.hook_pos - pos).normalize_or_zero());
        }

        let side = if self.aim.x < 0.0 { -1.0 } else { 1.0 };
        let candidates = [
            Vec2::new(0.0, -1.0),
            Vec2::new(side, -1.0).normalize(),
            Vec2::new(-side, -1.0).normalize(),
        ];
        let from = pos - Vec2::new(0.0, PHYS_SIZE / 2.0);
        candidates.into_iter().find(|dir| {
            grid.intersect_line(from, from + *dir * tuning.hook_length)
                .is_some_and(|hit| !hit.flags.contains(TileFlags::UNHOOKABLE))
        })
    }

    /// Rotates the aim toward `desired` by a bounded, slightly jittered
    /// angle per tick.
    fn ease_aim(&mut self, desired: Vec2) {
        let current_angle = self.aim.y.atan2(self.aim.x);
        let desired_angle = desired.y.atan2(desired.x);
        let mut delta = desired_angle - current_angle;
        while delta > std::f32::consts::PI {
            delta -= std::f32::consts::TAU;
        }
        while delta < -std::f32::consts::PI {
            delta += std::f32::consts::TAU;
        }

        let max_step = self
            .rng
            .gen_range(self.config.aim_step_min..=self.config.aim_step_max);
        let angle = current_angle + delta.clamp(-max_step, max_step);
        let length = desired.length().clamp(1.0, self.config.aim_distance);
        self.aim = Vec2::from_angle(angle) * length;
    }

    fn released_fire(&self) -> i32 {
        if self.last_input.is_firing() {
            self.last_input.fire + 1
        } else {
            self.last_input.fire
        }
    }
}

fn micros(duration: std::time::Duration) -> i64 {
    duration.as_micros() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::objects::obj;
    use crate::snapshot::{CharacterObj, ClientInfoObj, PlayerInfoObj, SnapshotBuilder};
    use crate::world::TEAM_BLUE;

    const SECOND: i64 = 1_000_000;

    struct Player {
        slot: i32,
        local: bool,
        team: i32,
        name: &'static str,
        clan: &'static str,
        pos: Option<(i32, i32)>,
    }

    fn world_with(players: &[Player], tick: i32) -> WorldModel {
        let mut builder = SnapshotBuilder::new();
        for player in players {
            builder.add(
                obj::PLAYER_INFO,
                player.slot,
                &PlayerInfoObj {
                    local: player.local,
                    client_id: player.slot,
                    team: player.team,
                    score: 0,
                    latency: 0,
                }
                .to_ints(),
            );
            builder.add(
                obj::CLIENT_INFO,
                player.slot,
                &ClientInfoObj {
                    name: player.name.into(),
                    clan: player.clan.into(),
                    country: -1,
                    skin: "default".into(),
                }
                .to_ints(),
            );
            if let Some((x, y)) = player.pos {
                builder.add(
                    obj::CHARACTER,
                    player.slot,
                    &CharacterObj {
                        tick,
                        x,
                        y,
                        hooked_player: -1,
                        weapon: weapon::GUN,
                        ..Default::default()
                    }
                    .to_ints(),
                );
            }
        }
        let mut world = WorldModel::new();
        world.apply_snapshot(&builder.finish(), tick, &TuningParams::default(), None, 0);
        world
    }

    fn open_map() -> MapGrid {
        let mut rows = vec!["#".repeat(40)];
        for _ in 0..18 {
            rows.push(format!("#{}#", ".".repeat(38)));
        }
        rows.push("#".repeat(40));
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        MapGrid::from_rows(&rows).unwrap()
    }

    fn me(team: i32, pos: Option<(i32, i32)>) -> Player {
        Player {
            slot: 0,
            local: true,
            team,
            name: "hookbot",
            clan: "",
            pos,
        }
    }

    #[test]
    fn test_join_when_opponents_present() {
        let mut world = world_with(
            &[
                me(TEAM_SPECTATORS, None),
                Player {
                    slot: 1,
                    local: false,
                    team: TEAM_RED,
                    name: "x",
                    clan: "Smoker",
                    pos: None,
                },
            ],
            100,
        );
        let tuning = TuningParams::default();
        let mut engine = BotDecisionEngine::new(BotConfig::default(), 7);
        engine.reset(0);

        let ctx = TickContext {
            now: 2 * SECOND,
            tuning: &tuning,
            grid: None,
        };
        assert_eq!(engine.tick(&mut world, &ctx).set_team, Some(TEAM_RED));

        // throttled
        let ctx = TickContext {
            now: 2 * SECOND + 100_000,
            tuning: &tuning,
            grid: None,
        };
        assert_eq!(engine.tick(&mut world, &ctx).set_team, None);
    }

    #[test]
    fn test_spectate_after_grace() {
        let mut world = world_with(
            &[
                me(TEAM_RED, Some((100, 100))),
                Player {
                    slot: 1,
                    local: false,
                    team: TEAM_BLUE,
                    name: "friend",
                    clan: "Medic",
                    pos: Some((200, 100)),
                },
            ],
            100,
        );
        let tuning = TuningParams::default();
        let mut engine = BotDecisionEngine::new(BotConfig::default(), 7);
        engine.reset(0);

        let tick = |engine: &mut BotDecisionEngine, world: &mut WorldModel, now| {
            let ctx = TickContext {
                now,
                tuning: &tuning,
                grid: None,
            };
            engine.tick(world, &ctx).set_team
        };

        assert_eq!(tick(&mut engine, &mut world, 4 * SECOND), None);
        assert_eq!(
            tick(&mut engine, &mut world, 6 * SECOND),
            Some(TEAM_SPECTATORS)
        );
    }

    #[test]
    fn test_picks_adversary_and_ally() {
        let mut world = world_with(
            &[
                me(TEAM_RED, Some((320, 320))),
                Player {
                    slot: 1,
                    local: false,
                    team: TEAM_RED,
                    name: "zombie",
                    clan: "Ghoul",
                    pos: Some((900, 320)),
                },
                Player {
                    slot: 2,
                    local: false,
                    team: TEAM_RED,
                    name: "friend",
                    clan: "Engineer",
                    pos: Some((400, 320)),
                },
            ],
            100,
        );
        let grid = open_map();
        let tuning = TuningParams::default();
        let mut engine = BotDecisionEngine::new(BotConfig::default(), 7);
        engine.set_map(&grid);
        engine.reset(0);

        let ctx = TickContext {
            now: SECOND,
            tuning: &tuning,
            grid: Some(&grid),
        };
        let outcome = engine.tick(&mut world, &ctx);

        assert_eq!(engine.ally(), Some(2));
        assert_eq!(engine.target(), Some(1));
        assert_eq!(engine.goal(), Some(Vec2::new(400.0, 320.0)));
        assert_eq!(outcome.input.direction, 1);
        assert_eq!(engine.pathfinder().unwrap().rebuilds(), 1);

        // same goal cell, no rebuild
        engine.tick(&mut world, &ctx);
        assert_eq!(engine.pathfinder().unwrap().rebuilds(), 1);
    }

    #[test]
    fn test_infected_escorts_target() {
        let mut world = world_with(
            &[
                Player {
                    clan: "Hunter",
                    ..me(TEAM_RED, Some((320, 320)))
                },
                Player {
                    slot: 1,
                    local: false,
                    team: TEAM_RED,
                    name: "human",
                    clan: "Soldier",
                    pos: Some((100, 320)),
                },
            ],
            100,
        );
        let grid = open_map();
        let tuning = TuningParams::default();
        let mut engine = BotDecisionEngine::new(BotConfig::default(), 7);
        engine.set_map(&grid);
        engine.reset(0);

        let ctx = TickContext {
            now: SECOND,
            tuning: &tuning,
            grid: Some(&grid),
        };
        let outcome = engine.tick(&mut world, &ctx);
        assert_eq!(engine.target(), Some(1));
        assert_eq!(engine.ally(), Some(1));
        assert_eq!(outcome.input.direction, -1);
    }

    #[test]
    fn test_fires_when_aligned_and_in_range() {
        let mut world = world_with(
            &[
                me(TEAM_RED, Some((320, 320))),
                Player {
                    slot: 1,
                    local: false,
                    team: TEAM_RED,
                    name: "zombie",
                    clan: "Slime",
                    pos: Some((520, 320)),
                },
            ],
            100,
        );
        let grid = open_map();
        let tuning = TuningParams::default();
        let mut engine = BotDecisionEngine::new(BotConfig::default(), 7);
        engine.set_map(&grid);
        engine.reset(0);

        let mut presses = 0;
        for i in 1..=6 {
            let ctx = TickContext {
                now: i * 20_000,
                tuning: &tuning,
                grid: Some(&grid),
            };
            let outcome = engine.tick(&mut world, &ctx);
            if outcome.input.is_firing() {
                presses += 1;
            }
        }
        assert_eq!(engine.target(), Some(1));
        assert!(presses >= 2);
    }

    #[test]
    fn test_no_fire_at_target_in_pain() {
        let mut world = world_with(
            &[
                me(TEAM_RED, Some((320, 320))),
                Player {
                    slot: 1,
                    local: false,
                    team: TEAM_RED,
                    name: "zombie",
                    clan: "Slime",
                    pos: Some((520, 320)),
                },
            ],
            100,
        );
        world.find_mut(1).unwrap().character.emote = EMOTE_PAIN;
        let grid = open_map();
        let tuning = TuningParams::default();
        let mut engine = BotDecisionEngine::new(BotConfig::default(), 7);
        engine.set_map(&grid);
        engine.reset(0);

        for i in 1..=6 {
            let ctx = TickContext {
                now: i * 20_000,
                tuning: &tuning,
                grid: Some(&grid),
            };
            assert!(!engine.tick(&mut world, &ctx).input.is_firing());
        }
    }

    #[test]
    fn test_hot_zone_from_clustered_adversaries() {
        let mut players = vec![me(TEAM_RED, Some((100, 100)))];
        for (slot, x) in [(1, 900), (2, 950), (3, 1000)] {
            players.push(Player {
                slot,
                local: false,
                team: TEAM_RED,
                name: "zombie",
                clan: "Bat",
                pos: Some((x, 500)),
            });
        }
        let mut world = world_with(&players, 100);
        let tuning = TuningParams::default();
        let mut engine = BotDecisionEngine::new(BotConfig::default(), 7);
        engine.reset(0);

        let ctx = TickContext {
            now: 21 * SECOND,
            tuning: &tuning,
            grid: None,
        };
        engine.tick(&mut world, &ctx);
        assert_eq!(engine.hot_zones().zones(), &[Vec2::new(900.0, 500.0)]);
        assert_eq!(engine.goal(), Some(Vec2::new(900.0, 500.0)));
    }

    #[test]
    fn test_chat_prompt() {
        let world = world_with(
            &[
                me(TEAM_RED, None),
                Player {
                    slot: 4,
                    local: false,
                    team: TEAM_RED,
                    name: "alice",
                    clan: "",
                    pos: None,
                },
            ],
            100,
        );
        let engine = BotDecisionEngine::new(BotConfig::default(), 7);

        assert_eq!(
            engine.on_chat(&world, 4, "hookbot: where are you?"),
            Some("alice: where are you?".to_string())
        );
        assert_eq!(engine.on_chat(&world, 4, "hello all"), None);
        assert_eq!(engine.on_chat(&world, 0, "hookbot: echo"), None);
        assert_eq!(engine.on_chat(&world, -1, "hookbot: server"), None);
    }

    #[test]
    fn test_weapon_ranges() {
        assert_eq!(weapon_range(weapon::HAMMER), 64.0);
        assert_eq!(weapon_range(weapon::RIFLE), 640.0);
        assert_eq!(weapon_range(42), 64.0);
    }
}
