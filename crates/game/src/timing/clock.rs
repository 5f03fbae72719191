use super::smooth::{AdjustDirection, SmoothTime, SmoothTimeConfig};
use super::TIME_FREQ;

const PREDICTED_UP_SPEED: f32 = 1000.0;

/// Smoothed server game time plus the predicted clock used to time input.
#[derive(Debug, Clone)]
pub struct TickClock {
    tick_speed: i32,
    game: SmoothTime,
    predicted: SmoothTime,
    initialized: bool,
}

impl TickClock {
    pub fn new(tick_speed: i32, config: SmoothTimeConfig) -> Self {
        Self {
            tick_speed,
            game: SmoothTime::new(config),
            predicted: SmoothTime::new(config),
            initialized: false,
        }
    }

    pub fn tick_start(&self, tick: i32) -> i64 {
        tick as i64 * TIME_FREQ / self.tick_speed as i64
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn init(&mut self, game_tick: i32, now: i64) {
        self.reset_predicted(game_tick, now);
        self.game.init(self.tick_start(game_tick.saturating_sub(1)), now);
        self.initialized = true;
    }

    pub fn reset_predicted(&mut self, game_tick: i32, now: i64) {
        self.predicted.init(self.tick_start(game_tick), now);
        self.predicted
            .set_adjust_speed(AdjustDirection::Up, PREDICTED_UP_SPEED);
    }

    pub fn on_snapshot(&mut self, game_tick: i32, now: i64) {
        let time_left_ms = (self.tick_start(game_tick) - self.game.get(now)) * 1000 / TIME_FREQ;
        self.game.update(
            self.tick_start(game_tick.saturating_sub(1)),
            time_left_ms as i32,
            AdjustDirection::Down,
            now,
        );
    }

    pub fn on_input_timing(&mut self, target: i64, time_left_ms: i32, now: i64) {
        self.predicted
            .update(target, time_left_ms, AdjustDirection::Up, now);
    }

    pub fn game_time(&self, now: i64) -> i64 {
        self.game.get(now)
    }

    pub fn predicted_time(&self, now: i64) -> i64 {
        self.predicted.get(now)
    }

    pub fn predicted_tick(&self, now: i64) -> i32 {
        let tick = self.predicted.get(now) * self.tick_speed as i64 / TIME_FREQ;
        (tick as i32).saturating_add(1)
    }

    /// Interpolation fraction of the smoothed game time between two ticks.
    pub fn intra_tick(&self, prev_tick: i32, cur_tick: i32, now: i64) -> f32 {
        let start = self.tick_start(prev_tick);
        let span = self.tick_start(cur_tick) - start;
        if span <= 0 {
            return 1.0;
        }
        ((self.game.get(now) - start) as f64 / span as f64) as f32
    }
}
