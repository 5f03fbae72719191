use super::TIME_FREQ;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothTimeConfig {
    pub initial_adjust_speed: f32,
    pub spike_threshold_ms: i32,
    pub spike_increment: i32,
    pub spike_cap: i32,
    pub spike_trigger: i32,
    pub max_adjust_speed: f32,
    pub adjust_decay: f32,
    pub min_adjust_speed: f32,
}

impl Default for SmoothTimeConfig {
    fn default() -> Self {
        Self {
            initial_adjust_speed: 0.3,
            spike_threshold_ms: 50,
            spike_increment: 5,
            spike_cap: 50,
            spike_trigger: 15,
            max_adjust_speed: 30.0,
            adjust_decay: 0.95,
            min_adjust_speed: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustDirection {
    Down = 0,
    Up = 1,
}

/// A time value that eases from its current estimate toward a target.
#[derive(Debug, Clone)]
pub struct SmoothTime {
    config: SmoothTimeConfig,
    snap: i64,
    current: i64,
    target: i64,
    spike_counter: i32,
    adjust_speed: [f32; 2],
}

impl SmoothTime {
    pub fn new(config: SmoothTimeConfig) -> Self {
        Self {
            snap: 0,
            current: 0,
            target: 0,
            spike_counter: 0,
            adjust_speed: [config.initial_adjust_speed; 2],
            config,
        }
    }

    pub fn init(&mut self, target: i64, now: i64) {
        self.snap = now;
        self.current = target;
        self.target = target;
        self.spike_counter = 0;
        self.adjust_speed = [self.config.initial_adjust_speed; 2];
    }

    pub fn set_adjust_speed(&mut self, direction: AdjustDirection, speed: f32) {
        self.adjust_speed[direction as usize] = speed;
    }

    pub fn adjust_speed(&self, direction: AdjustDirection) -> f32 {
        self.adjust_speed[direction as usize]
    }

    pub fn spike_counter(&self) -> i32 {
        self.spike_counter
    }

    pub fn get(&self, now: i64) -> i64 {
        let elapsed = now - self.snap;
        let current = self.current + elapsed;
        let target = self.target + elapsed;

        let speed = if target > current {
            self.adjust_speed[AdjustDirection::Up as usize]
        } else {
            self.adjust_speed[AdjustDirection::Down as usize]
        };

        let amount = (elapsed as f64 / TIME_FREQ as f64 * speed as f64).min(1.0);
        current + ((target - current) as f64 * amount) as i64
    }

    pub fn update_int(&mut self, target: i64, now: i64) {
        self.current = self.get(now);
        self.snap = now;
        self.target = target;
    }

    /// Returns false when the update was discarded as a latency spike.
    pub fn update(
        &mut self,
        target: i64,
        time_left_ms: i32,
        direction: AdjustDirection,
        now: i64,
    ) -> bool {
        let slot = direction as usize;
        let mut apply = true;

        if time_left_ms < 0 {
            let is_spike = time_left_ms < -self.config.spike_threshold_ms;
            if is_spike {
                self.spike_counter =
                    (self.spike_counter + self.config.spike_increment).min(self.config.spike_cap);
            }

            if is_spike && self.spike_counter < self.config.spike_trigger {
                apply = false;
            } else if self.adjust_speed[slot] < self.config.max_adjust_speed {
                self.adjust_speed[slot] =
                    (self.adjust_speed[slot] * 2.0).min(self.config.max_adjust_speed);
            }
        } else {
            if self.spike_counter > 0 {
                self.spike_counter -= 1;
            }
            self.adjust_speed[slot] =
                (self.adjust_speed[slot] * self.config.adjust_decay).max(self.config.min_adjust_speed);
        }

        if apply {
            self.update_int(target, now);
        } else {
            log::debug!("Ignoring timing spike of {} ms", time_left_ms);
        }
        apply
    }
}
