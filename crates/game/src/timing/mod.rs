mod clock;
mod smooth;

pub use clock::TickClock;
pub use smooth::{AdjustDirection, SmoothTime, SmoothTimeConfig};

/// Client time is kept in microseconds.
pub const TIME_FREQ: i64 = 1_000_000;
pub const PREDICTION_MARGIN_MS: i64 = 1000 / crate::net::SERVER_TICK_SPEED as i64 / 2;
