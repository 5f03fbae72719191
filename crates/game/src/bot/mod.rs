mod classify;
mod config;
mod engine;
mod hotzone;
mod input;

pub use classify::{Class, Classifier};
pub use config::BotConfig;
pub use engine::{BotDecisionEngine, TickContext, TickOutcome, weapon_range};
pub use hotzone::{HotZones, SightingClusters};
pub use input::{BotInput, INPUT_WORDS, PlayerFlags};
