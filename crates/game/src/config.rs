use std::time::Duration;

use serde::Deserialize;

use crate::bot::BotConfig;
use crate::chat::ChatPolicy;
use crate::net::StartInfo;
use crate::timing::SmoothTimeConfig;

/// Player identity sent with the start info. Loadable from a JSON profile;
/// missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Identity {
    pub name: String,
    pub clan: String,
    pub country: i32,
    pub skin: String,
    pub use_custom_color: bool,
    pub color_body: i32,
    pub color_feet: i32,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "nameless tee".to_string(),
            clan: String::new(),
            country: -1,
            skin: "default".to_string(),
            use_custom_color: false,
            color_body: 65408,
            color_feet: 65408,
        }
    }
}

impl Identity {
    pub fn start_info(&self) -> StartInfo {
        StartInfo {
            name: self.name.clone(),
            clan: self.clan.clone(),
            country: self.country,
            skin: self.skin.clone(),
            use_custom_color: self.use_custom_color,
            color_body: self.color_body,
            color_feet: self.color_feet,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub identity: Identity,
    pub password: String,
    /// Sent as chat right after entering the game.
    pub enter_commands: Vec<String>,

    pub input_refresh: Duration,
    pub max_catchup_ticks: i32,
    pub min_buffered_snapshots: u32,

    pub chat_timeout: Duration,
    /// Sent when the chat backend fails, `{}` becomes the error.
    pub chat_fallback: String,
    pub chat_cooldown: Duration,
    pub chat_queue_capacity: usize,

    pub clock: SmoothTimeConfig,
    pub bot: BotConfig,
    pub rng_seed: u64,
}

impl ClientConfig {
    pub fn chat_policy(&self) -> ChatPolicy {
        ChatPolicy::new(self.chat_fallback.clone(), self.chat_cooldown)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            identity: Identity::default(),
            password: String::new(),
            enter_commands: vec!["/alwaysrandom 1".to_string()],

            input_refresh: Duration::from_millis(40),
            max_catchup_ticks: 50,
            min_buffered_snapshots: 3,

            chat_timeout: Duration::from_secs(30),
            chat_fallback: "... ({})".to_string(),
            chat_cooldown: Duration::from_secs(2),
            chat_queue_capacity: 8,

            clock: SmoothTimeConfig::default(),
            bot: BotConfig::default(),
            rng_seed: 0x5eed,
        }
    }
}
