use std::time::Duration;

const INFECTED_KEYWORDS: &[&str] = &[
    "Hunter",
    "Smoker",
    "Spider",
    "Ghoul",
    "Undead",
    "Witch",
    "Voodoo",
    "Slug",
    "Boomer",
    "Bat",
    "Ghost",
    "Freezer",
    "Nightmare",
    "Slime",
    "InfectBot",
];

const HUMAN_KEYWORDS: &[&str] = &[
    "Engineer",
    "Soldier",
    "Scientist",
    "Medic",
    "Hero",
    "Ninja",
    "Mercenary",
    "Sniper",
    "Looper",
    "Biologist",
];

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub spectate_grace: Duration,
    pub team_request_interval: Duration,
    pub ally_search_interval: Duration,
    pub zone_scan_interval: Duration,

    pub search_distance: f32,
    pub stale_bias_per_tick: f32,
    pub adversary_offset_human: f32,
    pub adversary_offset_infected: f32,

    pub zone_cluster_radius: f32,
    pub zone_dedup_radius: f32,
    pub zone_min_samples: usize,
    pub zone_min_travel: f32,

    pub path_steps: usize,
    pub hook_release_distance: f32,

    pub aim_distance: f32,
    pub aim_step_min: f32,
    pub aim_step_max: f32,
    pub aim_alignment: f32,

    pub infected_keywords: Vec<String>,
    pub human_keywords: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            spectate_grace: Duration::from_secs(5),
            team_request_interval: Duration::from_secs(1),
            ally_search_interval: Duration::from_secs(7),
            zone_scan_interval: Duration::from_secs(20),

            search_distance: 9000.0,
            stale_bias_per_tick: 30.0,
            adversary_offset_human: 480.0,
            adversary_offset_infected: 480.0,

            zone_cluster_radius: 320.0,
            zone_dedup_radius: 480.0,
            zone_min_samples: 3,
            zone_min_travel: 480.0,

            path_steps: 20,
            hook_release_distance: 46.0,

            aim_distance: 400.0,
            // radians per tick
            aim_step_min: 0.05,
            aim_step_max: 0.25,
            aim_alignment: 0.5,

            infected_keywords: INFECTED_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            human_keywords: HUMAN_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}
