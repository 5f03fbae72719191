macro_rules! tuning_params {
    ($($name:ident = $default:expr),* $(,)?) => {
        /// Physics constants the server may override. Sent over the wire as
        /// hundredths in declaration order.
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct TuningParams {
            $(pub $name: f32,)*
        }

        impl Default for TuningParams {
            fn default() -> Self {
                Self {
                    $($name: $default,)*
                }
            }
        }

        impl TuningParams {
            pub const NAMES: &'static [&'static str] = &[$(stringify!($name),)*];

            pub fn from_network(values: &[i32]) -> Option<Self> {
                if values.len() != Self::NAMES.len() {
                    return None;
                }
                let mut iter = values.iter();
                Some(Self {
                    $($name: *iter.next()? as f32 / 100.0,)*
                })
            }

            pub fn to_network(&self) -> Vec<i32> {
                vec![$((self.$name * 100.0).round() as i32,)*]
            }
        }
    };
}

tuning_params! {
    ground_control_speed = 10.0,
    ground_control_accel = 100.0 / 50.0,
    ground_friction = 0.5,
    ground_jump_impulse = 13.2,
    air_jump_impulse = 12.0,
    air_control_speed = 250.0 / 50.0,
    air_control_accel = 1.5,
    air_friction = 0.95,
    hook_length = 380.0,
    hook_fire_speed = 80.0,
    hook_drag_accel = 3.0,
    hook_drag_speed = 15.0,
    gravity = 0.5,
    velramp_start = 550.0,
    velramp_range = 2000.0,
    velramp_curvature = 1.4,
    gun_curvature = 1.25,
    gun_speed = 2200.0,
    gun_lifetime = 2.0,
    shotgun_curvature = 1.25,
    shotgun_speed = 2750.0,
    shotgun_speeddiff = 0.8,
    shotgun_lifetime = 0.20,
    grenade_curvature = 7.0,
    grenade_speed = 1000.0,
    grenade_lifetime = 2.0,
    laser_reach = 800.0,
    laser_bounce_delay = 150.0,
    laser_bounce_num = 1.0,
    laser_bounce_cost = 0.0,
    laser_damage = 5.0,
    player_collision = 1.0,
    player_hooking = 1.0,
}

impl TuningParams {
    pub fn player_collision(&self) -> bool {
        self.player_collision != 0.0
    }

    pub fn player_hooking(&self) -> bool {
        self.player_hooking != 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::protocol::NUM_TUNING_PARAMS;

    #[test]
    fn test_param_count_matches_wire() {
        assert_eq!(TuningParams::NAMES.len(), NUM_TUNING_PARAMS);
        assert_eq!(TuningParams::default().to_network().len(), NUM_TUNING_PARAMS);
    }

    #[test]
    fn test_from_network_scales_hundredths() {
        let mut values = TuningParams::default().to_network();
        values[12] = 75;
        let tuning = TuningParams::from_network(&values).unwrap();
        assert_eq!(tuning.gravity, 0.75);
        assert_eq!(tuning.hook_length, 380.0);
        assert!(TuningParams::from_network(&values[1..]).is_none());
    }
}
