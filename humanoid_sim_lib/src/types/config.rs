use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;

/// Tunable simulation settings.
///
/// Mirrors the dashboard's settings panel: the drain multipliers are the
/// values the idle/walk sliders adjust at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Forward walking speed target (m/s)
    pub walk_speed: f64,
    /// Reverse speed target magnitude (m/s)
    pub reverse_speed: f64,
    /// Multiplier applied to the speed target while running
    pub run_factor: f64,
    /// Heading change rate while turning (rad/s)
    pub turn_speed: f64,
    /// Joint offset accumulation rate while a joint key is held (rad/s)
    pub joint_speed: f64,

    /// Default map anchor latitude (degrees)
    pub base_lat: f64,
    /// Default map anchor longitude (degrees)
    pub base_lon: f64,

    /// Path sample interval (simulated seconds)
    pub record_interval: f64,
    /// Packet sample interval while idle (simulated seconds)
    pub packet_interval: f64,
    /// Packet sample interval while any control input is active
    pub packet_interval_active: f64,

    /// Idle drain multiplier (slider, 1.0 = nominal)
    pub idle_multiplier: f64,
    /// Walk drain multiplier (slider, 1.0 = nominal)
    pub walk_multiplier: f64,
    /// Charge rate (% per second)
    pub charge_rate: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            walk_speed: 3.5,
            reverse_speed: 2.0,
            run_factor: 2.0,
            turn_speed: 2.0,
            joint_speed: 2.0,
            base_lat: 37.7749,
            base_lon: -122.4194,
            record_interval: 2.0,
            packet_interval: 0.25,
            packet_interval_active: 0.1,
            idle_multiplier: 1.0,
            walk_multiplier: 1.0,
            charge_rate: 15.0,
        }
    }
}

impl SimSettings {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: SimSettings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.walk_speed <= 0.0 || self.reverse_speed <= 0.0 {
            return Err(eyre::eyre!(
                "Speed targets must be positive (walk: {}, reverse: {})",
                self.walk_speed,
                self.reverse_speed
            ));
        }

        if self.charge_rate <= 0.0 {
            return Err(eyre::eyre!(
                "Charge rate must be positive, got {}",
                self.charge_rate
            ));
        }

        if self.record_interval <= 0.0
            || self.packet_interval <= 0.0
            || self.packet_interval_active <= 0.0
        {
            return Err(eyre::eyre!("Sample intervals must be positive"));
        }

        if self.packet_interval_active > self.packet_interval {
            return Err(eyre::eyre!(
                "Active packet interval ({}) must not exceed the idle interval ({})",
                self.packet_interval_active,
                self.packet_interval
            ));
        }

        if self.idle_multiplier < 0.0 || self.walk_multiplier < 0.0 {
            return Err(eyre::eyre!("Drain multipliers must be non-negative"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = SimSettings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_packet_intervals() {
        let settings = SimSettings {
            packet_interval: 0.1,
            packet_interval_active: 0.25,
            ..SimSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_charge_rate() {
        let settings = SimSettings {
            charge_rate: 0.0,
            ..SimSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: SimSettings = toml::from_str("charge_rate = 20.0").unwrap();
        assert_eq!(settings.charge_rate, 20.0);
        assert_eq!(settings.walk_speed, 3.5);
    }
}
