// Loop rate, topics, motor constants and the loadable settings/robot description
use std::path::Path;

use serde::Deserialize;

use crate::error::SimError;

// Simulation tick frequency
pub const LOOP_HZ: u64 = 30;

// Zenoh topics
pub const TOPIC_CMD_ROBOT: &str = "ev3sim/cmd/robot"; // control requests
pub const TOPIC_STATE_POSE: &str = "ev3sim/state/pose"; // pose per tick
pub const TOPIC_STATE_SENSORS: &str = "ev3sim/state/sensors"; // sensor snapshot per tick
pub const TOPIC_HEALTH: &str = "ev3sim/state/health"; // stuck / ok
pub const TOPIC_STATE_READING: &str = "ev3sim/state/reading"; // replies to read_sensor

// Control requests waiting for the worker
pub const REQUEST_QUEUE_CAPACITY: usize = 256;

// `run_forever` is approximated by running this long
pub const FOREVER_SECONDS: f64 = 45.0;

// Motor speed at 100% duty cycle, in degrees per second
pub const MAX_SPEED: f64 = 1050.0;

/// Simulation-wide settings shared by every robot part.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// Distance between the two drive wheels, in millimetres.
    pub wheel_spacing: f64,
    /// Drive wheel diameter, in millimetres.
    pub wheel_diameter: f64,
    /// Screen pixels per millimetre.
    pub scaling_multiplier: f64,
    pub frames_per_second: f64,
    /// Coast ramp length at full speed.
    pub coast_seconds: f64,
    /// Table size in millimetres; beyond it the robot falls.
    pub field_width: f64,
    pub field_height: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            wheel_spacing: 120.0,
            wheel_diameter: 56.0,
            scaling_multiplier: 0.6,
            frames_per_second: LOOP_HZ as f64,
            coast_seconds: 0.5,
            field_width: 2400.0,
            field_height: 1800.0,
        }
    }
}

impl SimSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Linear travel of a drive wheel per degree of rotation.
    pub fn mm_per_degree(&self) -> f64 {
        std::f64::consts::PI * self.wheel_diameter / 360.0
    }
}

/// Parsed robot description.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RobotConfig {
    pub name: Option<String>,
    #[serde(default)]
    pub center_x: f64,
    #[serde(default)]
    pub center_y: f64,
    /// Initial heading in degrees.
    #[serde(default)]
    pub orientation: f64,
    #[serde(default)]
    pub parts: Vec<PartConfig>,
}

impl RobotConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// One part record of the robot description.
///
/// `kind` stays a free string so that unknown part types can be skipped
/// instead of rejecting the whole file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub brick: u8,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub x_offset: f64,
    #[serde(default)]
    pub y_offset: f64,
    #[serde(default)]
    pub direction: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_robot_description() {
        let json = r#"{
            "name": "bot",
            "center_x": 100,
            "center_y": 50,
            "parts": [
                {"type": "motor", "brick": 0, "port": "ev3-ports:outA", "x_offset": -60},
                {"type": "ultrasonic_sensor", "port": "ev3-ports:in4", "direction": "bottom"}
            ]
        }"#;
        let cfg: RobotConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.name.as_deref(), Some("bot"));
        assert_eq!(cfg.orientation, 0.0);
        assert_eq!(cfg.parts.len(), 2);
        assert_eq!(cfg.parts[0].kind, "motor");
        assert_eq!(cfg.parts[0].x_offset, -60.0);
        assert_eq!(cfg.parts[1].direction.as_deref(), Some("bottom"));
    }

    #[test]
    fn test_partial_settings_fall_back_to_defaults() {
        let settings: SimSettings = serde_json::from_str(r#"{"wheel_spacing": 200}"#).unwrap();
        assert_eq!(settings.wheel_spacing, 200.0);
        assert_eq!(settings.wheel_diameter, SimSettings::default().wheel_diameter);
    }

    #[test]
    fn test_mm_per_degree() {
        let settings = SimSettings {
            wheel_diameter: 360.0 / std::f64::consts::PI,
            ..Default::default()
        };
        assert!((settings.mm_per_degree() - 1.0).abs() < 1e-9);
    }
}
