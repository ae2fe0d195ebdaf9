// Robot parts: the closed set of actuator and sensor variants

use serde::{Deserialize, Serialize};

use super::address::{ActuatorAddress, SensorAddress};
use super::pose::{Pose, Vec2};
use super::world::{COLOR_NONE, World};

/// Ultrasonic readings are capped at the EV3 sensor range.
pub const ULTRASONIC_MAX_MM: f64 = 2550.0;

/// Height of the bottom-facing ultrasonic sensor above the floor.
pub const ULTRASONIC_BOTTOM_FLOOR_MM: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorKind {
    DriveMotor,
    ArmMotor,
    Speaker,
    Led,
}

impl ActuatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActuatorKind::DriveMotor => "drive motor",
            ActuatorKind::ArmMotor => "arm motor",
            ActuatorKind::Speaker => "speaker",
            ActuatorKind::Led => "LED",
        }
    }

    /// Kinds that receive per-tick jobs through an actuator queue.
    pub fn is_queued(&self) -> bool {
        !matches!(self, ActuatorKind::Led)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    Black,
    #[default]
    Green,
    Red,
    Amber,
    Orange,
    Yellow,
}

/// Per-variant state of an actuator.
#[derive(Debug, Clone, PartialEq)]
pub enum Device {
    DriveMotor,
    ArmMotor { angle_degrees: f64 },
    Speaker { playing: Option<String> },
    Led { color: LedColor },
}

impl Device {
    pub fn kind(&self) -> ActuatorKind {
        match self {
            Device::DriveMotor => ActuatorKind::DriveMotor,
            Device::ArmMotor { .. } => ActuatorKind::ArmMotor,
            Device::Speaker { .. } => ActuatorKind::Speaker,
            Device::Led { .. } => ActuatorKind::Led,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Actuator {
    pub address: ActuatorAddress,
    /// Mounting point in the body frame.
    pub offset: Vec2,
    pub device: Device,
}

impl Actuator {
    pub fn new(address: ActuatorAddress, offset: Vec2, device: Device) -> Self {
        Self {
            address,
            offset,
            device,
        }
    }

    pub fn kind(&self) -> ActuatorKind {
        self.device.kind()
    }

    /// Drive wheels on the negative lateral side are the left wheel.
    pub fn is_left_wheel(&self) -> bool {
        self.offset.x < 0.0
    }

    /// A wheel is falling when there is no floor under its contact point.
    pub fn is_falling(&self, pose: &Pose, world: &dyn World) -> bool {
        matches!(self.device, Device::DriveMotor) && !world.is_floor(pose.to_world(self.offset))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Color,
    Touch,
    UltrasonicTop,
    UltrasonicBottom,
}

/// Last known reading of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SensorValue {
    Color(u8),
    Touch(bool),
    /// Millimetres.
    Distance(f64),
}

#[derive(Debug, Clone)]
pub struct Sensor {
    pub address: SensorAddress,
    pub offset: Vec2,
    pub kind: SensorKind,
}

impl Sensor {
    pub fn new(address: SensorAddress, offset: Vec2, kind: SensorKind) -> Self {
        Self {
            address,
            offset,
            kind,
        }
    }

    pub fn default_value(&self) -> SensorValue {
        match self.kind {
            SensorKind::Color => SensorValue::Color(COLOR_NONE),
            SensorKind::Touch => SensorValue::Touch(false),
            SensorKind::UltrasonicTop => SensorValue::Distance(ULTRASONIC_MAX_MM),
            SensorKind::UltrasonicBottom => SensorValue::Distance(ULTRASONIC_BOTTOM_FLOOR_MM),
        }
    }

    /// Sample the world at the sensor's current world position.
    pub fn read(&self, pose: &Pose, world: &dyn World) -> SensorValue {
        let at = pose.to_world(self.offset);
        match self.kind {
            SensorKind::Color => SensorValue::Color(world.color_at(at)),
            SensorKind::Touch => SensorValue::Touch(world.is_touching(at)),
            SensorKind::UltrasonicTop => {
                let distance = world
                    .distance_ahead(at, pose.heading())
                    .map_or(ULTRASONIC_MAX_MM, |d| d.min(ULTRASONIC_MAX_MM));
                SensorValue::Distance(distance)
            }
            SensorKind::UltrasonicBottom => {
                if world.is_floor(at) {
                    SensorValue::Distance(ULTRASONIC_BOTTOM_FLOOR_MM)
                } else {
                    SensorValue::Distance(ULTRASONIC_MAX_MM)
                }
            }
        }
    }
}

/// The EV3 brick itself: carries two LEDs and a speaker.
#[derive(Debug, Clone)]
pub struct Brick {
    pub id: u8,
    pub offset: Vec2,
}
