// Authoritative state of the simulated robot.
//
// RobotState owns the body pose and every part built from the robot
// description. The pose is only ever changed by deltas (`rotate` and
// `move_position`), including on reset.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::address::{ActuatorAddress, SensorAddress};
use super::handoff::SensorValues;
use super::parts::{Actuator, ActuatorKind, Brick, Device, LedColor, Sensor, SensorKind};
use super::pose::{Pose, Vec2};
use super::visual::{PartTransform, part_transform};
use super::world::World;
use crate::config::{PartConfig, RobotConfig, SimSettings};
use crate::error::{Result, SimError};
use crate::motor::kinematics::differential_steering;

/// Lateral distance of each brick LED from the brick centre.
const LED_SPACING: f64 = 10.0;

/// LED colours requested by the control side, applied once per tick.
#[derive(Clone, Default)]
pub struct LedColors {
    inner: Arc<Mutex<BTreeMap<ActuatorAddress, LedColor>>>,
}

impl LedColors {
    pub fn set(&self, address: ActuatorAddress, color: LedColor) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(address, color);
    }

    pub fn snapshot(&self) -> Vec<(ActuatorAddress, LedColor)> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(address, color)| (address.clone(), *color))
            .collect()
    }
}

pub struct RobotState {
    name: String,
    wheel_spacing: f64,
    scale: f64,
    origin: Pose,
    pose: Pose,
    actuators: BTreeMap<ActuatorAddress, Actuator>,
    sensors: BTreeMap<SensorAddress, Sensor>,
    bricks: Vec<Brick>,
    values: SensorValues,
    led_colors: LedColors,
    sounds: BTreeMap<ActuatorAddress, Option<String>>,
    is_stuck: bool,
    visuals: Vec<PartTransform>,
}

impl RobotState {
    /// Build the robot from its description.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::MissingField`] when the description has no name.
    pub fn new(config: &RobotConfig, settings: &SimSettings) -> Result<Self> {
        let name = config
            .name
            .clone()
            .ok_or(SimError::MissingField("name"))?;

        let origin = Pose::new(
            config.center_x,
            config.center_y,
            config.orientation.to_radians(),
        );

        let mut robot = Self {
            name,
            wheel_spacing: settings.wheel_spacing,
            scale: settings.scaling_multiplier,
            origin,
            pose: origin,
            actuators: BTreeMap::new(),
            sensors: BTreeMap::new(),
            bricks: Vec::new(),
            values: SensorValues::default(),
            led_colors: LedColors::default(),
            sounds: BTreeMap::new(),
            is_stuck: false,
            visuals: Vec::new(),
        };

        for part in &config.parts {
            robot.add_part(part);
        }

        // seed the cache so the first reads see sensible defaults
        for (address, sensor) in &robot.sensors {
            robot.values.set(address.clone(), sensor.default_value());
        }
        robot.sync_visuals();

        info!(
            "Robot '{}' built: {} actuators, {} sensors, {} bricks",
            robot.name,
            robot.actuators.len(),
            robot.sensors.len(),
            robot.bricks.len()
        );
        Ok(robot)
    }

    fn add_part(&mut self, part: &PartConfig) {
        let offset = Vec2::new(part.x_offset, part.y_offset);
        let address = ActuatorAddress::new(part.brick, part.port.clone());

        match part.kind.as_str() {
            "brick" => {
                for (port, side) in [("led0", -1.0), ("led1", 1.0)] {
                    let led = ActuatorAddress::new(part.brick, port);
                    self.led_colors.set(led.clone(), LedColor::default());
                    self.add_actuator(Actuator::new(
                        led,
                        offset + Vec2::new(side * LED_SPACING, 0.0),
                        Device::Led {
                            color: LedColor::default(),
                        },
                    ));
                }
                self.add_actuator(Actuator::new(
                    ActuatorAddress::new(part.brick, "speaker"),
                    offset,
                    Device::Speaker { playing: None },
                ));
                self.bricks.push(Brick {
                    id: part.brick,
                    offset,
                });
            }
            "motor" => self.add_actuator(Actuator::new(address, offset, Device::DriveMotor)),
            "arm" => self.add_actuator(Actuator::new(
                address,
                offset,
                Device::ArmMotor { angle_degrees: 0.0 },
            )),
            "color_sensor" => self.add_sensor(Sensor::new(address, offset, SensorKind::Color)),
            "touch_sensor" => self.add_sensor(Sensor::new(address, offset, SensorKind::Touch)),
            "ultrasonic_sensor" => match part.direction.as_deref().unwrap_or("forward") {
                "forward" => {
                    self.add_sensor(Sensor::new(address, offset, SensorKind::UltrasonicTop))
                }
                "bottom" => {
                    self.add_sensor(Sensor::new(address, offset, SensorKind::UltrasonicBottom))
                }
                other => warn!(
                    "Unknown ultrasonic direction '{}' for {}, skipping part",
                    other, address
                ),
            },
            other => warn!("Unknown robot part type '{}' in config, skipping", other),
        }
    }

    fn add_actuator(&mut self, actuator: Actuator) {
        debug!("Adding {} at {}", actuator.kind().name(), actuator.address);
        if self
            .actuators
            .insert(actuator.address.clone(), actuator)
            .is_some()
        {
            warn!("Duplicate actuator address in config, keeping the last one");
        }
    }

    fn add_sensor(&mut self, sensor: Sensor) {
        debug!("Adding {:?} sensor at {}", sensor.kind, sensor.address);
        if self.sensors.insert(sensor.address.clone(), sensor).is_some() {
            warn!("Duplicate sensor address in config, keeping the last one");
        }
    }

    fn move_position(&mut self, delta: Vec2) {
        self.pose.position = self.pose.position + delta;
    }

    fn rotate(&mut self, radians: f64) {
        self.pose.angle += radians;
    }

    /// Move the body by one tick of differential steering.
    ///
    /// An absent side counts as a wheel that did not move.
    pub fn execute_movement(&mut self, left: Option<f64>, right: Option<f64>) {
        let dl = left.unwrap_or(0.0);
        let dr = right.unwrap_or(0.0);

        let delta = differential_steering(self.wheel_spacing, dl, dr, self.pose.heading());
        self.rotate(delta.angle);
        self.move_position(Vec2::new(delta.dx, delta.dy));
    }

    /// Rotate the arm at `address` by `degrees`.
    pub fn execute_arm_movement(&mut self, address: &ActuatorAddress, degrees: f64) -> Result<()> {
        match &mut self.actuator_mut(address)?.device {
            Device::ArmMotor { angle_degrees } => {
                *angle_degrees += degrees;
                Ok(())
            }
            other => Err(wrong_kind(address, ActuatorKind::ArmMotor, other)),
        }
    }

    /// Show `color` on the LED at `address` right away.
    pub fn set_led_color(&mut self, address: &ActuatorAddress, color: LedColor) -> Result<()> {
        match &mut self.actuator_mut(address)?.device {
            Device::Led { color: current } => {
                *current = color;
                Ok(())
            }
            other => Err(wrong_kind(address, ActuatorKind::Led, other)),
        }
    }

    /// Push every requested LED colour to its LED.
    pub fn apply_led_colors(&mut self) -> Result<()> {
        for (address, color) in self.led_colors.snapshot() {
            self.set_led_color(&address, color)?;
        }
        Ok(())
    }

    /// Record what the speaker at `address` plays this tick.
    pub fn set_sound(&mut self, address: &ActuatorAddress, sound: Option<String>) -> Result<()> {
        match &mut self.actuator_mut(address)?.device {
            Device::Speaker { playing } => playing.clone_from(&sound),
            other => return Err(wrong_kind(address, ActuatorKind::Speaker, other)),
        }
        self.sounds.insert(address.clone(), sound);
        Ok(())
    }

    /// Sample every sensor against the world into the shared cache.
    pub fn refresh_sensors(&self, world: &dyn World) {
        for (address, sensor) in &self.sensors {
            self.values.set(address.clone(), sensor.read(&self.pose, world));
        }
    }

    /// True when any drive wheel has no floor under it.
    pub fn check_fall(&self, world: &dyn World) -> bool {
        self.wheels().any(|wheel| wheel.is_falling(&self.pose, world))
    }

    /// Clear cached sensor values and move back to the configured pose.
    pub fn reset(&mut self) {
        self.values.clear();
        self.move_position(self.origin.position - self.pose.position);
        self.rotate(self.origin.angle - self.pose.angle);
        info!("Robot '{}' reset to its starting pose", self.name);
    }

    /// Recompute every part's screen transform from the body pose.
    pub fn sync_visuals(&mut self) {
        let pose = self.pose;
        let scale = self.scale;

        let actuators = self
            .actuators
            .values()
            .map(|a| part_transform(a.address.to_string(), a.offset, &pose, scale));
        let bricks = self
            .bricks
            .iter()
            .map(|b| part_transform(format!("brick {}", b.id), b.offset, &pose, scale));
        let sensors = self
            .sensors
            .values()
            .map(|s| part_transform(s.address.to_string(), s.offset, &pose, scale));

        self.visuals = actuators.chain(bricks).chain(sensors).collect();
    }

    fn actuator_mut(&mut self, address: &ActuatorAddress) -> Result<&mut Actuator> {
        self.actuators
            .get_mut(address)
            .ok_or_else(|| SimError::UnknownActuator(address.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn is_stuck(&self) -> bool {
        self.is_stuck
    }

    pub fn set_stuck(&mut self, stuck: bool) {
        self.is_stuck = stuck;
    }

    pub fn actuator(&self, address: &ActuatorAddress) -> Option<&Actuator> {
        self.actuators.get(address)
    }

    pub fn actuators(&self) -> impl Iterator<Item = &Actuator> {
        self.actuators.values()
    }

    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.values()
    }

    pub fn wheels(&self) -> impl Iterator<Item = &Actuator> {
        self.actuators
            .values()
            .filter(|a| a.kind() == ActuatorKind::DriveMotor)
    }

    pub fn values(&self) -> &SensorValues {
        &self.values
    }

    pub fn led_colors(&self) -> &LedColors {
        &self.led_colors
    }

    pub fn sound(&self, address: &ActuatorAddress) -> Option<&str> {
        self.sounds.get(address).and_then(|s| s.as_deref())
    }

    pub fn visuals(&self) -> &[PartTransform] {
        &self.visuals
    }
}

fn wrong_kind(address: &ActuatorAddress, expected: ActuatorKind, actual: &Device) -> SimError {
    SimError::WrongActuatorKind {
        address: address.clone(),
        expected: expected.name(),
        actual: actual.kind().name(),
    }
}
