// Tick orchestrator and the control-side handle
//
// RobotSimulator is owned by the thread that advances the simulation. Only it
// drains queues, changes the pose and refreshes sensor values. ControlHandle
// is a cloneable view for control threads: it drives the motors, sets LEDs,
// requests resets and blocks on sensor reads until the next tick hands off
// fresh values.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, trace, warn};

use super::address::{ActuatorAddress, SensorAddress};
use super::handoff::{SensorHandoff, SensorValues};
use super::parts::{ActuatorKind, LedColor, SensorValue};
use super::queue::{ActuatorQueues, Job};
use super::robot::{LedColors, RobotState};
use super::world::World;
use crate::config::{RobotConfig, SimSettings};
use crate::error::{Result, SimError};
use crate::motor::{CommandProcessor, MotorConnector, max_frames};

/// Everything the control side and the tick share.
struct Shared {
    settings: SimSettings,
    kinds: BTreeMap<ActuatorAddress, ActuatorKind>,
    queues: Arc<ActuatorQueues>,
    // one connector per motor, so recorded fields are shared by every caller
    motors: BTreeMap<ActuatorAddress, Mutex<MotorConnector<CommandProcessor>>>,
    handoff: SensorHandoff,
    values: SensorValues,
    led_colors: LedColors,
    should_reset: AtomicBool,
}

pub struct RobotSimulator {
    robot: RobotState,
    world: Box<dyn World>,
    /// Drive motors split into sides once, by the sign of their lateral offset.
    left_wheels: BTreeMap<ActuatorAddress, bool>,
    shared: Arc<Shared>,
}

impl RobotSimulator {
    pub fn new(config: &RobotConfig, settings: &SimSettings, world: Box<dyn World>) -> Result<Self> {
        let robot = RobotState::new(config, settings)?;

        let kinds: BTreeMap<_, _> = robot
            .actuators()
            .map(|a| (a.address.clone(), a.kind()))
            .collect();
        let left_wheels = robot
            .wheels()
            .map(|w| (w.address.clone(), w.is_left_wheel()))
            .collect();
        let queues = ActuatorQueues::new(
            kinds
                .iter()
                .filter(|(_, kind)| kind.is_queued())
                .map(|(address, _)| address.clone()),
        );
        let queues = Arc::new(queues);
        let motors = kinds
            .iter()
            .filter_map(|(address, kind)| {
                let units_per_degree = match kind {
                    ActuatorKind::DriveMotor => settings.mm_per_degree(),
                    ActuatorKind::ArmMotor => 1.0,
                    _ => return None,
                };
                let processor = CommandProcessor::new(
                    Arc::clone(&queues),
                    address.clone(),
                    units_per_degree,
                    settings,
                );
                Some((address.clone(), Mutex::new(MotorConnector::new(processor))))
            })
            .collect();
        let handoff = SensorHandoff::new(robot.sensors().map(|s| s.address.clone()));

        let shared = Arc::new(Shared {
            settings: settings.clone(),
            kinds,
            queues,
            motors,
            handoff,
            values: robot.values().clone(),
            led_colors: robot.led_colors().clone(),
            should_reset: AtomicBool::new(false),
        });

        Ok(Self {
            robot,
            world,
            left_wheels,
            shared,
        })
    }

    /// A handle for the control side.
    pub fn control(&self) -> ControlHandle {
        ControlHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Advance the simulation by one tick.
    pub fn update(&mut self) -> Result<()> {
        let result = if self.shared.should_reset.load(Ordering::Acquire) {
            self.reset();
            Ok(())
        } else {
            self.step()
        };

        // hand fresh values to readers whatever happened above
        self.shared.handoff.release_all();
        result
    }

    fn step(&mut self) -> Result<()> {
        self.process_actuators()?;
        self.robot.apply_led_colors()?;
        self.robot.refresh_sensors(self.world.as_ref());

        let stuck = self.robot.check_fall(self.world.as_ref());
        if stuck != self.robot.is_stuck() {
            if stuck {
                warn!("Robot '{}' is stuck or falling", self.robot.name());
            } else {
                info!("Robot '{}' is back on the floor", self.robot.name());
            }
        }
        self.robot.set_stuck(stuck);

        self.robot.sync_visuals();
        Ok(())
    }

    fn reset(&mut self) {
        debug!("Reset tick");
        self.shared.queues.clear_all();
        self.robot.reset();
        self.shared.should_reset.store(false, Ordering::Release);
    }

    /// Drain one job per actuator and apply them.
    ///
    /// When two drive motors sit on the same side, the later one in address
    /// order wins.
    fn process_actuators(&mut self) -> Result<()> {
        let mut left = None;
        let mut right = None;

        for (address, job) in self.shared.queues.drain_all() {
            match self.shared.kinds.get(&address) {
                Some(ActuatorKind::ArmMotor) => {
                    if let Some(amount) = job.as_ref().and_then(Job::as_move) {
                        self.robot.execute_arm_movement(&address, amount)?;
                    }
                }
                Some(ActuatorKind::DriveMotor) => {
                    let amount = job.as_ref().and_then(Job::as_move);
                    if self.left_wheels.get(&address).copied().unwrap_or(false) {
                        left = amount;
                    } else {
                        right = amount;
                    }
                }
                Some(ActuatorKind::Speaker) => {
                    let sound = match job {
                        Some(Job::Sound(message)) => Some(message),
                        _ => None,
                    };
                    self.robot.set_sound(&address, sound)?;
                }
                Some(ActuatorKind::Led) | None => {
                    trace!("Ignoring job for {}", address);
                }
            }
        }

        if left.is_some() || right.is_some() {
            self.robot.execute_movement(left, right);
        }
        Ok(())
    }

    pub fn robot(&self) -> &RobotState {
        &self.robot
    }

    pub fn is_stuck(&self) -> bool {
        self.robot.is_stuck()
    }
}

/// Control-side access to a running simulator.
#[derive(Clone)]
pub struct ControlHandle {
    shared: Arc<Shared>,
}

impl ControlHandle {
    fn kind(&self, address: &ActuatorAddress) -> Result<ActuatorKind> {
        self.shared
            .kinds
            .get(address)
            .copied()
            .ok_or_else(|| SimError::UnknownActuator(address.clone()))
    }

    fn expect_kind(&self, address: &ActuatorAddress, expected: ActuatorKind) -> Result<()> {
        let actual = self.kind(address)?;
        if actual != expected {
            return Err(SimError::WrongActuatorKind {
                address: address.clone(),
                expected: expected.name(),
                actual: actual.name(),
            });
        }
        Ok(())
    }

    /// Motor API for the drive or arm motor at `address`.
    ///
    /// Every handle gets the same connector, so fields recorded through one
    /// are seen by the others. The connector stays locked while the guard
    /// lives.
    pub fn motor(
        &self,
        address: &ActuatorAddress,
    ) -> Result<MutexGuard<'_, MotorConnector<CommandProcessor>>> {
        match self.shared.motors.get(address) {
            Some(motor) => Ok(motor.lock().unwrap_or_else(|e| e.into_inner())),
            None => Err(SimError::WrongActuatorKind {
                address: address.clone(),
                expected: "motor",
                actual: self.kind(address)?.name(),
            }),
        }
    }

    /// Queue a raw job for the actuator at `address`.
    pub fn put_actuator_job(&self, address: &ActuatorAddress, job: Job) -> Result<()> {
        self.shared.queues.enqueue(address, job)
    }

    /// Request an LED colour; the latest request before a tick wins.
    pub fn set_led_color(&self, address: &ActuatorAddress, color: LedColor) -> Result<()> {
        self.expect_kind(address, ActuatorKind::Led)?;
        self.shared.led_colors.set(address.clone(), color);
        Ok(())
    }

    /// Play `message` on a speaker for `seconds`, capped like a motor run.
    /// Returns the duration.
    pub fn play_sound(&self, address: &ActuatorAddress, message: &str, seconds: f64) -> Result<f64> {
        self.expect_kind(address, ActuatorKind::Speaker)?;
        if !seconds.is_finite() {
            return Err(SimError::InvalidCommand {
                address: address.clone(),
                reason: format!("sound length {} is not finite", seconds),
            });
        }
        let fps = self.shared.settings.frames_per_second;
        let frames = ((seconds * fps).round().max(1.0) as usize).min(max_frames(fps));
        self.shared.queues.enqueue_all(
            address,
            std::iter::repeat_n(Job::Sound(message.to_string()), frames),
        )?;
        Ok(frames as f64 / fps)
    }

    /// Ask the simulator to reset on its next tick.
    pub fn request_reset(&self) {
        self.shared.should_reset.store(true, Ordering::Release);
    }

    /// Read a sensor, waiting for the next tick if this sensor was already
    /// read since the last one.
    ///
    /// Returns `None` when a reset cleared the cached values and no normal
    /// tick has refreshed them yet.
    pub fn get_value(&self, address: &SensorAddress) -> Result<Option<SensorValue>> {
        self.shared.handoff.wait(address)?;
        Ok(self.shared.values.get(address))
    }

    /// Jobs still pending for an actuator.
    pub fn pending_jobs(&self, address: &ActuatorAddress) -> Result<usize> {
        self.shared.queues.pending(address)
    }

    /// Every cached sensor value, without waiting.
    pub fn sensor_snapshot(&self) -> Vec<(SensorAddress, SensorValue)> {
        self.shared.values.snapshot()
    }
}
