// Motor commands and their expansion into per-tick jobs

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{FOREVER_SECONDS, MAX_SPEED, SimSettings};
use crate::error::{Result, SimError};
use crate::sim::{ActuatorAddress, ActuatorQueues, Job};

/// What a motor does once its run completes or it is told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopAction {
    /// Brake immediately.
    Hold,
    /// Spin down gradually.
    Coast,
}

impl FromStr for StopAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "hold" | "brake" => Ok(StopAction::Hold),
            "coast" => Ok(StopAction::Coast),
            other => Err(format!("unknown stop action '{}'", other)),
        }
    }
}

/// A fully derived motor command. Speeds are degrees per second and
/// distances degrees of motor rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotorCommand {
    Drive {
        speed: f64,
        distance: f64,
        stop_action: Option<StopAction>,
    },
    Stop {
        speed: f64,
        stop_action: Option<StopAction>,
    },
}

impl MotorCommand {
    /// Number of ticks the command keeps the actuator busy.
    pub fn estimated_frames(&self, fps: f64, coast_seconds: f64) -> usize {
        match *self {
            MotorCommand::Drive {
                speed,
                distance,
                stop_action,
            } => {
                let coast = match stop_action {
                    Some(StopAction::Coast) => coast_frames(speed, fps, coast_seconds),
                    _ => 0,
                };
                frames_required(speed, distance, fps) + coast
            }
            MotorCommand::Stop {
                speed,
                stop_action: Some(StopAction::Coast),
            } => coast_frames(speed, fps, coast_seconds),
            MotorCommand::Stop { .. } => 0,
        }
    }

    /// Seconds the command keeps the actuator busy.
    pub fn estimated_duration(&self, fps: f64, coast_seconds: f64) -> f64 {
        self.estimated_frames(fps, coast_seconds) as f64 / fps
    }
}

/// Most ticks a single run or sound may occupy.
pub fn max_frames(fps: f64) -> usize {
    (FOREVER_SECONDS * fps).round() as usize
}

/// Ticks needed to cover `distance` at `speed`, before the ceiling.
fn exact_frames(speed: f64, distance: f64, fps: f64) -> f64 {
    ((distance.abs() / speed.abs()) * fps).round().max(1.0)
}

/// Ticks needed to cover `distance` at `speed`; at least one, at most
/// [`max_frames`].
pub fn frames_required(speed: f64, distance: f64, fps: f64) -> usize {
    if speed == 0.0 || distance == 0.0 {
        return 0;
    }
    (exact_frames(speed, distance, fps) as usize).min(max_frames(fps))
}

/// Length of the coast ramp, proportional to speed.
pub fn coast_frames(speed: f64, fps: f64, coast_seconds: f64) -> usize {
    let ratio = (speed.abs() / MAX_SPEED).min(1.0);
    (coast_seconds * ratio * fps).round() as usize
}

/// Linearly decaying jobs starting just below `step`.
fn coast_ramp(step: f64, frames: usize) -> impl Iterator<Item = Job> {
    let n = frames as f64;
    (0..frames).map(move |i| Job::Move(step * (n - i as f64) / (n + 1.0)))
}

/// Receives the single command a motor run or stop produces, and returns
/// its estimated duration in seconds.
pub trait CommandSink {
    fn submit(&self, command: MotorCommand) -> Result<f64>;
}

/// Turns commands for one motor into jobs on its actuator queue.
#[derive(Clone)]
pub struct CommandProcessor {
    queues: Arc<ActuatorQueues>,
    address: ActuatorAddress,
    /// Job units per degree of motor rotation: millimetres of wheel travel
    /// for drive motors, 1.0 for arms.
    units_per_degree: f64,
    fps: f64,
    coast_seconds: f64,
}

impl CommandProcessor {
    pub fn new(
        queues: Arc<ActuatorQueues>,
        address: ActuatorAddress,
        units_per_degree: f64,
        settings: &SimSettings,
    ) -> Self {
        Self {
            queues,
            address,
            units_per_degree,
            fps: settings.frames_per_second,
            coast_seconds: settings.coast_seconds,
        }
    }

    pub fn address(&self) -> &ActuatorAddress {
        &self.address
    }

    /// Travel of one tick at `speed`, in job units.
    fn step(&self, speed: f64) -> f64 {
        speed / self.fps * self.units_per_degree
    }

    fn drive_jobs(&self, speed: f64, distance: f64, stop_action: Option<StopAction>) -> Vec<Job> {
        let frames = frames_required(speed, distance, self.fps);
        if frames == 0 {
            return Vec::new();
        }
        // a run longer than the ceiling is cut short, not sped up
        let per_frame =
            distance * self.units_per_degree / exact_frames(speed, distance, self.fps);
        let mut jobs: Vec<Job> = std::iter::repeat_n(Job::Move(per_frame), frames).collect();

        if stop_action == Some(StopAction::Coast) {
            // direction follows the distance, magnitude the speed
            let step = self.step(speed.abs()).copysign(distance);
            jobs.extend(coast_ramp(step, coast_frames(speed, self.fps, self.coast_seconds)));
        }
        jobs
    }
}

impl CommandSink for CommandProcessor {
    fn submit(&self, command: MotorCommand) -> Result<f64> {
        debug!("Motor {} command: {:?}", self.address, command);
        let finite = match command {
            MotorCommand::Drive {
                speed, distance, ..
            } => speed.is_finite() && distance.is_finite(),
            MotorCommand::Stop { speed, .. } => speed.is_finite(),
        };
        if !finite {
            return Err(SimError::InvalidCommand {
                address: self.address.clone(),
                reason: format!("non-finite value in {:?}", command),
            });
        }

        match command {
            MotorCommand::Drive {
                speed,
                distance,
                stop_action,
            } => {
                let jobs = self.drive_jobs(speed, distance, stop_action);
                self.queues.enqueue_all(&self.address, jobs)?;
            }
            MotorCommand::Stop { speed, stop_action } => {
                self.queues.clear(&self.address)?;
                if stop_action == Some(StopAction::Coast) {
                    let frames = coast_frames(speed, self.fps, self.coast_seconds);
                    self.queues
                        .enqueue_all(&self.address, coast_ramp(self.step(speed), frames))?;
                }
            }
        }
        Ok(command.estimated_duration(self.fps, self.coast_seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn settings() -> SimSettings {
        SimSettings {
            frames_per_second: 30.0,
            coast_seconds: 0.5,
            ..Default::default()
        }
    }

    fn processor(units_per_degree: f64) -> (Arc<ActuatorQueues>, CommandProcessor) {
        let address = ActuatorAddress::new(0, "outA");
        let queues = Arc::new(ActuatorQueues::new([address.clone()]));
        let processor =
            CommandProcessor::new(Arc::clone(&queues), address, units_per_degree, &settings());
        (queues, processor)
    }

    fn drain_moves(queues: &ActuatorQueues) -> Vec<f64> {
        std::iter::from_fn(|| queues.drain_all()[0].1.clone())
            .filter_map(|job| job.as_move())
            .collect()
    }

    #[test]
    fn test_stop_action_parse() {
        assert_eq!("hold".parse::<StopAction>(), Ok(StopAction::Hold));
        assert_eq!("coast".parse::<StopAction>(), Ok(StopAction::Coast));
        assert!("spin".parse::<StopAction>().is_err());
    }

    #[test]
    fn test_drive_spreads_distance_over_frames() {
        let (queues, processor) = processor(1.0);
        let duration = processor
            .submit(MotorCommand::Drive {
                speed: 90.0,
                distance: 180.0,
                stop_action: Some(StopAction::Hold),
            })
            .unwrap();

        // 2 seconds at 30 fps
        assert!((duration - 2.0).abs() < EPS);
        let moves = drain_moves(&queues);
        assert_eq!(moves.len(), 60);
        assert!((moves.iter().sum::<f64>() - 180.0).abs() < 1e-6);
        assert!(moves.iter().all(|m| (m - 3.0).abs() < EPS));
    }

    #[test]
    fn test_negative_distance_drives_backwards() {
        let (queues, processor) = processor(2.0);
        processor
            .submit(MotorCommand::Drive {
                speed: 300.0,
                distance: -30.0,
                stop_action: None,
            })
            .unwrap();
        let moves = drain_moves(&queues);
        assert_eq!(moves.len(), 3);
        assert!((moves.iter().sum::<f64>() + 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_coast_appends_decaying_ramp() {
        let (queues, processor) = processor(1.0);
        let duration = processor
            .submit(MotorCommand::Drive {
                speed: MAX_SPEED,
                distance: MAX_SPEED,
                stop_action: Some(StopAction::Coast),
            })
            .unwrap();

        // 30 drive frames + 15 coast frames
        assert!((duration - 1.5).abs() < EPS);
        let moves = drain_moves(&queues);
        assert_eq!(moves.len(), 45);
        let ramp = &moves[30..];
        assert!(ramp.windows(2).all(|w| w[1] < w[0]));
        assert!(ramp[0] < moves[29]);
        assert!(ramp.iter().all(|&m| m > 0.0));
    }

    #[test]
    fn test_stop_hold_clears_pending_jobs() {
        let (queues, processor) = processor(1.0);
        processor
            .submit(MotorCommand::Drive {
                speed: 100.0,
                distance: 1000.0,
                stop_action: None,
            })
            .unwrap();
        assert!(queues.pending(processor.address()).unwrap() > 0);

        let duration = processor
            .submit(MotorCommand::Stop {
                speed: 100.0,
                stop_action: Some(StopAction::Hold),
            })
            .unwrap();
        assert_eq!(duration, 0.0);
        assert_eq!(queues.pending(processor.address()).unwrap(), 0);
    }

    #[test]
    fn test_stop_coast_follows_speed_sign() {
        let (queues, processor) = processor(1.0);
        let duration = processor
            .submit(MotorCommand::Stop {
                speed: -MAX_SPEED,
                stop_action: Some(StopAction::Coast),
            })
            .unwrap();
        assert!((duration - 0.5).abs() < EPS);
        let moves = drain_moves(&queues);
        assert_eq!(moves.len(), 15);
        assert!(moves.iter().all(|&m| m < 0.0));
    }

    #[test]
    fn test_slow_run_is_capped() {
        let (queues, processor) = processor(1.0);
        let duration = processor
            .submit(MotorCommand::Drive {
                speed: 1e-9,
                distance: 1000.0,
                stop_action: None,
            })
            .unwrap();

        assert!((duration - FOREVER_SECONDS).abs() < EPS);
        assert_eq!(queues.pending(processor.address()).unwrap(), max_frames(30.0));
        // each tick still moves at the requested speed
        let moves = drain_moves(&queues);
        assert!(moves.iter().all(|&m| m > 0.0 && m < 1e-6));
    }

    #[test]
    fn test_non_finite_command_is_rejected() {
        let (queues, processor) = processor(1.0);
        let result = processor.submit(MotorCommand::Drive {
            speed: f64::MAX,
            distance: f64::INFINITY,
            stop_action: None,
        });
        assert!(matches!(result, Err(SimError::InvalidCommand { .. })));
        assert!(
            processor
                .submit(MotorCommand::Stop {
                    speed: f64::NAN,
                    stop_action: Some(StopAction::Coast),
                })
                .is_err()
        );
        assert_eq!(queues.pending(processor.address()).unwrap(), 0);
    }

    #[test]
    fn test_frames_required() {
        assert_eq!(frames_required(0.0, 10.0, 30.0), 0);
        assert_eq!(frames_required(10.0, 0.0, 30.0), 0);
        // tiny moves still take one tick
        assert_eq!(frames_required(1000.0, 0.1, 30.0), 1);
        assert_eq!(frames_required(-90.0, 180.0, 30.0), 60);
        assert_eq!(frames_required(1e-9, 1000.0, 30.0), 1350);
    }
}
