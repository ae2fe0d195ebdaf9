// ev3 style motor API on top of a command sink
//
// Setters only record fields. Each run_* derives the missing distance (and
// for run_direct the speed) from what is recorded, then hands one command to
// the sink. Recorded fields are never cleared by running. A run whose own
// input field was never set has no effect.

use tracing::trace;

use super::command::{CommandSink, MotorCommand, StopAction};
use crate::config::{FOREVER_SECONDS, MAX_SPEED};
use crate::error::Result;

pub struct MotorConnector<S> {
    sink: S,
    duty_cycle: Option<i32>,
    speed: Option<f64>,
    distance: Option<f64>,
    time: Option<u64>,
    stop_action: Option<StopAction>,
}

impl<S: CommandSink> MotorConnector<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            duty_cycle: None,
            speed: None,
            distance: None,
            time: None,
            stop_action: None,
        }
    }

    /// Power in percent, -100 (full reverse) to 100 (full forward).
    pub fn set_duty_cycle(&mut self, duty_cycle: i32) {
        self.duty_cycle = Some(duty_cycle);
    }

    /// Degrees per second.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = Some(speed);
    }

    /// Degrees of rotation.
    pub fn set_distance(&mut self, distance: f64) {
        self.distance = Some(distance);
    }

    /// Milliseconds.
    pub fn set_time(&mut self, time_ms: u64) {
        self.time = Some(time_ms);
    }

    pub fn set_stop_action(&mut self, action: StopAction) {
        self.stop_action = Some(action);
    }

    /// Run "forever", approximated as [`FOREVER_SECONDS`] at the set speed.
    pub fn run_forever(&mut self) -> Result<f64> {
        let Some(speed) = self.speed else {
            return Ok(0.0);
        };
        self.distance = Some(speed * FOREVER_SECONDS);
        self.run()
    }

    /// Run for the distance already set.
    pub fn run_to_rel_pos(&mut self) -> Result<f64> {
        self.run()
    }

    /// Run at the set speed for the set time.
    pub fn run_timed(&mut self) -> Result<f64> {
        let (Some(speed), Some(time)) = (self.speed, self.time) else {
            trace!("run_timed without speed and time has no effect");
            return Ok(0.0);
        };
        self.distance = Some(speed * (time as f64 / 1000.0));
        self.run()
    }

    /// Run at the speed implied by the duty cycle.
    pub fn run_direct(&mut self) -> Result<f64> {
        let Some(duty_cycle) = self.duty_cycle else {
            trace!("run_direct without duty cycle has no effect");
            return Ok(0.0);
        };
        let speed = duty_cycle as f64 / 100.0 * MAX_SPEED;
        self.speed = Some(speed);
        self.distance = Some(speed * FOREVER_SECONDS);
        self.run()
    }

    fn run(&mut self) -> Result<f64> {
        let speed = self.speed.unwrap_or(0.0);
        let distance = self.distance.unwrap_or(0.0);
        if speed == 0.0 || distance == 0.0 {
            trace!("Run with speed {} and distance {} has no effect", speed, distance);
            return Ok(0.0);
        }

        self.sink.submit(MotorCommand::Drive {
            speed,
            distance,
            stop_action: self.stop_action,
        })
    }

    /// Stop using the recorded stop action.
    ///
    /// A motor that last ran backwards (negative distance) stops with the
    /// speed negated so a coast continues in the same direction.
    pub fn stop(&mut self) -> Result<f64> {
        let mut speed = self.speed.unwrap_or(0.0);
        let distance = self.distance.unwrap_or(0.0);
        if speed == 0.0 {
            return Ok(0.0);
        }
        if distance < 0.0 {
            speed = -speed;
        }

        self.sink.submit(MotorCommand::Stop {
            speed,
            stop_action: self.stop_action,
        })
    }

    pub fn speed(&self) -> Option<f64> {
        self.speed
    }

    pub fn distance(&self) -> Option<f64> {
        self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records every command and answers with a 30 fps estimate.
    #[derive(Default)]
    struct RecordingSink {
        commands: RefCell<Vec<MotorCommand>>,
    }

    impl CommandSink for RecordingSink {
        fn submit(&self, command: MotorCommand) -> Result<f64> {
            self.commands.borrow_mut().push(command);
            Ok(command.estimated_duration(30.0, 0.5))
        }
    }

    fn connector() -> MotorConnector<RecordingSink> {
        MotorConnector::new(RecordingSink::default())
    }

    fn commands(motor: &MotorConnector<RecordingSink>) -> Vec<MotorCommand> {
        motor.sink.commands.borrow().clone()
    }

    #[test]
    fn test_run_direct_derives_speed_from_duty_cycle() {
        let mut motor = connector();
        motor.set_duty_cycle(100);
        motor.run_direct().unwrap();
        assert_eq!(motor.speed(), Some(1050.0));
        assert_eq!(motor.distance(), Some(1050.0 * FOREVER_SECONDS));

        motor.set_duty_cycle(-50);
        motor.run_direct().unwrap();
        assert_eq!(motor.speed(), Some(-525.0));
        assert_eq!(commands(&motor).len(), 2);
    }

    #[test]
    fn test_run_timed_derives_distance() {
        let mut motor = connector();
        motor.set_speed(90.0);
        motor.set_time(2000);
        let duration = motor.run_timed().unwrap();
        assert_eq!(motor.distance(), Some(180.0));
        assert!((duration - 2.0).abs() < 1e-9);
        assert_eq!(
            commands(&motor),
            vec![MotorCommand::Drive {
                speed: 90.0,
                distance: 180.0,
                stop_action: None,
            }]
        );
    }

    #[test]
    fn test_run_forever_uses_forever_seconds() {
        let mut motor = connector();
        motor.set_speed(100.0);
        let duration = motor.run_forever().unwrap();
        assert_eq!(motor.distance(), Some(4500.0));
        assert!((duration - FOREVER_SECONDS).abs() < 1e-9);
    }

    #[test]
    fn test_fields_persist_across_runs() {
        let mut motor = connector();
        motor.set_speed(200.0);
        motor.set_stop_action(StopAction::Coast);
        motor.set_distance(360.0);
        motor.run_to_rel_pos().unwrap();

        // speed and stop action survive; only the distance changes
        motor.set_distance(-90.0);
        motor.run_to_rel_pos().unwrap();
        assert_eq!(
            commands(&motor)[1],
            MotorCommand::Drive {
                speed: 200.0,
                distance: -90.0,
                stop_action: Some(StopAction::Coast),
            }
        );
        assert_eq!(motor.speed(), Some(200.0));
    }

    #[test]
    fn test_zero_speed_or_distance_is_a_no_op() {
        let mut motor = connector();
        assert_eq!(motor.run_to_rel_pos().unwrap(), 0.0);
        assert_eq!(motor.run_forever().unwrap(), 0.0);
        assert_eq!(motor.run_timed().unwrap(), 0.0);
        assert_eq!(motor.run_direct().unwrap(), 0.0);

        motor.set_speed(0.0);
        motor.set_distance(100.0);
        assert_eq!(motor.run_to_rel_pos().unwrap(), 0.0);

        motor.set_speed(100.0);
        motor.set_distance(0.0);
        assert_eq!(motor.run_to_rel_pos().unwrap(), 0.0);

        motor.set_duty_cycle(0);
        assert_eq!(motor.run_direct().unwrap(), 0.0);
        assert!(commands(&motor).is_empty());
    }

    #[test]
    fn test_missing_own_field_ignores_recorded_ones() {
        let mut motor = connector();
        motor.set_speed(100.0);
        motor.set_distance(360.0);

        // no time set: the recorded distance must not be reused
        assert_eq!(motor.run_timed().unwrap(), 0.0);
        // no duty cycle set: the recorded speed must not be reused
        assert_eq!(motor.run_direct().unwrap(), 0.0);
        assert!(commands(&motor).is_empty());
        assert_eq!(motor.distance(), Some(360.0));
        assert_eq!(motor.speed(), Some(100.0));

        // the same fields still drive a relative run
        assert!((motor.run_to_rel_pos().unwrap() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn test_stop_negates_speed_for_negative_distance() {
        let mut motor = connector();
        motor.set_speed(10.0);
        motor.set_distance(-5.0);
        motor.stop().unwrap();
        assert_eq!(
            commands(&motor),
            vec![MotorCommand::Stop {
                speed: -10.0,
                stop_action: None,
            }]
        );
        // the recorded speed itself is untouched
        assert_eq!(motor.speed(), Some(10.0));
    }

    #[test]
    fn test_stop_without_speed_is_a_no_op() {
        let mut motor = connector();
        assert_eq!(motor.stop().unwrap(), 0.0);
        motor.set_speed(0.0);
        assert_eq!(motor.stop().unwrap(), 0.0);
        assert!(commands(&motor).is_empty());
    }

    #[test]
    fn test_coast_stop_duration() {
        let mut motor = connector();
        motor.set_speed(MAX_SPEED);
        motor.set_stop_action(StopAction::Coast);
        let duration = motor.stop().unwrap();
        assert!((duration - 0.5).abs() < 1e-9);
    }
}
