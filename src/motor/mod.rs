// Motor control for the simulated two-wheeled robot
//
// Provides:
// - Differential steering kinematics (wheel travel -> pose change)
// - Motor command translation (ev3 style setters + run_* -> one command)
// - Command processing (command -> per-tick jobs on the actuator queue)

pub mod command;
mod connector;
pub mod kinematics;

pub use command::{CommandProcessor, CommandSink, MotorCommand, StopAction, max_frames};
pub use connector::MotorConnector;
pub use kinematics::{SteeringDelta, differential_steering};
