// Simulation core: shared queues, sensor hand-off, robot state and the tick

mod address;
pub mod handoff;
pub mod parts;
pub mod pose;
pub mod queue;
pub mod robot;
mod simulator;
pub mod visual;
pub mod world;

pub use address::{ActuatorAddress, Address, SensorAddress};
pub use handoff::{SensorHandoff, SensorValues};
pub use parts::{ActuatorKind, LedColor, SensorKind, SensorValue};
pub use pose::{Pose, Vec2};
pub use queue::{ActuatorQueues, Job};
pub use robot::RobotState;
pub use simulator::{ControlHandle, RobotSimulator};
pub use world::{Playfield, World};
