use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite key of an actuator or sensor: the brick (controller) it is
/// attached to and the port name on that brick.
///
/// Ordering is by brick first, then port, which gives the simulator a
/// deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub brick: u8,
    pub port: String,
}

pub type ActuatorAddress = Address;
pub type SensorAddress = Address;

impl Address {
    pub fn new(brick: u8, port: impl Into<String>) -> Self {
        Self {
            brick,
            port: port.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.brick, self.port)
    }
}
