// Differential steering for the two-wheeled base
// Converts the linear displacement of both wheels during one tick into a
// heading change and a translation.

/// Pose change produced by one differential-steering step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringDelta {
    /// Heading change in radians (counter-clockwise positive).
    pub angle: f64,
    pub dx: f64,
    pub dy: f64,
}

/// Compute the pose change for one tick of a differential-drive body
///
/// # Arguments
/// * `b` - Distance between the wheels (> 0)
/// * `dl` - Linear displacement of the left wheel
/// * `dr` - Linear displacement of the right wheel
/// * `o` - Current orientation in radians
///
/// The caller applies `angle` first, then `(dx, dy)`.
pub fn differential_steering(b: f64, dl: f64, dr: f64, o: f64) -> SteeringDelta {
    let angle = (dr - dl) / b;
    let dc = (dr + dl) / 2.0;

    SteeringDelta {
        angle,
        dx: dc * (angle + o).cos(),
        dy: dc * (angle + o).sin(),
    }
}
