// Screen-space transforms of robot parts, recomputed from the body pose

use serde::Serialize;

use super::pose::{Pose, Vec2};

/// Where a part's sprite should be drawn this tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartTransform {
    pub label: String,
    pub center_x: f64,
    pub center_y: f64,
    pub angle_degrees: f64,
}

/// Transform of a part mounted at `offset`, scaled from millimetres to pixels.
pub fn part_transform(label: String, offset: Vec2, body: &Pose, scale: f64) -> PartTransform {
    let world = body.to_world(offset) * scale;
    PartTransform {
        label,
        center_x: world.x,
        center_y: world.y,
        angle_degrees: body.angle.to_degrees(),
    }
}
