// Planar geometry for the robot body

use std::ops::{Add, Mul, Sub};

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate counter-clockwise by `radians` around the origin.
    pub fn rotated(self, radians: f64) -> Self {
        let (sin, cos) = radians.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Position in millimetres and body angle in radians.
///
/// An angle of zero means the robot faces +y; part offsets are expressed in
/// that frame (negative x is the left side).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    pub position: Vec2,
    pub angle: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, angle: f64) -> Self {
        Self {
            position: Vec2::new(x, y),
            angle,
        }
    }

    /// Direction of travel in world coordinates.
    pub fn heading(&self) -> f64 {
        self.angle + std::f64::consts::FRAC_PI_2
    }

    /// World position of a point given in the body frame.
    pub fn to_world(&self, offset: Vec2) -> Vec2 {
        offset.rotated(self.angle) + self.position
    }
}
