// Environment the robot's sensors and wheels are evaluated against.
//
// Obstacle geometry lives outside the simulator core; this trait is the
// boundary it is consumed through.

use super::pose::Vec2;

/// EV3 colour sensor codes.
pub const COLOR_NONE: u8 = 0;
pub const COLOR_WHITE: u8 = 6;

/// What a robot part can observe at a point of the field.
pub trait World: Send {
    /// Colour code seen by a sensor looking straight down at `point`.
    fn color_at(&self, point: Vec2) -> u8;

    /// Whether a touch sensor at `point` is pressed against something.
    fn is_touching(&self, point: Vec2) -> bool;

    /// Distance in millimetres to the nearest obstacle from `from` along
    /// `heading` (radians), if any is in range.
    fn distance_ahead(&self, from: Vec2, heading: f64) -> Option<f64>;

    /// Whether there is ground under `point`.
    fn is_floor(&self, point: Vec2) -> bool;
}

/// A rectangular table with walls at its edges and a drop beyond them.
#[derive(Debug, Clone, Copy)]
pub struct Playfield {
    pub width: f64,
    pub height: f64,
}

impl Playfield {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    fn contains(&self, p: Vec2) -> bool {
        (0.0..=self.width).contains(&p.x) && (0.0..=self.height).contains(&p.y)
    }
}

impl World for Playfield {
    fn color_at(&self, point: Vec2) -> u8 {
        if self.contains(point) {
            COLOR_WHITE
        } else {
            COLOR_NONE
        }
    }

    fn is_touching(&self, point: Vec2) -> bool {
        const REACH: f64 = 1.0;
        self.contains(point)
            && (point.x < REACH
                || point.y < REACH
                || self.width - point.x < REACH
                || self.height - point.y < REACH)
    }

    fn distance_ahead(&self, from: Vec2, heading: f64) -> Option<f64> {
        if !self.contains(from) {
            return None;
        }
        let (dy, dx) = heading.sin_cos();

        // ray parameter to the wall hit along each axis
        let tx = if dx > f64::EPSILON {
            (self.width - from.x) / dx
        } else if dx < -f64::EPSILON {
            -from.x / dx
        } else {
            f64::INFINITY
        };
        let ty = if dy > f64::EPSILON {
            (self.height - from.y) / dy
        } else if dy < -f64::EPSILON {
            -from.y / dy
        } else {
            f64::INFINITY
        };

        Some(tx.min(ty))
    }

    fn is_floor(&self, point: Vec2) -> bool {
        self.contains(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_floor_ends_at_the_edge() {
        let field = Playfield::new(100.0, 50.0);
        assert!(field.is_floor(Vec2::new(0.0, 0.0)));
        assert!(field.is_floor(Vec2::new(100.0, 50.0)));
        assert!(!field.is_floor(Vec2::new(100.1, 10.0)));
        assert!(!field.is_floor(Vec2::new(10.0, -0.1)));
    }

    #[test]
    fn test_distance_to_walls() {
        let field = Playfield::new(100.0, 50.0);
        let from = Vec2::new(30.0, 20.0);
        assert!((field.distance_ahead(from, 0.0).unwrap() - 70.0).abs() < 1e-9);
        assert!((field.distance_ahead(from, FRAC_PI_2).unwrap() - 30.0).abs() < 1e-9);
        assert!((field.distance_ahead(from, PI).unwrap() - 30.0).abs() < 1e-9);
        assert_eq!(field.distance_ahead(Vec2::new(-1.0, 0.0), 0.0), None);
    }

    #[test]
    fn test_touching_only_at_the_wall() {
        let field = Playfield::new(100.0, 50.0);
        assert!(field.is_touching(Vec2::new(99.5, 25.0)));
        assert!(!field.is_touching(Vec2::new(50.0, 25.0)));
    }
}
