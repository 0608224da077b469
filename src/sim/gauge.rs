//! Angular gauge zones
//!
//! The fishing struggle is drawn as a half-dial: 0° on the left, 180° on the
//! right. The target zone is an angular band that the needle has to stay in.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::polar_to_cartesian;

/// An angular band on a half-dial, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaugeZone {
    pub center_deg: f32,
    pub width_deg: f32,
}

impl GaugeZone {
    pub fn new(center_deg: f32, width_deg: f32) -> Self {
        Self {
            center_deg,
            width_deg: width_deg.abs(),
        }
    }

    pub fn start_deg(&self) -> f32 {
        self.center_deg - self.width_deg / 2.0
    }

    pub fn end_deg(&self) -> f32 {
        self.center_deg + self.width_deg / 2.0
    }

    /// Check if the needle angle lies inside the band
    pub fn contains(&self, angle_deg: f32) -> bool {
        self.deviation(angle_deg) < self.width_deg / 2.0
    }

    /// Absolute distance from the band centre (degrees)
    pub fn deviation(&self, angle_deg: f32) -> f32 {
        (angle_deg - self.center_deg).abs()
    }

    /// Needle tip on a dial of `radius` centred at `origin`.
    /// Screen y grows downward, so the dial opens upward.
    pub fn needle_tip(origin: Vec2, radius: f32, angle_deg: f32) -> Vec2 {
        let theta = std::f32::consts::PI + angle_deg.to_radians();
        origin + polar_to_cartesian(radius, theta)
    }

    /// Sample points along the band edge (for rendering)
    pub fn sample_edge(&self, origin: Vec2, radius: f32, num_points: usize) -> Vec<Vec2> {
        let start = self.start_deg();
        (0..num_points)
            .map(|i| {
                let t = i as f32 / (num_points - 1).max(1) as f32;
                Self::needle_tip(origin, radius, start + t * self.width_deg)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let zone = GaugeZone::new(90.0, 40.0);
        assert!(zone.contains(90.0));
        assert!(zone.contains(70.5));
        assert!(zone.contains(109.5));
        assert!(!zone.contains(110.0));
        assert!(!zone.contains(60.0));
    }

    #[test]
    fn test_bounds() {
        let zone = GaugeZone::new(60.0, 20.0);
        assert_eq!(zone.start_deg(), 50.0);
        assert_eq!(zone.end_deg(), 70.0);
    }

    #[test]
    fn test_needle_tip_orientation() {
        let left = GaugeZone::needle_tip(Vec2::ZERO, 100.0, 0.0);
        let top = GaugeZone::needle_tip(Vec2::ZERO, 100.0, 90.0);
        let right = GaugeZone::needle_tip(Vec2::ZERO, 100.0, 180.0);
        assert!((left - Vec2::new(-100.0, 0.0)).length() < 1e-3);
        assert!((top - Vec2::new(0.0, -100.0)).length() < 1e-3);
        assert!((right - Vec2::new(100.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_sample_edge_endpoints() {
        let zone = GaugeZone::new(90.0, 60.0);
        let points = zone.sample_edge(Vec2::ZERO, 50.0, 5);
        assert_eq!(points.len(), 5);
        assert!((points[0] - GaugeZone::needle_tip(Vec2::ZERO, 50.0, 60.0)).length() < 1e-3);
        assert!((points[4] - GaugeZone::needle_tip(Vec2::ZERO, 50.0, 120.0)).length() < 1e-3);
    }
}
