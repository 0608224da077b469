//! Collision detection and response for circular targets
//!
//! Pitch-pot pots are circles bouncing inside a rectangle and pushing each
//! other apart; archery and pitch-pot both need point-in-circle tests.

use glam::Vec2;

/// Overlap between two circles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleContact {
    /// Unit vector from the first circle toward the second
    pub normal: Vec2,
    /// How far the circles overlap
    pub penetration: f32,
}

/// Check whether two centers are closer than `min_dist`
pub fn circle_overlap(a: Vec2, b: Vec2, min_dist: f32) -> Option<CircleContact> {
    let delta = b - a;
    let dist = delta.length();
    if !dist.is_finite() || dist >= min_dist {
        return None;
    }
    Some(CircleContact {
        // Coincident centers separate along +x
        normal: delta.try_normalize().unwrap_or(Vec2::X),
        penetration: min_dist - dist,
    })
}

/// Push two equal-mass circles apart and exchange their approach velocity.
///
/// Velocities only change when the circles are closing in; a degenerate normal
/// (coincident centers) separates positions but leaves velocities alone.
pub fn resolve_circle_pair(
    pos_a: &mut Vec2,
    vel_a: &mut Vec2,
    pos_b: &mut Vec2,
    vel_b: &mut Vec2,
    min_dist: f32,
) -> Option<CircleContact> {
    let degenerate = (*pos_b - *pos_a).length_squared() == 0.0;
    let contact = circle_overlap(*pos_a, *pos_b, min_dist)?;

    let push = contact.normal * contact.penetration * 0.5;
    *pos_a -= push;
    *pos_b += push;

    if degenerate {
        return Some(contact);
    }

    let approach = (*vel_b - *vel_a).dot(contact.normal);
    if approach < 0.0 {
        *vel_a += contact.normal * approach;
        *vel_b -= contact.normal * approach;
    }
    Some(contact)
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Keep a point inside `[min, max]`, bouncing velocity off the walls it crossed.
/// Returns true if a wall was hit.
pub fn confine_to_rect(pos: &mut Vec2, vel: &mut Vec2, min: Vec2, max: Vec2) -> bool {
    let mut hit = false;

    if (pos.x < min.x && vel.x < 0.0) || (pos.x > max.x && vel.x > 0.0) {
        *vel = reflect_velocity(*vel, Vec2::X);
    }
    if (pos.y < min.y && vel.y < 0.0) || (pos.y > max.y && vel.y > 0.0) {
        *vel = reflect_velocity(*vel, Vec2::Y);
    }

    let clamped = pos.clamp(min, max);
    if clamped != *pos {
        hit = true;
        *pos = clamped;
    }
    hit
}

#[inline]
pub fn point_in_circle(point: Vec2, center: Vec2, radius: f32) -> bool {
    point.distance_squared(center) < radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_contact_when_apart() {
        assert!(circle_overlap(Vec2::ZERO, Vec2::new(150.0, 0.0), 100.0).is_none());
    }

    #[test]
    fn test_overlap_separates_to_min_distance() {
        let mut pa = Vec2::new(0.0, 0.0);
        let mut pb = Vec2::new(60.0, 0.0);
        let mut va = Vec2::ZERO;
        let mut vb = Vec2::ZERO;

        let contact = resolve_circle_pair(&mut pa, &mut va, &mut pb, &mut vb, 100.0).unwrap();
        assert!((contact.penetration - 40.0).abs() < 1e-4);
        assert!((pa.distance(pb) - 100.0).abs() < 1e-3);
        assert_eq!(pa, Vec2::new(-20.0, 0.0));
    }

    #[test]
    fn test_head_on_swaps_velocity() {
        let mut pa = Vec2::new(0.0, 0.0);
        let mut pb = Vec2::new(90.0, 0.0);
        let mut va = Vec2::new(0.1, 0.0);
        let mut vb = Vec2::new(-0.1, 0.0);

        resolve_circle_pair(&mut pa, &mut va, &mut pb, &mut vb, 100.0);
        assert!((va.x + 0.1).abs() < 1e-6);
        assert!((vb.x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_separating_pair_keeps_velocity() {
        let mut pa = Vec2::new(0.0, 0.0);
        let mut pb = Vec2::new(90.0, 0.0);
        let mut va = Vec2::new(-0.1, 0.0);
        let mut vb = Vec2::new(0.1, 0.0);

        resolve_circle_pair(&mut pa, &mut va, &mut pb, &mut vb, 100.0);
        assert_eq!(va, Vec2::new(-0.1, 0.0));
        assert_eq!(vb, Vec2::new(0.1, 0.0));
    }

    #[test]
    fn test_coincident_centers_stay_finite() {
        let mut pa = Vec2::new(50.0, 50.0);
        let mut pb = Vec2::new(50.0, 50.0);
        let mut va = Vec2::new(0.1, 0.2);
        let mut vb = Vec2::new(-0.3, 0.0);

        resolve_circle_pair(&mut pa, &mut va, &mut pb, &mut vb, 100.0);
        assert!(pa.is_finite() && pb.is_finite());
        assert_eq!(va, Vec2::new(0.1, 0.2));
        assert!((pa.distance(pb) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_confine_bounces_and_clamps() {
        let mut pos = Vec2::new(30.0, 300.0);
        let mut vel = Vec2::new(-0.1, 0.05);
        let hit = confine_to_rect(&mut pos, &mut vel, Vec2::splat(40.0), Vec2::new(760.0, 560.0));
        assert!(hit);
        assert_eq!(pos, Vec2::new(40.0, 300.0));
        assert!((vel.x - 0.1).abs() < 1e-6);
        assert!((vel.y - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_reflect_velocity() {
        let v = reflect_velocity(Vec2::new(1.0, -1.0), Vec2::Y);
        assert!((v - Vec2::new(1.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_point_in_circle() {
        assert!(point_in_circle(Vec2::new(30.0, 0.0), Vec2::ZERO, 35.0));
        assert!(!point_in_circle(Vec2::new(35.0, 0.0), Vec2::ZERO, 35.0));
    }
}
