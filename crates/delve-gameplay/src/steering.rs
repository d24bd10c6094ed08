//! Steering kernel for agents moving without the tile grid.
//!
//! Every function works on the XZ plane and returns a velocity in units per
//! second. Callers integrate with `position += velocity * dt`.

use glam::{Vec2, Vec3};

const MIN_DISTANCE: f32 = 1e-4;

/// Projects a world position onto the XZ plane.
#[must_use]
pub fn xz(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}

/// Lifts an XZ velocity back to 3D with zero vertical component.
#[must_use]
pub fn from_xz(v: Vec2) -> Vec3 {
    Vec3::new(v.x, 0.0, v.y)
}

/// Full speed toward `target`.
#[must_use]
pub fn seek(pos: Vec2, target: Vec2, max_speed: f32) -> Vec2 {
    (target - pos).normalize_or_zero() * max_speed
}

/// Toward `target`, slowing linearly to zero inside `slow_radius`.
#[must_use]
pub fn arrive(pos: Vec2, target: Vec2, max_speed: f32, slow_radius: f32) -> Vec2 {
    let to_target = target - pos;
    let dist = to_target.length();
    if dist < MIN_DISTANCE {
        return Vec2::ZERO;
    }
    let speed = if slow_radius > 0.0 && dist < slow_radius {
        max_speed * dist / slow_radius
    } else {
        max_speed
    };
    to_target / dist * speed
}

/// Full speed away from `threat`.
#[must_use]
pub fn flee(pos: Vec2, threat: Vec2, max_speed: f32) -> Vec2 {
    (pos - threat).normalize_or_zero() * max_speed
}

/// Circles `target` at `radius`.
///
/// Blends a tangential term with a radial correction proportional to the
/// distance from the ring. The result never exceeds `max_speed`.
#[must_use]
pub fn orbit(
    pos: Vec2,
    target: Vec2,
    radius: f32,
    clockwise: bool,
    tangent_gain: f32,
    radial_gain: f32,
    max_speed: f32,
) -> Vec2 {
    let offset = pos - target;
    let dist = offset.length();
    if dist < MIN_DISTANCE {
        return Vec2::X * max_speed.max(0.0);
    }
    let outward = offset / dist;
    let tangent = if clockwise {
        Vec2::new(outward.y, -outward.x)
    } else {
        Vec2::new(-outward.y, outward.x)
    };
    let ring_error = dist - radius;
    let velocity = tangent * tangent_gain * max_speed - outward * ring_error * radial_gain;
    velocity.clamp_length_max(max_speed.max(0.0))
}

/// Random walk on a caller-owned heading.
///
/// `angle` is perturbed by at most `turn_rate * dt` radians per call.
pub fn wander(angle: &mut f32, turn_rate: f32, speed: f32, dt: f32, rng: &mut fastrand::Rng) -> Vec2 {
    let jitter = rng.f32().mul_add(2.0, -1.0);
    *angle = (*angle + jitter * turn_rate * dt).rem_euclid(std::f32::consts::TAU);
    Vec2::new(angle.cos(), angle.sin()) * speed
}

/// Pairwise push-apart from neighbors within `radius`.
///
/// Each neighbor contributes `strength * (1 - d / radius)` along the
/// separation direction. Exactly coincident neighbors are skipped.
#[must_use]
pub fn compute_repulsion<I>(pos: Vec2, others: I, radius: f32, strength: f32) -> Vec2
where
    I: IntoIterator<Item = Vec2>,
{
    if radius <= 0.0 {
        return Vec2::ZERO;
    }
    others
        .into_iter()
        .filter_map(|other| {
            let away = pos - other;
            let dist = away.length();
            (dist > MIN_DISTANCE && dist < radius).then(|| away / dist * strength * (1.0 - dist / radius))
        })
        .fold(Vec2::ZERO, |acc, f| acc + f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_seek_and_flee() {
        let v = seek(Vec2::ZERO, Vec2::new(10.0, 0.0), 5.0);
        assert!((v - Vec2::new(5.0, 0.0)).length() < 0.001);
        let f = flee(Vec2::ZERO, Vec2::new(10.0, 0.0), 5.0);
        assert!((f - Vec2::new(-5.0, 0.0)).length() < 0.001);
        assert_eq!(seek(Vec2::ONE, Vec2::ONE, 5.0), Vec2::ZERO);
    }

    #[test]
    fn test_arrive_ramp() {
        let target = Vec2::new(100.0, 0.0);
        let half = arrive(Vec2::new(50.0, 0.0), target, 10.0, 100.0);
        assert!((half.length() - 5.0).abs() < 0.001);
        let outside = arrive(Vec2::new(-50.0, 0.0), target, 10.0, 100.0);
        assert!((outside.length() - 10.0).abs() < 0.001);
        assert_eq!(arrive(target, target, 10.0, 100.0), Vec2::ZERO);
    }

    #[test]
    fn test_orbit_on_ring_is_tangent() {
        let v = orbit(Vec2::new(10.0, 0.0), Vec2::ZERO, 10.0, false, 1.0, 1.0, 4.0);
        assert!(v.x.abs() < 0.001);
        assert!((v.y - 4.0).abs() < 0.001);
        let cw = orbit(Vec2::new(10.0, 0.0), Vec2::ZERO, 10.0, true, 1.0, 1.0, 4.0);
        assert!((cw.y + 4.0).abs() < 0.001);
    }

    #[test]
    fn test_orbit_pulls_toward_ring() {
        let v = orbit(Vec2::new(30.0, 0.0), Vec2::ZERO, 10.0, false, 0.0, 0.1, 100.0);
        assert!(v.x < 0.0);
        let v = orbit(Vec2::new(2.0, 0.0), Vec2::ZERO, 10.0, false, 0.0, 0.1, 100.0);
        assert!(v.x > 0.0);
    }

    #[test]
    fn test_wander_bounded_turn() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut angle = 1.0;
        for _ in 0..100 {
            let before = angle;
            let v = wander(&mut angle, 2.0, 3.0, 0.1, &mut rng);
            assert!((v.length() - 3.0).abs() < 0.001);
            let mut turn = (angle - before).abs();
            if turn > std::f32::consts::PI {
                turn = std::f32::consts::TAU - turn;
            }
            assert!(turn <= 0.2 + 1e-4);
        }
    }

    #[test]
    fn test_repulsion_falloff() {
        let near = compute_repulsion(Vec2::ZERO, [Vec2::new(1.0, 0.0)], 4.0, 8.0);
        let far = compute_repulsion(Vec2::ZERO, [Vec2::new(3.0, 0.0)], 4.0, 8.0);
        assert!(near.x < 0.0 && far.x < 0.0);
        assert!(near.length() > far.length());
        assert!((near.length() - 6.0).abs() < 0.001);
        let none = compute_repulsion(Vec2::ZERO, [Vec2::new(5.0, 0.0), Vec2::ZERO], 4.0, 8.0);
        assert_eq!(none, Vec2::ZERO);
    }

    #[test]
    fn test_repulsion_sums() {
        let both = compute_repulsion(Vec2::ZERO, [Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0)], 4.0, 8.0);
        assert!(both.length() < 0.001);
    }

    proptest! {
        #[test]
        fn prop_arrive_monotonic_and_saturating(
            d1 in 0.0f32..300.0,
            d2 in 0.0f32..300.0,
            max_speed in 0.1f32..50.0,
            slow in 1.0f32..200.0,
        ) {
            let (near, far) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
            let target = Vec2::ZERO;
            let v_near = arrive(Vec2::new(near, 0.0), target, max_speed, slow).length();
            let v_far = arrive(Vec2::new(far, 0.0), target, max_speed, slow).length();
            prop_assert!(v_near <= v_far + 1e-3);
            prop_assert!(v_far <= max_speed + 1e-3);
            if far >= slow {
                prop_assert!((v_far - max_speed).abs() < 1e-3);
            }
        }

        #[test]
        fn prop_orbit_never_exceeds_max_speed(
            px in -500.0f32..500.0,
            pz in -500.0f32..500.0,
            radius in 0.0f32..200.0,
            clockwise in any::<bool>(),
            tangent_gain in 0.0f32..5.0,
            radial_gain in 0.0f32..5.0,
            max_speed in 0.0f32..100.0,
        ) {
            let v = orbit(Vec2::new(px, pz), Vec2::ZERO, radius, clockwise, tangent_gain, radial_gain, max_speed);
            prop_assert!(v.length() <= max_speed + 1e-3);
        }
    }
}
