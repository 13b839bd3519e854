//! Hermite data for Dual Contouring
//!
//! A Hermite sample is a surface crossing on a cell edge together with the
//! field normal there. Crossings are located by dense sampling along the
//! edge rather than a root find: `steps + 1` evenly spaced samples, keep
//! the one with the smallest |density|.

use glam::Vec3;

use crate::error::{ExtractError, Result};
use crate::field::{surface_normal, ScalarField};

/// Hermite data point (position + normal)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HermitePoint {
    /// Crossing position, chunk-local lattice units
    pub position: Vec3,
    /// Unit surface normal at the crossing
    pub normal: Vec3,
}

impl HermitePoint {
    /// Create a new Hermite point
    #[inline]
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        HermitePoint { position, normal }
    }
}

/// Parametric position of the sample with minimum |density| on `a -> b`
///
/// Returns `t` in `[0, 1]`; the first minimum wins on ties.
pub fn approximate_zero_crossing<F: ScalarField + ?Sized>(
    field: &F,
    a: Vec3,
    b: Vec3,
    steps: u32,
) -> f32 {
    let steps = steps.max(1);
    let mut best_t = 0.0;
    let mut best = f32::MAX;

    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let d = field.density(a.lerp(b, t)).abs();
        if d < best {
            best = d;
            best_t = t;
        }
    }
    best_t
}

/// Sample a Hermite point on the lattice edge `a -> b`
///
/// `a` and `b` are chunk-local lattice coordinates; `origin` and `scale`
/// map them into world space for the field. `normal_step` is in world units.
pub(crate) fn sample_edge<F: ScalarField + ?Sized>(
    field: &F,
    a: Vec3,
    b: Vec3,
    origin: Vec3,
    scale: f32,
    steps: u32,
    normal_step: f32,
) -> Result<HermitePoint> {
    let wa = origin + a * scale;
    let wb = origin + b * scale;
    let t = approximate_zero_crossing(field, wa, wb, steps);

    let world = wa.lerp(wb, t);
    if !field.density(world).is_finite() {
        return Err(ExtractError::NonFiniteSample { position: world });
    }

    Ok(HermitePoint::new(
        a.lerp(b, t),
        surface_normal(field, world, normal_step),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_crossing_on_sample() {
        let plane = |p: Vec3| p.x - 0.25;
        let t = approximate_zero_crossing(&plane, Vec3::ZERO, Vec3::X, 8);
        assert_eq!(t, 0.25);
    }

    #[test]
    fn test_zero_crossing_between_samples() {
        // 0.3 sits between 0.25 and 0.375; 0.25 is closer.
        let plane = |p: Vec3| p.x - 0.3;
        let t = approximate_zero_crossing(&plane, Vec3::ZERO, Vec3::X, 8);
        assert_eq!(t, 0.25);
    }

    #[test]
    fn test_zero_crossing_reversed_edge() {
        let plane = |p: Vec3| p.y - 0.75;
        let t = approximate_zero_crossing(&plane, Vec3::Y, Vec3::ZERO, 8);
        assert_eq!(t, 0.25);
    }

    #[test]
    fn test_sample_edge_scaled_chunk() {
        // Chunk at world x = 10 with two world units per cell.
        let plane = |p: Vec3| p.x - 11.0;
        let hp = sample_edge(
            &plane,
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(10.0, 0.0, 0.0),
            2.0,
            8,
            0.001,
        )
        .unwrap();
        assert_eq!(hp.position, Vec3::new(0.5, 0.0, 0.0));
        assert!((hp.normal - Vec3::X).length() < 1e-3);
    }

    #[test]
    fn test_sample_edge_rejects_nan() {
        let bad = |_: Vec3| f32::NAN;
        let r = sample_edge(&bad, Vec3::ZERO, Vec3::X, Vec3::ZERO, 1.0, 8, 0.001);
        assert!(matches!(r, Err(ExtractError::NonFiniteSample { .. })));
    }
}
