//! Scalar field sampling capability
//!
//! The extractors never define the field themselves; they consume anything
//! that can answer `density(p)`. Negative density is inside the solid,
//! zero and positive are outside.

use glam::Vec3;

/// A signed scalar field over 3D space
///
/// Implementations must be pure: the extractors sample the same point many
/// times (grid fill, Hermite crossings, normals) and expect identical
/// answers. `Sync` lets [`extract_chunks`](crate::batch::extract_chunks)
/// share one field across the rayon pool.
pub trait ScalarField: Sync {
    /// Density at a world-space point
    fn density(&self, p: Vec3) -> f32;
}

impl<F> ScalarField for F
where
    F: Fn(Vec3) -> f32 + Sync,
{
    #[inline(always)]
    fn density(&self, p: Vec3) -> f32 {
        self(p)
    }
}

/// Unit surface normal by central differences
///
/// Falls back to `Vec3::Y` when the gradient vanishes (flat or saturated
/// regions of the field).
#[inline(always)]
pub fn surface_normal<F: ScalarField + ?Sized>(field: &F, p: Vec3, h: f32) -> Vec3 {
    let grad = central_gradient(field, p, h);

    let len_sq = grad.length_squared();
    if len_sq < 1e-20 || !len_sq.is_finite() {
        return Vec3::Y;
    }
    grad / len_sq.sqrt()
}

/// Unnormalized gradient by central differences
#[inline(always)]
pub fn central_gradient<F: ScalarField + ?Sized>(field: &F, p: Vec3, h: f32) -> Vec3 {
    let ex = Vec3::new(h, 0.0, 0.0);
    let ey = Vec3::new(0.0, h, 0.0);
    let ez = Vec3::new(0.0, 0.0, h);

    Vec3::new(
        field.density(p + ex) - field.density(p - ex),
        field.density(p + ey) - field.density(p - ey),
        field.density(p + ez) - field.density(p - ez),
    ) / (2.0 * h)
}

/// Gradient by forward differences, anchored at a known sample `d`
#[inline(always)]
pub fn forward_gradient<F: ScalarField + ?Sized>(field: &F, p: Vec3, d: f32, h: f32) -> Vec3 {
    Vec3::new(
        field.density(p + Vec3::new(h, 0.0, 0.0)) - d,
        field.density(p + Vec3::new(0.0, h, 0.0)) - d,
        field.density(p + Vec3::new(0.0, 0.0, h)) - d,
    ) / h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(p: Vec3) -> f32 {
        p.length() - 1.0
    }

    #[test]
    fn test_closure_is_a_field() {
        let f = |p: Vec3| p.x - 0.25;
        assert_eq!(f.density(Vec3::new(1.0, 5.0, 5.0)), 0.75);
    }

    #[test]
    fn test_surface_normal_sphere() {
        let n = surface_normal(&sphere, Vec3::new(1.0, 0.0, 0.0), 0.001);
        assert!((n - Vec3::X).length() < 1e-3, "normal {:?}", n);
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_surface_normal_flat_field_falls_back() {
        let flat = |_: Vec3| 1.0f32;
        assert_eq!(surface_normal(&flat, Vec3::ZERO, 0.001), Vec3::Y);
    }

    #[test]
    fn test_forward_gradient_linear() {
        let f = |p: Vec3| 2.0 * p.x - p.z;
        let p = Vec3::new(0.5, 0.5, 0.5);
        let g = forward_gradient(&f, p, f(p), 0.001);
        assert!((g - Vec3::new(2.0, 0.0, -1.0)).length() < 1e-2, "{:?}", g);
    }
}
