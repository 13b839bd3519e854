//! Density grid and grid filler
//!
//! One flat buffer of samples per chunk, filled once and read by every
//! downstream pass. The index order is fixed:
//! `index = x * n² + y * n + z` for `n` points per axis. Neighbour lookups
//! in both extractors rely on this exact layout.
//!
//! Marching cubes samples `resolution + 2` points per axis (one extra layer
//! for gradients at the far face); dual contouring samples `resolution + 1`.

use glam::Vec3;

use crate::error::{ExtractError, Result};
use crate::field::{forward_gradient, ScalarField};

/// World-space step for recorded forward-difference gradients
pub const GRADIENT_STEP: f32 = 0.001;

/// Sign summary of a fill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// At least one sample was negative
    pub has_negative: bool,
    /// At least one sample was zero or positive
    pub has_positive: bool,
}

impl FillReport {
    /// True when both signs were seen, so a surface may cross the grid
    #[inline]
    pub fn has_surface(&self) -> bool {
        self.has_negative && self.has_positive
    }
}

/// Flat cube of density samples
#[derive(Debug, Clone, Default)]
pub struct DensityGrid {
    size: usize,
    values: Vec<f32>,
    gradients: Option<Vec<Vec3>>,
}

impl DensityGrid {
    /// Grid with `size` points per axis, all zero
    pub fn new(size: usize) -> Self {
        DensityGrid {
            size,
            values: vec![0.0; size * size * size],
            gradients: None,
        }
    }

    /// Grid sized for marching cubes on `resolution` cells
    pub fn for_marching_cubes(resolution: usize) -> Self {
        Self::new(resolution + 2)
    }

    /// Grid sized for dual contouring on `resolution` cells
    pub fn for_dual_contouring(resolution: usize) -> Self {
        Self::new(resolution + 1)
    }

    /// Grid from precomputed samples in `index` order
    pub fn from_values(size: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != size * size * size {
            return Err(ExtractError::unsupported(format!(
                "{} samples do not form a {}³ grid",
                values.len(),
                size
            )));
        }
        Ok(DensityGrid {
            size,
            values,
            gradients: None,
        })
    }

    /// Points per axis
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Raw samples
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// True when forward-difference gradients were recorded by the last fill
    #[inline]
    pub fn has_sampled_gradients(&self) -> bool {
        self.gradients.is_some()
    }

    /// Flat index of lattice point `(x, y, z)`
    #[inline(always)]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (x * self.size + y) * self.size + z
    }

    /// Sample at lattice point `(x, y, z)`
    #[inline(always)]
    pub fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[self.index(x, y, z)]
    }

    /// Sample at flat index
    #[inline(always)]
    pub fn value_at(&self, index: usize) -> f32 {
        self.values[index]
    }

    /// Lattice coordinates of a flat index
    #[inline(always)]
    pub fn coords(&self, index: usize) -> [usize; 3] {
        let n = self.size;
        [index / (n * n), (index / n) % n, index % n]
    }

    /// Fill every point with `field(origin + p * step)`
    ///
    /// Overwrites the whole buffer. With `record_gradients` the sampler is
    /// also queried for a forward-difference gradient at every point;
    /// otherwise [`gradient`](Self::gradient) differences the grid itself.
    pub fn fill<F: ScalarField + ?Sized>(
        &mut self,
        field: &F,
        origin: Vec3,
        step: f32,
        record_gradients: bool,
    ) -> Result<FillReport> {
        let n = self.size;
        let total = n * n * n;
        self.values.clear();
        self.values.reserve(total);

        let mut gradients = if record_gradients {
            Some(Vec::with_capacity(total))
        } else {
            None
        };

        let mut report = FillReport::default();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    let p = origin + Vec3::new(x as f32, y as f32, z as f32) * step;
                    let d = field.density(p);
                    if !d.is_finite() {
                        return Err(ExtractError::NonFiniteSample { position: p });
                    }

                    if d < 0.0 {
                        report.has_negative = true;
                    } else {
                        report.has_positive = true;
                    }
                    self.values.push(d);

                    if let Some(g) = gradients.as_mut() {
                        g.push(forward_gradient(field, p, d, GRADIENT_STEP));
                    }
                }
            }
        }

        self.gradients = gradients;
        Ok(report)
    }

    /// Gradient at lattice point `(x, y, z)`
    ///
    /// Recorded sampler gradient when available, else a central difference
    /// over neighbouring samples (one-sided on the border). Units are
    /// density per lattice step; only the direction is meaningful to callers.
    #[inline]
    pub fn gradient(&self, x: usize, y: usize, z: usize) -> Vec3 {
        if let Some(g) = &self.gradients {
            return g[self.index(x, y, z)];
        }

        let p = [x, y, z];
        let mut out = [0.0f32; 3];
        for (axis, slot) in out.iter_mut().enumerate() {
            let lo = p[axis].saturating_sub(1);
            let hi = (p[axis] + 1).min(self.size - 1);
            if hi == lo {
                continue;
            }
            let mut a = p;
            let mut b = p;
            a[axis] = lo;
            b[axis] = hi;
            *slot = (self.value(b[0], b[1], b[2]) - self.value(a[0], a[1], a[2]))
                / (hi - lo) as f32;
        }
        Vec3::from_array(out)
    }
}
