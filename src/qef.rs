//! Quadric Error Function solver
//!
//! Accumulates Hermite constraints `n · (v - p) = 0` into the normal
//! equations `AᵀA v = Aᵀb` and solves them in a frame centred on the mass
//! point. `AᵀA` is diagonalised with cyclic Jacobi rotations; singular values
//! under the tolerance are truncated, so unconstrained directions stay at
//! the mass point.

use glam::{Mat3, Vec3};

/// Default truncation threshold for singular values
pub const DEFAULT_SVD_TOLERANCE: f32 = 1e-4;
/// Default number of Jacobi sweeps
pub const DEFAULT_SWEEPS: u32 = 4;
/// Default pseudo-inverse tolerance
pub const DEFAULT_PINV_TOLERANCE: f32 = 1e-4;

/// Upper triangle of a symmetric 3×3 matrix: `[m00, m01, m02, m11, m12, m22]`
type SymMat3 = [f32; 6];

/// QEF accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QefSolver {
    ata: SymMat3,
    atb: Vec3,
    btb: f32,
    mass_point_sum: Vec3,
    count: u32,
}

impl QefSolver {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the plane through `point` with normal `normal`
    #[inline]
    pub fn add(&mut self, point: Vec3, normal: Vec3) {
        let n = normal;
        self.ata[0] += n.x * n.x;
        self.ata[1] += n.x * n.y;
        self.ata[2] += n.x * n.z;
        self.ata[3] += n.y * n.y;
        self.ata[4] += n.y * n.z;
        self.ata[5] += n.z * n.z;

        let d = n.dot(point);
        self.atb += n * d;
        self.btb += d * d;

        self.mass_point_sum += point;
        self.count += 1;
    }

    /// Fold another accumulator into this one
    pub fn merge(&mut self, other: &QefSolver) {
        for (a, b) in self.ata.iter_mut().zip(other.ata.iter()) {
            *a += *b;
        }
        self.atb += other.atb;
        self.btb += other.btb;
        self.mass_point_sum += other.mass_point_sum;
        self.count += other.count;
    }

    /// Number of accumulated constraints
    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    /// True when nothing was added
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Centroid of the accumulated points (origin when empty)
    #[inline]
    pub fn mass_point(&self) -> Vec3 {
        if self.count == 0 {
            Vec3::ZERO
        } else {
            self.mass_point_sum / self.count as f32
        }
    }

    /// Sum of squared plane distances at `p`
    pub fn error_at(&self, p: Vec3) -> f32 {
        let ap = sym_mul(&self.ata, p);
        (p.dot(ap) - 2.0 * p.dot(self.atb) + self.btb).max(0.0)
    }

    /// Minimiser of the accumulated error
    ///
    /// `svd_tolerance` stops the Jacobi sweeps once the off-diagonal mass
    /// drops below it, `sweeps` caps them, `pinv_tolerance` truncates small
    /// singular values.
    pub fn solve(&self, svd_tolerance: f32, sweeps: u32, pinv_tolerance: f32) -> Vec3 {
        if self.count == 0 {
            return Vec3::ZERO;
        }

        let mass_point = self.mass_point();
        let atb = self.atb - sym_mul(&self.ata, mass_point);

        let (sigma, v) = symmetric_eigen(&self.ata, svd_tolerance, sweeps);
        mass_point + pseudo_inverse(sigma, &v, pinv_tolerance) * atb
    }

    /// Minimiser and the residual error there
    pub fn solve_with_error(&self, svd_tolerance: f32, sweeps: u32, pinv_tolerance: f32) -> (Vec3, f32) {
        let x = self.solve(svd_tolerance, sweeps, pinv_tolerance);
        (x, self.error_at(x))
    }
}

// ── Linear algebra ──────────────────────────────────────────────────

#[inline(always)]
fn sym_mul(m: &SymMat3, v: Vec3) -> Vec3 {
    Vec3::new(
        m[0] * v.x + m[1] * v.y + m[2] * v.z,
        m[1] * v.x + m[3] * v.y + m[4] * v.z,
        m[2] * v.x + m[4] * v.y + m[5] * v.z,
    )
}

/// Eigenvalues and eigenvectors (columns) of a symmetric matrix
fn symmetric_eigen(m: &SymMat3, tolerance: f32, sweeps: u32) -> ([f32; 3], [[f32; 3]; 3]) {
    let mut a = [
        [m[0], m[1], m[2]],
        [m[1], m[3], m[4]],
        [m[2], m[4], m[5]],
    ];
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    for _ in 0..sweeps {
        let off = a[0][1] * a[0][1] + a[0][2] * a[0][2] + a[1][2] * a[1][2];
        if off < tolerance * tolerance {
            break;
        }
        rotate(&mut a, &mut v, 0, 1);
        rotate(&mut a, &mut v, 0, 2);
        rotate(&mut a, &mut v, 1, 2);
    }

    ([a[0][0], a[1][1], a[2][2]], v)
}

/// One Jacobi rotation zeroing `a[p][q]`
#[inline(always)]
fn rotate(a: &mut [[f32; 3]; 3], v: &mut [[f32; 3]; 3], p: usize, q: usize) {
    let apq = a[p][q];
    if apq.abs() < 1e-12 {
        return;
    }

    let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
    let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
    let c = 1.0 / (t * t + 1.0).sqrt();
    let s = t * c;

    for k in 0..3 {
        let (akp, akq) = (a[k][p], a[k][q]);
        a[k][p] = c * akp - s * akq;
        a[k][q] = s * akp + c * akq;
    }
    for k in 0..3 {
        let (apk, aqk) = (a[p][k], a[q][k]);
        a[p][k] = c * apk - s * aqk;
        a[q][k] = s * apk + c * aqk;
    }
    for row in v.iter_mut() {
        let (vkp, vkq) = (row[p], row[q]);
        row[p] = c * vkp - s * vkq;
        row[q] = s * vkp + c * vkq;
    }
}

/// `V · diag(1/σ) · Vᵀ` with small singular values zeroed
fn pseudo_inverse(sigma: [f32; 3], v: &[[f32; 3]; 3], tolerance: f32) -> Mat3 {
    let inv = sigma.map(|s| {
        if s.abs() < tolerance || (1.0 / s).abs() < tolerance {
            0.0
        } else {
            1.0 / s
        }
    });

    // glam matrices are column-major
    let mut cols = [[0.0f32; 3]; 3];
    for (j, col) in cols.iter_mut().enumerate() {
        for (i, out) in col.iter_mut().enumerate() {
            *out = (0..3).map(|k| v[i][k] * inv[k] * v[j][k]).sum();
        }
    }
    Mat3::from_cols_array_2d(&cols)
}
