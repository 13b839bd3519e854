//! Marching Cubes over a chunk density grid
//!
//! Two passes over a padded `(resolution + 2)³` grid:
//!
//! 1. **Vertex pass**: every lattice point looks at its `-x`, `-y` and `-z`
//!    neighbours and interpolates one vertex per sign change, recorded in a
//!    flat edge array (three slots per lattice point). Each physical edge is
//!    interpolated exactly once, so neighbouring cells share vertices.
//! 2. **Triangulation pass**: every cell builds its 8-bit case code (bit `i`
//!    set when corner `i` is negative), walks the triangle table and
//!    resolves edges through [`EDGE_OWNER_OFFSETS`].
//!
//! Faces flagged in the chunk's LOD code are trimmed from both passes and
//! left to the transition pass.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkConfig, LodCode};
use crate::error::{ExtractError, Result};
use crate::field::ScalarField;
use crate::grid::DensityGrid;
use crate::mesh::tables::{CORNER_OFFSETS, EDGE_OWNER_OFFSETS, TRI_TABLE};
use crate::mesh::{transition, ExtractStats, Mesh, Vertex};

/// Edge slot without a vertex
pub(crate) const NO_VERTEX: u32 = u32::MAX;

/// Densities closer to zero than this snap the crossing onto the sample
pub const ZERO_EPSILON: f32 = 1e-5;

/// Crossing fractions are quantised to multiples of `1 / FRACTION_STEPS`
pub const FRACTION_STEPS: f32 = 256.0;

/// Configuration for marching cubes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarchingCubesConfig {
    /// Query the field for forward-difference gradients while filling,
    /// instead of differencing the grid
    pub record_sampled_gradients: bool,
}

/// Marching cubes output
#[derive(Debug, Clone, Default)]
pub struct MarchingCubesMesh {
    /// Vertices, normals and triangles
    pub mesh: Mesh,
    /// Per-call counters
    pub stats: ExtractStats,
}

impl MarchingCubesMesh {
    /// Vertices created by the main pass
    pub fn main_vertices(&self) -> &[Vertex] {
        &self.mesh.vertices[..self.stats.main_vertices]
    }

    /// Vertices created by the transition pass
    pub fn transition_vertices(&self) -> &[Vertex] {
        &self.mesh.vertices[self.stats.main_vertices..]
    }
}

// ── Crossing interpolation ──────────────────────────────────────────

/// Quantised zero-crossing fraction along an edge with densities `d1, d2`
///
/// `round(d1 / (d1 - d2) * 256) / 256`, clamped to `[0, 1]`.
#[inline(always)]
pub fn crossing_fraction(d1: f32, d2: f32) -> f32 {
    let denom = d1 - d2;
    if denom == 0.0 {
        return 0.5;
    }
    ((d1 / denom * FRACTION_STEPS).round() / FRACTION_STEPS).clamp(0.0, 1.0)
}

/// Zero crossing on the segment `a -> b`
///
/// Lands exactly on an endpoint whose density is within [`ZERO_EPSILON`].
#[inline(always)]
pub fn interpolate_crossing(d1: f32, d2: f32, a: Vec3, b: Vec3) -> Vec3 {
    if d1.abs() < ZERO_EPSILON {
        return a;
    }
    if d2.abs() < ZERO_EPSILON {
        return b;
    }
    a + (b - a) * crossing_fraction(d1, d2)
}

/// Lattice endpoint that [`interpolate_crossing`] lands on, if any
#[inline(always)]
pub(crate) fn snapped_endpoint(d1: f32, d2: f32, a: [usize; 3], b: [usize; 3]) -> Option<[usize; 3]> {
    if d1.abs() < ZERO_EPSILON {
        Some(a)
    } else if d2.abs() < ZERO_EPSILON {
        Some(b)
    } else {
        None
    }
}

/// Unit normal at the crossing, lerped from endpoint gradients
///
/// Falls back to the edge direction from the negative endpoint towards the
/// non-negative one when the gradients cancel out.
#[inline(always)]
pub(crate) fn crossing_normal(d1: f32, d2: f32, g1: Vec3, g2: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let n1 = g1.normalize_or_zero();
    let n2 = g2.normalize_or_zero();

    let n = if d1.abs() < ZERO_EPSILON {
        n1
    } else if d2.abs() < ZERO_EPSILON {
        n2
    } else {
        n1.lerp(n2, crossing_fraction(d1, d2))
    }
    .normalize_or_zero();

    if n != Vec3::ZERO {
        return n;
    }
    let outward = if d1 < 0.0 { b - a } else { a - b };
    let n = outward.normalize_or_zero();
    if n == Vec3::ZERO {
        Vec3::Y
    } else {
        n
    }
}

// ── Edge vertex array ───────────────────────────────────────────────

/// Crossing vertices owned by the main pass
///
/// One slot per lattice point and axis over the `(resolution + 1)³`
/// lattice; slot `(p, axis)` holds the vertex on the edge from `p - e_axis`
/// to `p`. Only points in `[begin, end)` own edges, and only edges whose
/// lower endpoint is also in that region.
///
/// Crossings that snap onto a lattice point share one vertex per point,
/// so triangles collapsing onto it are caught by the aliasing guard.
pub(crate) struct EdgeVertices {
    n: usize,
    begin: [usize; 3],
    end: [usize; 3],
    slots: Vec<u32>,
    points: Vec<u32>,
}

impl EdgeVertices {
    fn new(resolution: usize, lod: LodCode) -> Self {
        let n = resolution + 1;
        let mut begin = [0; 3];
        let mut end = [n; 3];
        for axis in 0..3 {
            if lod.trims_min(axis) {
                begin[axis] += 1;
            }
            if lod.trims_max(axis) {
                end[axis] -= 1;
            }
        }
        EdgeVertices {
            n,
            begin,
            end,
            slots: vec![NO_VERTEX; 3 * n * n * n],
            points: vec![NO_VERTEX; n * n * n],
        }
    }

    #[inline(always)]
    fn point(&self, p: [usize; 3]) -> usize {
        (p[0] * self.n + p[1]) * self.n + p[2]
    }

    #[inline(always)]
    fn slot(&self, p: [usize; 3], axis: usize) -> usize {
        3 * self.point(p) + axis
    }

    /// Vertex the main pass snapped onto lattice point `p`
    #[inline(always)]
    pub(crate) fn point_vertex(&self, p: [usize; 3]) -> u32 {
        self.points[self.point(p)]
    }

    /// True when the edge ending at `hi` along `axis` belongs to the main pass
    #[inline(always)]
    pub(crate) fn owns(&self, hi: [usize; 3], axis: usize) -> bool {
        (0..3).all(|k| hi[k] >= self.begin[k] && hi[k] < self.end[k]) && hi[axis] > self.begin[axis]
    }

    /// Vertex on the edge ending at `hi` along `axis`
    #[inline(always)]
    pub(crate) fn get(&self, hi: [usize; 3], axis: usize) -> u32 {
        self.slots[self.slot(hi, axis)]
    }
}

// ── Extraction ──────────────────────────────────────────────────────

/// Sample `field` over the chunk and extract its surface
///
/// Chunks whose samples are all negative or all non-negative return an
/// empty mesh without triangulating.
pub fn polygonize<F: ScalarField + ?Sized>(
    field: &F,
    chunk: &ChunkConfig,
    config: &MarchingCubesConfig,
) -> Result<MarchingCubesMesh> {
    chunk.validate()?;

    let mut grid = DensityGrid::for_marching_cubes(chunk.resolution);
    let report = grid.fill(
        field,
        chunk.origin,
        chunk.scale_factor,
        config.record_sampled_gradients,
    )?;

    if !report.has_surface() {
        log::debug!(
            "marching cubes: chunk at {} has no surface (negative: {}, positive: {})",
            chunk.origin,
            report.has_negative,
            report.has_positive
        );
        return Ok(MarchingCubesMesh::default());
    }

    polygonize_grid(&grid, chunk)
}

/// Extract the surface from a grid filled by the caller
///
/// The grid must hold `chunk.resolution + 2` points per axis, sampled at
/// `chunk.origin + p * chunk.scale_factor`.
pub fn polygonize_grid(grid: &DensityGrid, chunk: &ChunkConfig) -> Result<MarchingCubesMesh> {
    chunk.validate()?;
    let res = chunk.resolution;
    if grid.size() != res + 2 {
        return Err(ExtractError::unsupported(format!(
            "marching cubes on {} cells needs {} samples per axis, grid has {}",
            res,
            res + 2,
            grid.size()
        )));
    }

    let mut out = MarchingCubesMesh::default();
    let mut edges = EdgeVertices::new(res, chunk.lod);

    create_vertices(grid, chunk.scale_factor, &mut edges, &mut out.mesh);
    out.stats.main_vertices = out.mesh.vertex_count();

    triangulate(grid, &edges, &mut out.mesh, &mut out.stats);

    if !chunk.lod.is_empty() {
        transition::stitch(grid, chunk, &edges, &mut out.mesh, &mut out.stats);
    }

    log::debug!(
        "marching cubes: res {} lod {:#04x} -> {} vertices ({} transition), {} triangles, {} aliased",
        res,
        chunk.lod.bits(),
        out.mesh.vertex_count(),
        out.stats.transition_vertices,
        out.mesh.triangle_count(),
        out.stats.aliased_triangles
    );

    Ok(out)
}

/// Vertex pass over the untrimmed lattice region
fn create_vertices(grid: &DensityGrid, scale: f32, edges: &mut EdgeVertices, mesh: &mut Mesh) {
    let [bx, by, bz] = edges.begin;
    let [ex, ey, ez] = edges.end;

    for x in bx..ex {
        for y in by..ey {
            for z in bz..ez {
                let p = [x, y, z];
                let d1 = grid.value(x, y, z);
                let pf = Vec3::new(x as f32, y as f32, z as f32);

                for axis in 0..3 {
                    if p[axis] == edges.begin[axis] {
                        continue;
                    }
                    let mut q = p;
                    q[axis] -= 1;
                    let d2 = grid.value(q[0], q[1], q[2]);
                    if (d1 < 0.0) == (d2 < 0.0) {
                        continue;
                    }

                    let snapped = snapped_endpoint(d1, d2, p, q).map(|s| edges.point(s));
                    let index = match snapped.map(|i| edges.points[i]) {
                        Some(v) if v != NO_VERTEX => v,
                        _ => {
                            let qf = Vec3::new(q[0] as f32, q[1] as f32, q[2] as f32);
                            let position = interpolate_crossing(d1, d2, pf, qf);
                            let normal = crossing_normal(
                                d1,
                                d2,
                                grid.gradient(x, y, z),
                                grid.gradient(q[0], q[1], q[2]),
                                pf,
                                qf,
                            );
                            let v = mesh.push_vertex(position * scale, normal);
                            if let Some(i) = snapped {
                                edges.points[i] = v;
                            }
                            v
                        }
                    };

                    let slot = edges.slot(p, axis);
                    edges.slots[slot] = index;
                }
            }
        }
    }
}

/// Triangulation pass over the untrimmed cells
fn triangulate(grid: &DensityGrid, edges: &EdgeVertices, mesh: &mut Mesh, stats: &mut ExtractStats) {
    let [bx, by, bz] = edges.begin;
    let [ex, ey, ez] = edges.end;

    for x in bx..ex - 1 {
        for y in by..ey - 1 {
            for z in bz..ez - 1 {
                let mut case = 0usize;
                for (i, off) in CORNER_OFFSETS.iter().enumerate() {
                    if grid.value(x + off[0], y + off[1], z + off[2]) < 0.0 {
                        case |= 1 << i;
                    }
                }
                if case == 0 || case == 255 {
                    continue;
                }
                stats.active_cells += 1;

                let resolve = |e: i8| {
                    let [dx, dy, dz, axis] = EDGE_OWNER_OFFSETS[e as usize];
                    let v = edges.get([x + dx, y + dy, z + dz], axis);
                    debug_assert_ne!(v, NO_VERTEX, "edge {} of cell ({}, {}, {})", e, x, y, z);
                    v
                };

                for tri in TRI_TABLE[case].chunks_exact(3).take_while(|t| t[0] >= 0) {
                    let (a, b, c) = (resolve(tri[0]), resolve(tri[1]), resolve(tri[2]));
                    if !mesh.push_triangle(a, c, b) {
                        stats.aliased_triangles += 1;
                    }
                }
            }
        }
    }
}
