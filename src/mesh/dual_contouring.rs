//! Dual Contouring mesh generation
//!
//! One vertex per active cell, placed by QEF minimisation over the Hermite
//! samples of the cell's crossed edges, so sharp features survive. Quads are
//! emitted around every crossed edge that ends at a cell's maximal corner.
//! Edges on the chunk's far faces need cells from neighbouring chunks and
//! are left to [`stitch_seam`](crate::mesh::seam::stitch_seam); the per-cell
//! [`DrawInfoGrid`] is returned for that purpose.
//!
//! Corner signs use densities quantised to `i8` (`clamp(d, -1, 1) * 127`),
//! so samples in `(-1/127, 0)` count as outside.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::chunk::ChunkConfig;
use crate::error::{ExtractError, Result};
use crate::field::ScalarField;
use crate::grid::DensityGrid;
use crate::mesh::hermite::sample_edge;
use crate::mesh::tables::{
    DC_CORNER_OFFSETS, DC_EDGE_CORNERS, FAR_EDGES, FAR_EDGE_CELL_OFFSETS, FAR_EDGE_MAX_OFFSET,
};
use crate::mesh::{ExtractStats, Mesh};
use crate::qef::{QefSolver, DEFAULT_PINV_TOLERANCE, DEFAULT_SVD_TOLERANCE, DEFAULT_SWEEPS};

/// Configuration for Dual Contouring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualContouringConfig {
    /// Off-diagonal threshold ending the QEF's Jacobi sweeps (default: 1e-4)
    pub qef_threshold: f32,
    /// Maximum Jacobi sweeps (default: 4)
    pub qef_sweeps: u32,
    /// Singular values below this are truncated (default: 1e-4)
    pub qef_pinv_tolerance: f32,
    /// Intervals sampled along an edge to locate its crossing (default: 8)
    pub crossing_steps: u32,
    /// World-space step for central-difference normals (default: 0.001)
    pub normal_step: f32,
    /// Crossed edges fed to the QEF per cell (default: 4)
    pub max_crossings: usize,
}

impl Default for DualContouringConfig {
    fn default() -> Self {
        DualContouringConfig {
            qef_threshold: DEFAULT_SVD_TOLERANCE,
            qef_sweeps: DEFAULT_SWEEPS,
            qef_pinv_tolerance: DEFAULT_PINV_TOLERANCE,
            crossing_steps: 8,
            normal_step: 0.001,
            max_crossings: 4,
        }
    }
}

// ── Draw info ───────────────────────────────────────────────────────

/// Everything an active cell contributes to the mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInfo {
    /// Vertex position in chunk-local lattice units (before scaling)
    pub position: Vec3,
    /// Accumulated Hermite constraints
    pub qef: QefSolver,
    /// Normalised mean of the Hermite normals
    pub average_normal: Vec3,
    /// Corner sign bits, bit `i` set when corner `i` is inside
    pub corners: u8,
    /// Index of the vertex in the chunk mesh
    pub index: u32,
}

/// Per-cell draw info of one chunk
///
/// Written once during extraction, read-only afterwards. Seam stitching
/// reads the grids of neighbouring chunks through this type.
#[derive(Debug, Clone, Default)]
pub struct DrawInfoGrid {
    resolution: usize,
    scale_factor: f32,
    cells: Vec<Option<DrawInfo>>,
}

impl DrawInfoGrid {
    /// Empty grid for `resolution³` cells
    pub fn new(resolution: usize, scale_factor: f32) -> Self {
        DrawInfoGrid {
            resolution,
            scale_factor,
            cells: vec![None; resolution * resolution * resolution],
        }
    }

    /// Cells per axis
    #[inline]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    /// World units per cell
    #[inline]
    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    #[inline(always)]
    fn index(&self, cell: [usize; 3]) -> usize {
        (cell[0] * self.resolution + cell[1]) * self.resolution + cell[2]
    }

    /// Draw info of `cell`, `None` for inactive or out-of-range cells
    #[inline]
    pub fn get(&self, cell: [usize; 3]) -> Option<&DrawInfo> {
        if cell.iter().any(|&c| c >= self.resolution) {
            return None;
        }
        self.cells[self.index(cell)].as_ref()
    }

    pub(crate) fn set(&mut self, cell: [usize; 3], info: DrawInfo) {
        let i = self.index(cell);
        self.cells[i] = Some(info);
    }

    /// Active cells with their coordinates
    pub fn iter_active(&self) -> impl Iterator<Item = ([usize; 3], &DrawInfo)> + '_ {
        let n = self.resolution;
        self.cells.iter().enumerate().filter_map(move |(i, c)| {
            c.as_ref().map(|info| ([i / (n * n), (i / n) % n, i % n], info))
        })
    }

    /// Number of active cells
    pub fn active_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

/// Dual contouring output
#[derive(Debug, Clone, Default)]
pub struct DualContouringMesh {
    /// Vertices, normals and triangles
    pub mesh: Mesh,
    /// Per-cell draw info, kept for seam stitching
    pub draw_infos: DrawInfoGrid,
    /// Per-call counters
    pub stats: ExtractStats,
}

// ── Extraction ──────────────────────────────────────────────────────

/// Density quantised to a signed byte
#[inline(always)]
pub fn quantize(d: f32) -> i8 {
    (d.clamp(-1.0, 1.0) * 127.0) as i8
}

/// Sample `field` over the chunk and extract its surface
///
/// LOD codes do not apply to dual contouring; the chunk is meshed uniformly.
pub fn contour<F: ScalarField + ?Sized>(
    field: &F,
    chunk: &ChunkConfig,
    config: &DualContouringConfig,
) -> Result<DualContouringMesh> {
    chunk.validate()?;

    let mut grid = DensityGrid::for_dual_contouring(chunk.resolution);
    let report = grid.fill(field, chunk.origin, chunk.scale_factor, false)?;
    if !report.has_surface() {
        log::debug!("dual contouring: chunk at {} has no surface", chunk.origin);
        return Ok(DualContouringMesh {
            draw_infos: DrawInfoGrid::new(chunk.resolution, chunk.scale_factor),
            ..Default::default()
        });
    }

    contour_grid(field, &grid, chunk, config)
}

/// Extract the surface from a grid filled by the caller
///
/// The grid must hold `chunk.resolution + 1` points per axis. `field` is
/// still sampled for Hermite crossings and normals.
pub fn contour_grid<F: ScalarField + ?Sized>(
    field: &F,
    grid: &DensityGrid,
    chunk: &ChunkConfig,
    config: &DualContouringConfig,
) -> Result<DualContouringMesh> {
    chunk.validate()?;
    let res = chunk.resolution;
    if grid.size() != res + 1 {
        return Err(ExtractError::unsupported(format!(
            "dual contouring on {} cells needs {} samples per axis, grid has {}",
            res,
            res + 1,
            grid.size()
        )));
    }

    let mut out = DualContouringMesh {
        draw_infos: DrawInfoGrid::new(res, chunk.scale_factor),
        ..Default::default()
    };

    for x in 0..res {
        for y in 0..res {
            for z in 0..res {
                let cell = [x, y, z];
                if let Some(info) = solve_cell(field, grid, chunk, config, cell, &mut out)? {
                    out.draw_infos.set(cell, info);
                }
            }
        }
    }
    out.stats.main_vertices = out.mesh.vertex_count();

    assemble(&out.draw_infos, &mut out.mesh, &mut out.stats);

    log::debug!(
        "dual contouring: res {} -> {} vertices, {} triangles, {} mass-point fallbacks, {} capped cells",
        res,
        out.mesh.vertex_count(),
        out.mesh.triangle_count(),
        out.stats.mass_point_fallbacks,
        out.stats.capped_cells
    );

    Ok(out)
}

/// Hermite sampling and QEF placement for one cell
fn solve_cell<F: ScalarField + ?Sized>(
    field: &F,
    grid: &DensityGrid,
    chunk: &ChunkConfig,
    config: &DualContouringConfig,
    cell: [usize; 3],
    out: &mut DualContouringMesh,
) -> Result<Option<DrawInfo>> {
    let [x, y, z] = cell;
    let mut corners = 0u8;
    for (i, off) in DC_CORNER_OFFSETS.iter().enumerate() {
        if quantize(grid.value(x + off[0], y + off[1], z + off[2])) < 0 {
            corners |= 1 << i;
        }
    }
    if corners == 0 || corners == 255 {
        return Ok(None);
    }
    out.stats.active_cells += 1;

    let base = Vec3::new(x as f32, y as f32, z as f32);
    let corner = |i: usize| {
        let o = DC_CORNER_OFFSETS[i];
        base + Vec3::new(o[0] as f32, o[1] as f32, o[2] as f32)
    };

    let mut qef = QefSolver::new();
    let mut normal_sum = Vec3::ZERO;
    for &[c1, c2] in DC_EDGE_CORNERS.iter() {
        if (corners >> c1) & 1 == (corners >> c2) & 1 {
            continue;
        }
        if qef.len() == config.max_crossings {
            out.stats.capped_cells += 1;
            break;
        }
        let hp = sample_edge(
            field,
            corner(c1),
            corner(c2),
            chunk.origin,
            chunk.scale_factor,
            config.crossing_steps,
            config.normal_step,
        )?;
        qef.add(hp.position, hp.normal);
        normal_sum += hp.normal;
    }
    if qef.is_empty() {
        return Ok(None);
    }

    let solved = qef.solve(config.qef_threshold, config.qef_sweeps, config.qef_pinv_tolerance);
    let position = if solved.cmpge(base).all() && solved.cmple(base + Vec3::ONE).all() {
        solved
    } else {
        out.stats.mass_point_fallbacks += 1;
        qef.mass_point()
    };
    if !position.is_finite() {
        return Err(ExtractError::NonFiniteSample {
            position: chunk.world_position(position),
        });
    }

    let average_normal = match normal_sum.normalize_or_zero() {
        n if n == Vec3::ZERO => Vec3::Y,
        n => n,
    };
    let index = out
        .mesh
        .push_vertex(position * chunk.scale_factor, average_normal);

    Ok(Some(DrawInfo {
        position,
        qef,
        average_normal,
        corners,
        index,
    }))
}

/// Winding-corrected quad around a crossed far edge
///
/// `vertices` are the owning cell followed by the three cells of
/// [`FAR_EDGE_CELL_OFFSETS`] for `edge`.
#[inline(always)]
pub(crate) fn emit_quad(
    mesh: &mut Mesh,
    stats: &mut ExtractStats,
    edge: usize,
    start_inside: bool,
    vertices: [u32; 4],
) {
    let [v0, v1, v2, v3] = vertices;
    let (t1, t2) = if start_inside != (edge == 1) {
        ([v1, v0, v3], [v3, v0, v2])
    } else {
        ([v0, v1, v3], [v0, v3, v2])
    };
    for [a, b, c] in [t1, t2] {
        if !mesh.push_triangle(a, b, c) {
            stats.aliased_triangles += 1;
        }
    }
}

/// Crossed far edge of `info`, as `(start corner inside)` when it changes sign
#[inline(always)]
pub(crate) fn far_edge_crossing(info: &DrawInfo, edge: usize) -> Option<bool> {
    let [e0, e1] = FAR_EDGES[edge];
    let s0 = (info.corners >> e0) & 1;
    let s1 = (info.corners >> e1) & 1;
    (s0 != s1).then_some(s0 == 1)
}

/// Quads for every crossed far edge whose neighbours lie inside the chunk
fn assemble(draw_infos: &DrawInfoGrid, mesh: &mut Mesh, stats: &mut ExtractStats) {
    let res = draw_infos.resolution();

    for (cell, info) in draw_infos.iter_active() {
        for edge in 0..3 {
            let max = FAR_EDGE_MAX_OFFSET[edge];
            if (0..3).any(|k| cell[k] + max[k] >= res) {
                continue;
            }
            let Some(start_inside) = far_edge_crossing(info, edge) else {
                continue;
            };

            let mut vertices = [info.index; 4];
            let mut complete = true;
            for (slot, off) in vertices[1..].iter_mut().zip(FAR_EDGE_CELL_OFFSETS[edge].iter()) {
                match draw_infos.get([cell[0] + off[0], cell[1] + off[1], cell[2] + off[2]]) {
                    Some(n) => *slot = n.index,
                    None => complete = false,
                }
            }
            if complete {
                emit_quad(mesh, stats, edge, start_inside, vertices);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(-5.0), -127);
        assert_eq!(quantize(5.0), 127);
        assert_eq!(quantize(-0.5), -63);
        assert_eq!(quantize(-0.001), 0);
    }

    #[test]
    fn test_box_corner_is_sharp() {
        // Solid box [2.3, 5.6]³; the corner at (5.6, 5.6, 5.6) sits in cell (5, 5, 5).
        let field = |p: Vec3| {
            let d = (p - Vec3::splat(3.95)).abs() - Vec3::splat(1.65);
            d.max_element()
        };
        let chunk = ChunkConfig::new(8, Vec3::ZERO);
        let out = contour(&field, &chunk, &DualContouringConfig::default()).unwrap();
        let info = out.draw_infos.get([5, 5, 5]).unwrap();
        assert!(
            (info.position - Vec3::splat(5.6)).length() < 0.1,
            "{:?}",
            info.position
        );
    }

    #[test]
    fn test_plane_vertices_on_plane() {
        let field = |p: Vec3| p.y - 3.5;
        let chunk = ChunkConfig::new(8, Vec3::ZERO);
        let out = contour(&field, &chunk, &DualContouringConfig::default()).unwrap();
        assert_eq!(out.draw_infos.active_count(), 64);
        for v in &out.mesh.vertices {
            assert!((v.position.y - 3.5).abs() < 1e-4, "{:?}", v);
            assert!((v.normal - Vec3::Y).length() < 1e-3);
        }
        // 7 × 7 interior quads
        assert_eq!(out.mesh.triangle_count(), 98);
        for t in out.mesh.triangles() {
            let [a, b, c] = t.map(|i| out.mesh.vertices[i as usize].position);
            assert!((b - a).cross(c - a).y > 0.0, "triangle {:?} faces down", t);
        }
    }

    #[test]
    fn test_scaled_chunk_positions() {
        let field = |p: Vec3| p.x - 13.0;
        let chunk = ChunkConfig::new(4, Vec3::new(10.0, 0.0, 0.0)).with_scale(2.0);
        let out = contour(&field, &chunk, &DualContouringConfig::default()).unwrap();
        assert!(!out.mesh.vertices.is_empty());
        for (cell, info) in out.draw_infos.iter_active() {
            assert_eq!(cell[0], 1);
            assert!((info.position.x - 1.5).abs() < 1e-4);
            let v = out.mesh.vertices[info.index as usize];
            assert!((v.position.x - 3.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_grid_size_checked() {
        let grid = DensityGrid::new(4);
        let chunk = ChunkConfig::new(4, Vec3::ZERO);
        let field = |p: Vec3| p.x;
        assert!(contour_grid(&field, &grid, &chunk, &DualContouringConfig::default()).is_err());
    }
}
