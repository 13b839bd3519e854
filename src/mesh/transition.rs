//! LOD transition cells for marching cubes
//!
//! When a chunk face borders a coarser neighbour, that neighbour only has
//! samples on every other lattice point of the shared face. The main pass
//! leaves the boundary layer of cells alone; this pass re-meshes it on
//! 2×2×2 super-cells whose stencils pull every lattice point that lies on a
//! coarse face down onto the even (coarse) lattice. Cells collapse into
//! pyramids, wedges and flat slivers; slivers are dropped when the table is
//! built, the rest are triangulated with the ordinary case tables.
//!
//! Snapping depends only on the point and the chunk's LOD code, so
//! neighbouring super-cells agree on every shared face and the coarse face
//! only ever sees coarse samples.

use std::collections::HashMap;

use glam::Vec3;
use lazy_static::lazy_static;

use crate::chunk::ChunkConfig;
use crate::grid::DensityGrid;
use crate::mesh::marching_cubes::{
    crossing_normal, interpolate_crossing, snapped_endpoint, EdgeVertices, NO_VERTEX,
};
use crate::mesh::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, TRI_TABLE};
use crate::mesh::{ExtractStats, Mesh};

/// Eight stencil points in Bourke corner order, each packed as a direction
/// code from the super-cell centre: `1` = −x, `2` = +x, `4` = −y, `8` = +y,
/// `16` = −z, `32` = +z
pub type Stencil = [u8; 8];

/// Snapped cells below this volume (in cells) are dropped
const MIN_CELL_VOLUME: f32 = 1e-3;

lazy_static! {
    static ref STENCILS: Vec<Vec<Stencil>> = {
        let table: Vec<Vec<Stencil>> = (0..64u8).map(build_stencils).collect();
        log::trace!(
            "transition stencils built: {} cells across 63 masks",
            table.iter().map(Vec::len).sum::<usize>()
        );
        table
    };
}

/// Transition cells of one super-cell for a six-bit face mask
pub fn stencils(mask: u8) -> &'static [Stencil] {
    STENCILS.get(mask as usize).map(Vec::as_slice).unwrap_or(&[])
}

// ── Table construction ──────────────────────────────────────────────

#[inline(always)]
fn on_active_face(local: [usize; 3], mask: u8) -> bool {
    (0..3).any(|a| {
        (mask & (1 << (2 * a)) != 0 && local[a] == 0) || (mask & (2 << (2 * a)) != 0 && local[a] == 2)
    })
}

/// Pull a super-cell-local point (coords 0..=2) onto the coarse lattice
/// when it lies on an active face
#[inline(always)]
fn snap(mut local: [usize; 3], mask: u8) -> [usize; 3] {
    if on_active_face(local, mask) {
        for c in local.iter_mut() {
            if *c == 1 {
                *c = 0;
            }
        }
    }
    local
}

#[inline(always)]
fn encode(local: [usize; 3]) -> u8 {
    let mut code = 0;
    for (a, &c) in local.iter().enumerate() {
        match c {
            0 => code |= 1 << (2 * a),
            2 => code |= 2 << (2 * a),
            _ => {}
        }
    }
    code
}

#[inline(always)]
fn decode(centre: [usize; 3], code: u8) -> [usize; 3] {
    let mut p = centre;
    for (a, c) in p.iter_mut().enumerate() {
        if code & (1 << (2 * a)) != 0 {
            *c -= 1;
        }
        if code & (2 << (2 * a)) != 0 {
            *c += 1;
        }
    }
    p
}

/// Volume of a hexahedron in Bourke corner order, six tetrahedra around
/// the 0-6 diagonal
fn hex_volume(p: &[Vec3; 8]) -> f32 {
    const TETS: [[usize; 2]; 6] = [[1, 2], [2, 3], [3, 7], [7, 4], [4, 5], [5, 1]];
    let (o, d) = (p[0], p[6]);
    TETS.iter()
        .map(|&[b, c]| (p[b] - o).dot((p[c] - o).cross(d - o)) / 6.0)
        .sum()
}

fn build_stencils(mask: u8) -> Vec<Stencil> {
    let mut out = Vec::new();
    if mask == 0 {
        return out;
    }

    for cx in 0..2 {
        for cy in 0..2 {
            for cz in 0..2 {
                let cell = [cx, cy, cz];
                let touches = (0..3).any(|a| {
                    (mask & (1 << (2 * a)) != 0 && cell[a] == 0)
                        || (mask & (2 << (2 * a)) != 0 && cell[a] == 1)
                });
                if !touches {
                    continue;
                }

                let mut points = [[0usize; 3]; 8];
                for (i, off) in CORNER_OFFSETS.iter().enumerate() {
                    points[i] = snap([cx + off[0], cy + off[1], cz + off[2]], mask);
                }

                let corners = points.map(|p| Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32));
                if hex_volume(&corners).abs() < MIN_CELL_VOLUME {
                    continue;
                }
                out.push(points.map(encode));
            }
        }
    }
    out
}

// ── Transition pass ─────────────────────────────────────────────────

/// Mesh every boundary cell trimmed from the main pass
pub(crate) fn stitch(
    grid: &DensityGrid,
    chunk: &ChunkConfig,
    edges: &EdgeVertices,
    mesh: &mut Mesh,
    stats: &mut ExtractStats,
) {
    let res = chunk.resolution;
    let lod = chunk.lod.bits();
    let scale = chunk.scale_factor;
    let mut shared: HashMap<(usize, usize), u32> = HashMap::new();
    let mut snapped_points: HashMap<[usize; 3], u32> = HashMap::new();

    // Vertex on the lattice segment `pa - pb`, shared with the main pass
    // for unit edges it owns and between transition cells otherwise.
    let mut edge_vertex = |pa: [usize; 3], pb: [usize; 3], mesh: &mut Mesh, stats: &mut ExtractStats| {
        let (ia, ib) = (grid.index(pa[0], pa[1], pa[2]), grid.index(pb[0], pb[1], pb[2]));
        let (lo, hi, plo, phi) = if ia < ib { (ia, ib, pa, pb) } else { (ib, ia, pb, pa) };

        let unit_axis = match [0usize, 1, 2].map(|k| plo[k] != phi[k]) {
            [true, false, false] => Some(0),
            [false, true, false] => Some(1),
            [false, false, true] => Some(2),
            _ => None,
        };
        if let Some(axis) = unit_axis {
            if phi[axis] == plo[axis] + 1 && edges.owns(phi, axis) {
                let v = edges.get(phi, axis);
                if v != NO_VERTEX {
                    return v;
                }
            }
        }
        if let Some(&v) = shared.get(&(lo, hi)) {
            return v;
        }

        let (d1, d2) = (grid.value_at(hi), grid.value_at(lo));
        let snapped = snapped_endpoint(d1, d2, phi, plo);
        let reused = snapped.and_then(|p| match edges.point_vertex(p) {
            NO_VERTEX => snapped_points.get(&p).copied(),
            v => Some(v),
        });

        let v = match reused {
            Some(v) => v,
            None => {
                let a = Vec3::new(phi[0] as f32, phi[1] as f32, phi[2] as f32);
                let b = Vec3::new(plo[0] as f32, plo[1] as f32, plo[2] as f32);
                let normal = crossing_normal(
                    d1,
                    d2,
                    grid.gradient(phi[0], phi[1], phi[2]),
                    grid.gradient(plo[0], plo[1], plo[2]),
                    a,
                    b,
                );
                stats.transition_vertices += 1;
                let v = mesh.push_vertex(interpolate_crossing(d1, d2, a, b) * scale, normal);
                if let Some(p) = snapped {
                    snapped_points.insert(p, v);
                }
                v
            }
        };
        shared.insert((lo, hi), v);
        v
    };

    for sx in (0..res).step_by(2) {
        for sy in (0..res).step_by(2) {
            for sz in (0..res).step_by(2) {
                let s = [sx, sy, sz];
                let mut cell_mask = 0u8;
                for a in 0..3 {
                    if s[a] == 0 {
                        cell_mask |= 1 << (2 * a);
                    }
                    if s[a] == res - 2 {
                        cell_mask |= 2 << (2 * a);
                    }
                }
                let cell_lod = lod & cell_mask;
                if cell_lod == 0 {
                    continue;
                }

                let centre = [sx + 1, sy + 1, sz + 1];
                for stencil in stencils(cell_lod) {
                    stats.transition_cells += 1;
                    let points = stencil.map(|code| decode(centre, code));

                    let mut case = 0usize;
                    for (i, p) in points.iter().enumerate() {
                        if grid.value(p[0], p[1], p[2]) < 0.0 {
                            case |= 1 << i;
                        }
                    }
                    if case == 0 || case == 255 {
                        continue;
                    }
                    stats.active_cells += 1;

                    let mut cell_vertices = [NO_VERTEX; 12];
                    for (e, [a, b]) in EDGE_CONNECTIONS.iter().enumerate() {
                        if EDGE_TABLE[case] & (1 << e) != 0 {
                            cell_vertices[e] = edge_vertex(points[*a], points[*b], mesh, stats);
                        }
                    }

                    for tri in TRI_TABLE[case].chunks_exact(3).take_while(|t| t[0] >= 0) {
                        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|e| cell_vertices[e as usize]);
                        if !mesh.push_triangle(a, c, b) {
                            stats.aliased_triangles += 1;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    let local = [x, y, z];
                    let p = decode([5, 7, 9], encode(local));
                    assert_eq!(p, [4 + x, 6 + y, 8 + z]);
                }
            }
        }
    }

    #[test]
    fn test_empty_mask_has_no_cells() {
        assert!(stencils(0).is_empty());
    }

    #[test]
    fn test_single_face_mask() {
        // -x: each fine cell at x = 0 keeps its x = 1 face and has its
        // x = 0 face pulled onto the coarse lattice.
        let cells = stencils(1);
        assert_eq!(cells.len(), 4);
        for cell in cells {
            for code in cell {
                let p = decode([1, 1, 1], *code);
                if p[0] == 0 {
                    assert_eq!(p[1] % 2, 0);
                    assert_eq!(p[2] % 2, 0);
                }
            }
        }
    }

    #[test]
    fn test_cell_counts_cover_trimmed_layer() {
        // Every fine cell touching an active face is either kept or a
        // zero-volume sliver; kept cells fill the trimmed layer exactly.
        for mask in 1..64u8 {
            let total: f32 = stencils(mask)
                .iter()
                .map(|cell| {
                    let pts = cell.map(|c| {
                        let p = decode([1, 1, 1], c);
                        Vec3::new(p[0] as f32, p[1] as f32, p[2] as f32)
                    });
                    hex_volume(&pts)
                })
                .sum();

            let mut trimmed = 0;
            for cx in 0..2usize {
                for cy in 0..2usize {
                    for cz in 0..2usize {
                        let cell = [cx, cy, cz];
                        if (0..3).any(|a| {
                            (mask & (1 << (2 * a)) != 0 && cell[a] == 0)
                                || (mask & (2 << (2 * a)) != 0 && cell[a] == 1)
                        }) {
                            trimmed += 1;
                        }
                    }
                }
            }
            assert!(
                (total - trimmed as f32).abs() < 1e-4,
                "mask {:#04x}: volume {} vs {} cells",
                mask,
                total,
                trimmed
            );
        }
    }

    #[test]
    fn test_hex_volume_unit_cube() {
        let pts = CORNER_OFFSETS.map(|o| Vec3::new(o[0] as f32, o[1] as f32, o[2] as f32));
        assert!((hex_volume(&pts) - 1.0).abs() < 1e-6);
    }
}
