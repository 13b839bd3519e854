//! Dual contouring seams between chunks
//!
//! Uniform assembly skips every crossed far edge whose surrounding cells
//! spill over the chunk's `+x`, `+y` or `+z` faces. Those quads need draw
//! info from up to seven neighbouring chunks, addressed by octant mask
//! (bit 1 = +x, 2 = +y, 4 = +z).
//!
//! The owning chunk and its neighbours are gathered into one [`SeamNode`]
//! tree over a `2 * resolution` block. Each chunk contributes only the cells
//! a seam quad can touch, selected by an immutable [`Acceptance`] mask:
//! the owner's cells on its far faces, and the neighbours' cells on the
//! faces shared with the owner.
//!
//! Stitching is only defined between chunks of equal resolution.

use std::collections::HashMap;

use glam::Vec3;

use crate::error::{ExtractError, Result};
use crate::mesh::dual_contouring::{emit_quad, far_edge_crossing, DrawInfo, DrawInfoGrid};
use crate::mesh::tables::{FAR_EDGE_CELL_OFFSETS, FAR_EDGE_MAX_OFFSET};
use crate::mesh::{ExtractStats, Mesh};

/// Access to the draw info of neighbouring chunks
///
/// `octant` is 1..=7. Returning `None` means the neighbour does not exist
/// or has not finished extracting; stitching then reports
/// [`ExtractError::MissingNeighbor`] and should be retried later.
pub trait NeighborLookup {
    /// Draw info of the neighbour at `octant`
    fn neighbor(&self, octant: u8) -> Option<&DrawInfoGrid>;
}

/// Neighbours in octant order, slot `i` holding octant `i + 1`
impl<'a> NeighborLookup for [Option<&'a DrawInfoGrid>; 7] {
    fn neighbor(&self, octant: u8) -> Option<&DrawInfoGrid> {
        let slot = (octant as usize).checked_sub(1)?;
        self.get(slot).copied().flatten()
    }
}

/// Neighbours keyed by octant
impl<'a> NeighborLookup for HashMap<u8, &'a DrawInfoGrid> {
    fn neighbor(&self, octant: u8) -> Option<&DrawInfoGrid> {
        self.get(&octant).copied()
    }
}

#[inline(always)]
fn octant_offset(octant: u8) -> [usize; 3] {
    [
        (octant & 1) as usize,
        ((octant >> 1) & 1) as usize,
        ((octant >> 2) & 1) as usize,
    ]
}

// ── Acceptance masks ────────────────────────────────────────────────

/// Which cells of a chunk take part in the seam
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// The owning chunk: cells touching one of its far faces
    MaxFace,
    /// A neighbour: cells at coordinate 0 along every axis of the octant
    MinAlong(u8),
}

impl Acceptance {
    /// Mask for the chunk at `octant` (0 = owner)
    pub fn for_octant(octant: u8) -> Self {
        if octant == 0 {
            Acceptance::MaxFace
        } else {
            Acceptance::MinAlong(octant)
        }
    }

    /// True when the chunk-local cube `[min, min + size)` may hold accepted cells
    pub fn admits(self, min: [usize; 3], size: usize, resolution: usize) -> bool {
        match self {
            Acceptance::MaxFace => (0..3).any(|a| min[a] + size == resolution),
            Acceptance::MinAlong(octant) => (0..3).all(|a| octant & (1 << a) == 0 || min[a] == 0),
        }
    }
}

// ── Seam tree ───────────────────────────────────────────────────────

/// Node of the seam octree, coordinates in the `2 * resolution` block
#[derive(Debug, Clone)]
pub enum SeamNode<'a> {
    /// Cube `[min, min + size)` with its occupied octants
    Internal {
        /// Minimum cell of the cube
        min: [usize; 3],
        /// Edge length in cells
        size: usize,
        /// Children by octant (bit 1 = x, 2 = y, 4 = z)
        children: Box<[Option<SeamNode<'a>>; 8]>,
    },
    /// One active cell
    Leaf {
        /// Cell coordinate
        cell: [usize; 3],
        /// Draw info borrowed from the owning chunk's grid
        info: &'a DrawInfo,
    },
}

impl<'a> SeamNode<'a> {
    /// Tree over the owner (octant 0) and whichever neighbours are available
    pub fn build<L: NeighborLookup + ?Sized>(own: &'a DrawInfoGrid, neighbors: &'a L) -> Option<Self> {
        let res = own.resolution();
        let children: [Option<SeamNode<'a>>; 8] = std::array::from_fn(|o| {
            let octant = o as u8;
            let grid = if octant == 0 {
                Some(own)
            } else {
                neighbors.neighbor(octant)
            }?;
            let off = octant_offset(octant).map(|b| b * res);
            build_chunk(grid, Acceptance::for_octant(octant), [0; 3], res, off)
        });

        if children.iter().all(Option::is_none) {
            return None;
        }
        Some(SeamNode::Internal {
            min: [0; 3],
            size: 2 * res,
            children: Box::new(children),
        })
    }

    /// Draw info at `cell`, if that cell is in the tree
    pub fn find(&self, cell: [usize; 3]) -> Option<&'a DrawInfo> {
        match self {
            SeamNode::Leaf { cell: c, info } => (*c == cell).then_some(*info),
            SeamNode::Internal { min, size, children } => {
                if (0..3).any(|a| cell[a] < min[a] || cell[a] >= min[a] + size) {
                    return None;
                }
                let half = size / 2;
                let octant = (0..3).fold(0, |acc, a| acc | (((cell[a] - min[a] >= half) as usize) << a));
                children[octant].as_ref()?.find(cell)
            }
        }
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        match self {
            SeamNode::Leaf { .. } => 1,
            SeamNode::Internal { children, .. } => children.iter().flatten().map(SeamNode::leaf_count).sum(),
        }
    }

    /// Leaves inside `[min, max)`, in tree order
    pub fn leaves_within(&self, min: [usize; 3], max: [usize; 3], out: &mut Vec<([usize; 3], &'a DrawInfo)>) {
        match self {
            SeamNode::Leaf { cell, info } => {
                if (0..3).all(|a| cell[a] >= min[a] && cell[a] < max[a]) {
                    out.push((*cell, *info));
                }
            }
            SeamNode::Internal { min: m, size, children } => {
                if (0..3).any(|a| m[a] >= max[a] || m[a] + size <= min[a]) {
                    return;
                }
                for child in children.iter().flatten() {
                    child.leaves_within(min, max, out);
                }
            }
        }
    }
}

/// Subtree of one chunk's accepted cells
///
/// `min` and `size` are chunk-local; `offset` moves them into the block.
fn build_chunk<'a>(
    grid: &'a DrawInfoGrid,
    accept: Acceptance,
    min: [usize; 3],
    size: usize,
    offset: [usize; 3],
) -> Option<SeamNode<'a>> {
    let res = grid.resolution();
    if !accept.admits(min, size, res) {
        return None;
    }

    let global = [min[0] + offset[0], min[1] + offset[1], min[2] + offset[2]];
    if size == 1 {
        return grid.get(min).map(|info| SeamNode::Leaf { cell: global, info });
    }

    let half = size / 2;
    let children: [Option<SeamNode<'a>>; 8] = std::array::from_fn(|o| {
        let b = octant_offset(o as u8);
        let child = [min[0] + b[0] * half, min[1] + b[1] * half, min[2] + b[2] * half];
        build_chunk(grid, accept, child, half, offset)
    });

    if children.iter().all(Option::is_none) {
        return None;
    }
    Some(SeamNode::Internal {
        min: global,
        size,
        children: Box::new(children),
    })
}

// ── Stitching ───────────────────────────────────────────────────────

/// Quads across the owner's `+x`, `+y` and `+z` faces
///
/// Positions are in the owner's chunk-local space, scaled by its cell size.
/// Fails with [`ExtractError::MissingNeighbor`] as soon as a required
/// neighbour is unavailable; nothing partial is returned.
pub fn stitch_seam<L: NeighborLookup + ?Sized>(own: &DrawInfoGrid, neighbors: &L) -> Result<Mesh> {
    let res = own.resolution();
    for octant in 1..8u8 {
        if let Some(n) = neighbors.neighbor(octant) {
            if n.resolution() != res {
                return Err(ExtractError::unsupported(format!(
                    "seam between resolution {} and neighbour {:#05b} at resolution {}",
                    res,
                    octant,
                    n.resolution()
                )));
            }
            if n.scale_factor() != own.scale_factor() {
                return Err(ExtractError::unsupported(format!(
                    "seam between cell size {} and neighbour {:#05b} at cell size {}",
                    own.scale_factor(),
                    octant,
                    n.scale_factor()
                )));
            }
        }
    }

    let mut mesh = Mesh::new();
    let Some(tree) = SeamNode::build(own, neighbors) else {
        return Ok(mesh);
    };
    log::trace!("seam tree: {} leaves for resolution {}", tree.leaf_count(), res);

    let mut owned = Vec::new();
    tree.leaves_within([0; 3], [res; 3], &mut owned);

    let scale = own.scale_factor();
    let mut remap: HashMap<[usize; 3], u32> = HashMap::new();
    let mut stats = ExtractStats::default();

    for (cell, info) in owned {
        for edge in 0..3 {
            let max = FAR_EDGE_MAX_OFFSET[edge];
            if (0..3).all(|k| cell[k] + max[k] < res) {
                continue;
            }
            let Some(start_inside) = far_edge_crossing(info, edge) else {
                continue;
            };

            let mut vertices = [0u32; 4];
            let mut complete = true;
            let cells = std::iter::once([0; 3])
                .chain(FAR_EDGE_CELL_OFFSETS[edge].iter().copied())
                .map(|o| [cell[0] + o[0], cell[1] + o[1], cell[2] + o[2]]);

            for (slot, target) in vertices.iter_mut().zip(cells) {
                let octant = (0..3).fold(0u8, |acc, a| acc | (((target[a] >= res) as u8) << a));
                if octant != 0 && neighbors.neighbor(octant).is_none() {
                    log::warn!(
                        "seam deferred: cell {:?} needs neighbour {:#05b}",
                        cell,
                        octant
                    );
                    return Err(ExtractError::MissingNeighbor { octant });
                }

                match tree.find(target) {
                    Some(found) => {
                        *slot = *remap.entry(target).or_insert_with(|| {
                            let shift = Vec3::from_array(octant_offset(octant).map(|b| (b * res) as f32));
                            mesh.push_vertex((found.position + shift) * scale, found.average_normal)
                        });
                    }
                    None => complete = false,
                }
            }

            if complete {
                emit_quad(&mut mesh, &mut stats, edge, start_inside, vertices);
            }
        }
    }

    log::debug!(
        "seam: {} vertices, {} triangles ({} aliased)",
        mesh.vertex_count(),
        mesh.triangle_count(),
        stats.aliased_triangles
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkConfig;
    use crate::mesh::dual_contouring::{contour, DualContouringConfig};

    #[test]
    fn test_acceptance_masks() {
        let owner = Acceptance::for_octant(0);
        assert!(owner.admits([4, 0, 0], 4, 8));
        assert!(!owner.admits([0, 0, 0], 4, 8));
        assert!(owner.admits([7, 3, 2], 1, 8));
        assert!(!owner.admits([6, 3, 2], 1, 8));

        let xz = Acceptance::for_octant(5);
        assert!(xz.admits([0, 4, 0], 4, 8));
        assert!(!xz.admits([4, 0, 0], 4, 8));
        assert!(xz.admits([0, 7, 0], 1, 8));
        assert!(!xz.admits([0, 7, 1], 1, 8));
    }

    #[test]
    fn test_tree_find() {
        let field = |p: Vec3| p.y - 2.5;
        let dc = DualContouringConfig::default();
        let own = contour(&field, &ChunkConfig::new(4, Vec3::ZERO), &dc).unwrap();
        let px = contour(&field, &ChunkConfig::new(4, Vec3::new(4.0, 0.0, 0.0)), &dc).unwrap();

        let mut neighbors: [Option<&DrawInfoGrid>; 7] = [None; 7];
        neighbors[0] = Some(&px.draw_infos);
        let tree = SeamNode::build(&own.draw_infos, &neighbors).unwrap();

        // owner: y = 2 cells touching x = 3 or z = 3 -> 4 + 3
        // +x neighbour: y = 2 cells at x = 0 -> 4
        assert_eq!(tree.leaf_count(), 11);
        assert!(tree.find([3, 2, 1]).is_some());
        assert!(tree.find([1, 2, 1]).is_none());
        let found = tree.find([4, 2, 1]).unwrap();
        assert_eq!(found.index, px.draw_infos.get([0, 2, 1]).unwrap().index);
        assert!(tree.find([5, 2, 1]).is_none());
    }

    #[test]
    fn test_array_lookup() {
        let grid = DrawInfoGrid::new(2, 1.0);
        let mut neighbors: [Option<&DrawInfoGrid>; 7] = [None; 7];
        neighbors[6] = Some(&grid);
        assert!(neighbors.neighbor(7).is_some());
        assert!(neighbors.neighbor(1).is_none());
        assert!(neighbors.neighbor(0).is_none());
    }

    #[test]
    fn test_empty_owner_stitches_nothing() {
        let own = DrawInfoGrid::new(4, 1.0);
        let neighbors: [Option<&DrawInfoGrid>; 7] = [None; 7];
        let mesh = stitch_seam(&own, &neighbors).unwrap();
        assert!(mesh.is_empty());
    }
}
