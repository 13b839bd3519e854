//! Mesh extraction for chunked scalar fields
//!
//! # Extractors
//!
//! - **Marching Cubes** (`marching_cubes`): one shared vertex per crossed
//!   lattice edge, 256-case triangulation, LOD trimming plus transition
//!   cells (`transition`) on faces that border a coarser chunk.
//!
//! - **Dual Contouring** (`dual_contouring`): one QEF-placed vertex per
//!   active cell, quads around every crossed interior edge. The per-cell
//!   [`DrawInfo`] grid is kept for seam stitching (`seam`).
//!
//! Both produce a [`Mesh`] with chunk-local positions scaled by the chunk's
//! cell size, unit normals, and counter-clockwise triangles seen from the
//! outside (the side the field gradient points to).

pub mod dual_contouring;
pub mod hermite;
pub mod marching_cubes;
pub mod seam;
pub mod tables;
pub mod transition;

pub use dual_contouring::{contour, contour_grid, DrawInfo, DrawInfoGrid, DualContouringConfig, DualContouringMesh};
pub use hermite::{approximate_zero_crossing, HermitePoint};
pub use marching_cubes::{
    crossing_fraction, interpolate_crossing, polygonize, polygonize_grid, MarchingCubesConfig,
    MarchingCubesMesh,
};
pub use seam::{stitch_seam, Acceptance, NeighborLookup, SeamNode};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Chunk-local position, already multiplied by the cell size
    pub position: Vec3,
    /// Unit surface normal
    pub normal: Vec3,
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Vertex { position, normal }
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Mesh vertices
    pub vertices: Vec<Vertex>,
    /// Triangle indices, three per face
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// True when no triangle was emitted
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex positions in index order
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().map(|v| v.position)
    }

    /// Vertex normals in index order
    pub fn normals(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().map(|v| v.normal)
    }

    /// Triangles as index triples
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// Append a vertex, returning its index
    #[inline(always)]
    pub(crate) fn push_vertex(&mut self, position: Vec3, normal: Vec3) -> u32 {
        let index = self.vertices.len() as u32;
        self.vertices.push(Vertex::new(position, normal));
        index
    }

    /// Append a triangle unless two of its indices alias
    ///
    /// Returns `false` when the triangle was dropped.
    #[inline(always)]
    pub(crate) fn push_triangle(&mut self, a: u32, b: u32, c: u32) -> bool {
        if a == b || b == c || a == c {
            return false;
        }
        self.indices.extend_from_slice(&[a, b, c]);
        true
    }

    /// Append `other`, offsetting its indices
    pub fn append(&mut self, other: &Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }
}

/// Per-call extraction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    /// Cells with a case code other than 0 and 255
    pub active_cells: usize,
    /// Vertices emitted by the main pass
    pub main_vertices: usize,
    /// Vertices emitted by the transition pass
    pub transition_vertices: usize,
    /// Transition cells evaluated
    pub transition_cells: usize,
    /// Triangles dropped because two indices aliased
    pub aliased_triangles: usize,
    /// QEF solutions outside their cell, replaced by the mass point
    pub mass_point_fallbacks: usize,
    /// Cells with more sign changes than the crossing cap
    pub capped_cells: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_triangle_drops_aliased() {
        let mut mesh = Mesh::new();
        let a = mesh.push_vertex(Vec3::ZERO, Vec3::Y);
        let b = mesh.push_vertex(Vec3::X, Vec3::Y);
        let c = mesh.push_vertex(Vec3::Z, Vec3::Y);
        assert!(mesh.push_triangle(a, b, c));
        assert!(!mesh.push_triangle(a, b, a));
        assert!(!mesh.push_triangle(c, c, b));
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.triangles().next(), Some([0, 1, 2]));
    }

    #[test]
    fn test_append_offsets_indices() {
        let mut a = Mesh::new();
        for p in [Vec3::ZERO, Vec3::X, Vec3::Y] {
            a.push_vertex(p, Vec3::Z);
        }
        a.push_triangle(0, 1, 2);
        let b = a.clone();
        a.append(&b);
        assert_eq!(a.vertex_count(), 6);
        assert_eq!(a.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(a.positions().nth(4), Some(Vec3::X));
    }
}
