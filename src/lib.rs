//! # isochunk
//!
//! Chunked isosurface extraction from scalar density fields.
//!
//! Space is divided into cubic chunks of `resolution³` cells. Each chunk is
//! sampled on a regular lattice and meshed independently, so chunks can be
//! extracted in parallel and streamed in any order.
//!
//! ## Features
//!
//! - **Marching Cubes**: shared edge vertices, gradient normals, and LOD
//!   transition cells on faces that border a coarser chunk
//! - **Dual Contouring**: QEF-placed vertices that keep sharp features, with
//!   seam stitching across chunk boundaries
//! - **Batch**: rayon-parallel extraction over many chunks
//!
//! Inside is where the density is negative.
//!
//! ## Example
//!
//! ```rust
//! use isochunk::prelude::*;
//!
//! // Sphere of radius 6 centred in a 16³ chunk
//! let field = |p: Vec3| (p - Vec3::splat(8.0)).length() - 6.0;
//! let chunk = ChunkConfig::new(16, Vec3::ZERO);
//!
//! let mc = polygonize(&field, &chunk, &MarchingCubesConfig::default()).unwrap();
//! assert!(mc.mesh.triangle_count() > 0);
//!
//! let dc = contour(&field, &chunk, &DualContouringConfig::default()).unwrap();
//! assert_eq!(dc.draw_infos.resolution(), 16);
//! ```

#![warn(missing_docs)]

pub mod batch;
pub mod chunk;
pub mod error;
pub mod field;
pub mod grid;
pub mod mesh;
pub mod qef;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude - commonly used types and functions
pub mod prelude {
    pub use crate::batch::{extract_chunk, extract_chunks, Algorithm, ChunkSurface};
    pub use crate::chunk::{ChunkConfig, Face, LodCode};
    pub use crate::error::{ExtractError, Result};
    pub use crate::field::{surface_normal, ScalarField};
    pub use crate::grid::{DensityGrid, FillReport};
    pub use crate::mesh::{
        contour, contour_grid, polygonize, polygonize_grid, stitch_seam, DrawInfo, DrawInfoGrid,
        DualContouringConfig, DualContouringMesh, ExtractStats, MarchingCubesConfig,
        MarchingCubesMesh, Mesh, NeighborLookup, Vertex,
    };
    pub use crate::qef::QefSolver;
    pub use glam::Vec3;
}
