//! Parallel extraction over many chunks
//!
//! Chunks are independent, so a batch is a plain `par_iter` over their
//! configurations. Each chunk gets its own grid and its own result; one
//! failing chunk does not abort the others.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::chunk::ChunkConfig;
use crate::error::Result;
use crate::field::ScalarField;
use crate::mesh::{
    contour, polygonize, DualContouringConfig, DualContouringMesh, ExtractStats, MarchingCubesConfig,
    MarchingCubesMesh, Mesh,
};

/// Extractor and its settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Algorithm {
    /// Marching cubes with LOD transition cells
    MarchingCubes(MarchingCubesConfig),
    /// Dual contouring; seams are stitched separately
    DualContouring(DualContouringConfig),
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::MarchingCubes(MarchingCubesConfig::default())
    }
}

/// Output of one chunk
#[derive(Debug, Clone)]
pub enum ChunkSurface {
    /// Marching cubes result
    MarchingCubes(MarchingCubesMesh),
    /// Dual contouring result, with draw info for seams
    DualContouring(DualContouringMesh),
}

impl ChunkSurface {
    /// The chunk's triangles
    pub fn mesh(&self) -> &Mesh {
        match self {
            ChunkSurface::MarchingCubes(m) => &m.mesh,
            ChunkSurface::DualContouring(m) => &m.mesh,
        }
    }

    /// Counters from extraction
    pub fn stats(&self) -> &ExtractStats {
        match self {
            ChunkSurface::MarchingCubes(m) => &m.stats,
            ChunkSurface::DualContouring(m) => &m.stats,
        }
    }
}

/// Extract one chunk
pub fn extract_chunk<F: ScalarField + ?Sized>(
    field: &F,
    chunk: &ChunkConfig,
    algorithm: &Algorithm,
) -> Result<ChunkSurface> {
    match algorithm {
        Algorithm::MarchingCubes(config) => polygonize(field, chunk, config).map(ChunkSurface::MarchingCubes),
        Algorithm::DualContouring(config) => contour(field, chunk, config).map(ChunkSurface::DualContouring),
    }
}

/// Extract every chunk in parallel, results in input order
pub fn extract_chunks<F: ScalarField + ?Sized>(
    field: &F,
    chunks: &[ChunkConfig],
    algorithm: &Algorithm,
) -> Vec<Result<ChunkSurface>> {
    let results: Vec<Result<ChunkSurface>> = chunks
        .par_iter()
        .map(|chunk| extract_chunk(field, chunk, algorithm))
        .collect();

    log::debug!(
        "batch: {} chunks, {} failed",
        results.len(),
        results.iter().filter(|r| r.is_err()).count()
    );
    results
}
