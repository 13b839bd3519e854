//! Extraction errors
//!
//! Degenerate geometry (aliased triangles, out-of-cell QEF vertices, inactive
//! cells) is handled inline and only counted in [`ExtractStats`]. The variants
//! here cover inputs the extractors refuse to work with.
//!
//! [`ExtractStats`]: crate::mesh::ExtractStats

use glam::Vec3;
use thiserror::Error;

/// Extraction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// Chunk parameters the extractors cannot honour
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// Seam stitching needs a neighbour chunk that is not available yet
    #[error("Missing neighbour chunk at octant {octant:#05b}")]
    MissingNeighbor {
        /// Octant mask of the neighbour (bit 1 = +x, 2 = +y, 4 = +z)
        octant: u8,
    },

    /// The scalar field produced NaN or infinity
    #[error("Non-finite sample at ({}, {}, {})", position.x, position.y, position.z)]
    NonFiniteSample {
        /// World-space position of the offending sample
        position: Vec3,
    },
}

impl ExtractError {
    /// Shorthand for [`ExtractError::UnsupportedConfiguration`]
    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        ExtractError::UnsupportedConfiguration(msg.into())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ExtractError>;
