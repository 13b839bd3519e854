//! Chunk parameters
//!
//! A chunk is a cube of `resolution³` cells placed at a world-space origin
//! with a uniform cell size. The [`LodCode`] marks the faces that border a
//! coarser neighbour; marching cubes trims those faces from its main pass
//! and stitches them with transition cells instead.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

// ----------------------------------------------------------------------------
// Faces and LOD codes
// ----------------------------------------------------------------------------

/// One of the six faces of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    /// x = 0
    NegX,
    /// x = resolution
    PosX,
    /// y = 0
    NegY,
    /// y = resolution
    PosY,
    /// z = 0
    NegZ,
    /// z = resolution
    PosZ,
}

impl Face {
    /// All faces in bit order
    pub const ALL: [Face; 6] = [
        Face::NegX,
        Face::PosX,
        Face::NegY,
        Face::PosY,
        Face::NegZ,
        Face::PosZ,
    ];

    /// LOD code bit for this face
    #[inline(always)]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Axis normal to this face (0 = x, 1 = y, 2 = z)
    #[inline(always)]
    pub const fn axis(self) -> usize {
        (self as usize) >> 1
    }

    /// True for the face at the maximum coordinate
    #[inline(always)]
    pub const fn is_max(self) -> bool {
        (self as u8) & 1 == 1
    }
}

/// Six-bit mask of faces bordering a coarser neighbour
///
/// Bit layout: `1` = −x, `2` = +x, `4` = −y, `8` = +y, `16` = −z, `32` = +z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LodCode(u8);

impl LodCode {
    /// No coarser neighbours
    pub const NONE: LodCode = LodCode(0);
    /// Every face borders a coarser neighbour
    pub const ALL: LodCode = LodCode(0x3f);

    /// Build from raw bits, rejecting anything above bit 5
    pub fn new(bits: u8) -> Result<Self> {
        if bits > Self::ALL.0 {
            return Err(ExtractError::unsupported(format!(
                "LOD code {:#04x} uses bits outside the six face flags",
                bits
            )));
        }
        Ok(LodCode(bits))
    }

    /// Build from raw bits, dropping unknown ones
    #[inline]
    pub const fn from_bits_truncate(bits: u8) -> Self {
        LodCode(bits & 0x3f)
    }

    /// Build from a list of faces
    pub fn from_faces(faces: &[Face]) -> Self {
        faces.iter().fold(LodCode::NONE, |code, &f| code.with(f))
    }

    /// Raw bits
    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True when no face is flagged
    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when `face` is flagged
    #[inline(always)]
    pub const fn contains(self, face: Face) -> bool {
        self.0 & face.bit() != 0
    }

    /// Copy with `face` flagged
    #[inline]
    pub const fn with(self, face: Face) -> Self {
        LodCode(self.0 | face.bit())
    }

    /// True when the minimum face along `axis` is flagged
    #[inline(always)]
    pub const fn trims_min(self, axis: usize) -> bool {
        self.0 & (1 << (axis * 2)) != 0
    }

    /// True when the maximum face along `axis` is flagged
    #[inline(always)]
    pub const fn trims_max(self, axis: usize) -> bool {
        self.0 & (2 << (axis * 2)) != 0
    }

    /// Iterate over flagged faces
    pub fn faces(self) -> impl Iterator<Item = Face> {
        Face::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

// ----------------------------------------------------------------------------
// Chunk configuration
// ----------------------------------------------------------------------------

/// Placement and resolution of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Cells per axis (power of two, at least 2)
    pub resolution: usize,
    /// World-space position of lattice point (0, 0, 0)
    pub origin: Vec3,
    /// World units per cell
    pub scale_factor: f32,
    /// Faces bordering a coarser neighbour
    pub lod: LodCode,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        ChunkConfig {
            resolution: 16,
            origin: Vec3::ZERO,
            scale_factor: 1.0,
            lod: LodCode::NONE,
        }
    }
}

impl ChunkConfig {
    /// Chunk with the given resolution at `origin`, unit cells, no LOD faces
    pub fn new(resolution: usize, origin: Vec3) -> Self {
        ChunkConfig {
            resolution,
            origin,
            ..Default::default()
        }
    }

    /// Builder: set the cell size
    pub fn with_scale(mut self, scale_factor: f32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Builder: set the LOD code
    pub fn with_lod(mut self, lod: LodCode) -> Self {
        self.lod = lod;
        self
    }

    /// Reject parameters the extractors cannot honour
    pub fn validate(&self) -> Result<()> {
        let res = self.resolution;
        if res < 2 || !res.is_power_of_two() {
            return Err(ExtractError::unsupported(format!(
                "resolution {} must be a power of two >= 2",
                res
            )));
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(ExtractError::unsupported(format!(
                "scale factor {} must be finite and positive",
                self.scale_factor
            )));
        }
        if !self.origin.is_finite() {
            return Err(ExtractError::unsupported("chunk origin must be finite"));
        }
        if self.lod.bits() > LodCode::ALL.bits() {
            return Err(ExtractError::unsupported(format!(
                "LOD code {:#04x} uses bits outside the six face flags",
                self.lod.bits()
            )));
        }
        if !self.lod.is_empty() && res < 4 {
            return Err(ExtractError::unsupported(format!(
                "LOD code {:#04x} needs resolution >= 4 for transition cells, got {}",
                self.lod.bits(),
                res
            )));
        }
        Ok(())
    }

    /// World-space position of a chunk-local lattice point
    #[inline(always)]
    pub fn world_position(&self, lattice: Vec3) -> Vec3 {
        self.origin + lattice * self.scale_factor
    }

    /// World-space size of the chunk along each axis
    #[inline]
    pub fn extent(&self) -> f32 {
        self.resolution as f32 * self.scale_factor
    }
}
