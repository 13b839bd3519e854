//! Integration tests: Dual contouring seams
//!
//! Eight chunks meet at the owner's far corner. The owner's uniform mesh
//! plus its seam must tile the surface without gaps.

mod common;

use std::collections::HashMap;

use common::*;
use isochunk::prelude::*;

const RES: usize = 8;

fn octant_origin(octant: u8) -> Vec3 {
    Vec3::new(
        (octant & 1) as f32,
        ((octant >> 1) & 1) as f32,
        ((octant >> 2) & 1) as f32,
    ) * RES as f32
}

/// Owner first, then octants 1..=7
fn extract_block<F: Fn(Vec3) -> f32 + Sync>(field: &F) -> Vec<DualContouringMesh> {
    let chunks: Vec<ChunkConfig> = (0..8u8).map(|o| ChunkConfig::new(RES, octant_origin(o))).collect();
    let algorithm = Algorithm::DualContouring(DualContouringConfig::default());
    extract_chunks(field, &chunks, &algorithm)
        .into_iter()
        .map(|r| match r.unwrap() {
            ChunkSurface::DualContouring(m) => m,
            ChunkSurface::MarchingCubes(_) => unreachable!(),
        })
        .collect()
}

fn neighbors_of(block: &[DualContouringMesh]) -> [Option<&DrawInfoGrid>; 7] {
    std::array::from_fn(|i| Some(&block[i + 1].draw_infos))
}

#[test]
fn plane_seam_fills_the_far_faces() {
    let field = plane_y(3.5);
    let block = extract_block(&field);
    let own = &block[0];

    // 7 × 7 quads inside the owner
    assert_eq!(own.mesh.triangle_count(), 98);

    let seam = stitch_seam(&own.draw_infos, &neighbors_of(&block)).unwrap();
    // 8 quads along x = 7, 7 more along z = 7
    assert_eq!(seam.triangle_count(), 30);
    assert_eq!(seam.vertex_count(), 32);
    assert_eq!(own.mesh.triangle_count() + seam.triangle_count(), 2 * RES * RES);

    for v in &seam.vertices {
        assert!((v.position.y - 3.5).abs() < 1e-4, "{:?}", v);
        assert!(v.position.x < 9.0 && v.position.z < 9.0);
        assert!((v.normal - Vec3::Y).length() < 1e-3);
    }
    for t in seam.triangles() {
        assert!(face_normal(&seam, t).y > 0.0, "seam triangle {:?} faces down", t);
    }
}

#[test]
fn seam_joins_the_uniform_mesh() {
    let field = plane_y(3.5);
    let block = extract_block(&field);
    let own = &block[0];
    let seam = stitch_seam(&own.draw_infos, &neighbors_of(&block)).unwrap();

    // Weld by position; the joined sheet is open only on its outer rim.
    let mut joined = own.mesh.clone();
    joined.append(&seam);
    let mut welded: HashMap<[u32; 3], u32> = HashMap::new();
    let mut remap = Vec::with_capacity(joined.vertex_count());
    for v in &joined.vertices {
        let key = v.position.to_array().map(f32::to_bits);
        let next = welded.len() as u32;
        remap.push(*welded.entry(key).or_insert(next));
    }
    joined.indices = joined.indices.iter().map(|&i| remap[i as usize]).collect();

    for (edge, n) in edge_counts(&joined) {
        assert!(n <= 2, "edge {:?} used {} times", edge, n);
    }
    // 9 × 9 vertex sheet, 8 rim edges per side
    let rim = boundary_edges(&joined).len();
    assert_eq!(rim, 4 * RES);
}

#[test]
fn map_lookup_matches_array_lookup() {
    let field = tilted_plane(Vec3::new(6.5, 7.2, 6.9), Vec3::new(1.0, 3.0, 2.0));
    let block = extract_block(&field);
    let map: HashMap<u8, &DrawInfoGrid> = (1..8u8).map(|o| (o, &block[o as usize].draw_infos)).collect();

    let from_array = stitch_seam(&block[0].draw_infos, &neighbors_of(&block)).unwrap();
    let from_map = stitch_seam(&block[0].draw_infos, &map).unwrap();
    assert!(!from_array.is_empty());
    assert_eq!(from_array, from_map);
}

#[test]
fn interior_surface_needs_no_neighbours() {
    let field = sphere(Vec3::splat(4.0), 2.5);
    let own = contour(&field, &ChunkConfig::new(RES, Vec3::ZERO), &DualContouringConfig::default()).unwrap();
    let none: [Option<&DrawInfoGrid>; 7] = [None; 7];
    let seam = stitch_seam(&own.draw_infos, &none).unwrap();
    assert!(seam.is_empty());
}

#[test]
fn missing_neighbour_defers_the_seam() {
    let field = plane_y(3.5);
    let block = extract_block(&field);
    let mut neighbors: [Option<&DrawInfoGrid>; 7] = [None; 7];
    neighbors[0] = Some(&block[1].draw_infos);

    let result = stitch_seam(&block[0].draw_infos, &neighbors);
    assert_eq!(result, Err(ExtractError::MissingNeighbor { octant: 0b100 }));
}

#[test]
fn mismatched_resolution_is_rejected() {
    let field = plane_y(3.5);
    let block = extract_block(&field);
    let coarse = contour(
        &field,
        &ChunkConfig::new(RES / 2, octant_origin(1)).with_scale(2.0),
        &DualContouringConfig::default(),
    )
    .unwrap();

    let mut neighbors = neighbors_of(&block);
    neighbors[0] = Some(&coarse.draw_infos);
    let result = stitch_seam(&block[0].draw_infos, &neighbors);
    assert!(matches!(result, Err(ExtractError::UnsupportedConfiguration(_))));
}
