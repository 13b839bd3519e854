//! Integration tests: LOD transition cells
//!
//! Faces flagged in the LOD code are meshed on the coarse lattice. The
//! result must stay a clean surface: no edge shared by more than two
//! triangles, consistent orientation, and open edges only on the chunk's
//! own faces.

mod common;

use std::collections::BTreeSet;

use common::*;
use isochunk::prelude::*;

const LOD_CODES: [u8; 10] = [1, 2, 3, 5, 9, 12, 17, 21, 42, 63];

fn check_topology<F: Fn(Vec3) -> f32 + Sync>(field: &F, resolution: usize, name: &str) {
    for bits in LOD_CODES {
        let chunk = ChunkConfig::new(resolution, Vec3::ZERO).with_lod(LodCode::new(bits).unwrap());
        let out = polygonize(field, &chunk, &MarchingCubesConfig::default()).unwrap();
        assert!(!out.mesh.is_empty(), "{} lod {:#04x}: empty mesh", name, bits);
        assert!(out.stats.transition_cells > 0);

        for (edge, n) in edge_counts(&out.mesh) {
            assert!(n <= 2, "{} lod {:#04x}: edge {:?} used {} times", name, bits, edge, n);
        }
        for (edge, n) in directed_edge_counts(&out.mesh) {
            assert_eq!(n, 1, "{} lod {:#04x}: directed edge {:?} repeated", name, bits, edge);
        }
        for (a, b) in boundary_edges(&out.mesh) {
            let pa = out.mesh.vertices[a as usize].position;
            let pb = out.mesh.vertices[b as usize].position;
            assert!(
                on_chunk_face(pa, pb, chunk.extent()),
                "{} lod {:#04x}: open edge {:?} - {:?} inside the chunk",
                name,
                bits,
                pa,
                pb
            );
        }
    }
}

// ============================================================================
// Trimming
// ============================================================================

#[test]
fn neg_x_face_moves_to_coarse_lattice() {
    let field = plane_y(4.5);
    let chunk = ChunkConfig::new(8, Vec3::ZERO).with_lod(LodCode::from_faces(&[Face::NegX]));
    let out = polygonize(&field, &chunk, &MarchingCubesConfig::default()).unwrap();

    assert!(out.main_vertices().iter().all(|v| v.position.x != 0.0));

    let on_face: Vec<Vec3> = out
        .transition_vertices()
        .iter()
        .map(|v| v.position)
        .filter(|p| p.x == 0.0)
        .collect();
    assert_eq!(on_face.len(), 5);
    for p in on_face {
        assert_eq!(p.y, 4.5);
        assert_eq!(p.z % 2.0, 0.0, "face vertex {:?} off the coarse lattice", p);
    }
}

#[test]
fn unflagged_chunk_has_no_transition_output() {
    let field = plane_y(4.5);
    let out = polygonize(&field, &ChunkConfig::new(8, Vec3::ZERO), &MarchingCubesConfig::default()).unwrap();
    assert_eq!(out.stats.transition_cells, 0);
    assert!(out.transition_vertices().is_empty());
    assert!(out.mesh.vertices.iter().any(|v| v.position.x == 0.0));
}

#[test]
fn transition_vertices_lie_on_surface() {
    let field = plane_y(4.5);
    let chunk = ChunkConfig::new(8, Vec3::ZERO).with_lod(LodCode::ALL);
    let out = polygonize(&field, &chunk, &MarchingCubesConfig::default()).unwrap();
    assert!(!out.transition_vertices().is_empty());
    for v in out.transition_vertices() {
        assert_eq!(v.position.y, 4.5);
        assert!(v.normal.dot(Vec3::Y) > 0.99);
        assert!((v.normal.length() - 1.0).abs() < 1e-4, "normal {:?} not unit", v.normal);
    }
}

#[test]
fn small_chunk_rejects_lod() {
    let field = plane_y(1.5);
    let chunk = ChunkConfig::new(2, Vec3::ZERO).with_lod(LodCode::from_faces(&[Face::PosZ]));
    let result = polygonize(&field, &chunk, &MarchingCubesConfig::default());
    assert!(matches!(result, Err(ExtractError::UnsupportedConfiguration(_))));
}

// ============================================================================
// Coarser neighbour
// ============================================================================

/// World positions of open-edge vertices lying on `axis = plane` inside the
/// fine chunk's `[0, 8]` face square, on a 1/1024 grid
fn face_rim(out: &MarchingCubesMesh, origin: Vec3, axis: usize, plane: f32) -> BTreeSet<[i32; 3]> {
    let on_face = |p: Vec3| {
        (p[axis] - plane).abs() < 1e-5 && (0..3).filter(|&k| k != axis).all(|k| p[k] >= -1e-5 && p[k] <= 8.0 + 1e-5)
    };
    let mut rim = BTreeSet::new();
    for (a, b) in boundary_edges(&out.mesh) {
        let pa = origin + out.mesh.vertices[a as usize].position;
        let pb = origin + out.mesh.vertices[b as usize].position;
        if on_face(pa) && on_face(pb) {
            for p in [pa, pb] {
                rim.insert((p * 1024.0).round().as_ivec3().to_array());
            }
        }
    }
    rim
}

fn check_against_coarse_neighbour(face: Face, coarse_origin: Vec3, axis: usize, plane: f32) {
    let field = sphere(Vec3::splat(4.0), 5.3);
    let config = MarchingCubesConfig::default();

    let fine_chunk = ChunkConfig::new(8, Vec3::ZERO).with_lod(LodCode::from_faces(&[face]));
    let fine = polygonize(&field, &fine_chunk, &config).unwrap();
    let coarse_chunk = ChunkConfig::new(8, coarse_origin).with_scale(2.0);
    let coarse = polygonize(&field, &coarse_chunk, &config).unwrap();

    let fine_rim = face_rim(&fine, fine_chunk.origin, axis, plane);
    let coarse_rim = face_rim(&coarse, coarse_chunk.origin, axis, plane);
    assert!(!fine_rim.is_empty(), "{:?}: no surface on the shared face", face);
    assert_eq!(fine_rim, coarse_rim, "{:?}: fine and coarse rims differ", face);
}

#[test]
fn neg_x_rim_matches_coarse_neighbour() {
    check_against_coarse_neighbour(Face::NegX, Vec3::new(-16.0, 0.0, 0.0), 0, 0.0);
}

#[test]
fn pos_z_rim_matches_coarse_neighbour() {
    check_against_coarse_neighbour(Face::PosZ, Vec3::new(0.0, 0.0, 8.0), 2, 8.0);
}

// ============================================================================
// Topology
// ============================================================================

#[test]
fn plane_topology_across_lod_codes() {
    check_topology(&plane_y(4.5), 8, "plane");
}

#[test]
fn tilted_plane_topology_across_lod_codes() {
    let field = tilted_plane(Vec3::new(4.1, 4.3, 3.9), Vec3::new(1.0, 2.0, 3.0));
    check_topology(&field, 8, "tilted plane");
}

#[test]
fn sphere_topology_across_lod_codes() {
    check_topology(&sphere(Vec3::splat(8.0), 9.0), 16, "large sphere");
    check_topology(&sphere(Vec3::new(3.0, 9.0, 5.0), 7.3), 16, "offset sphere");
}

#[test]
fn zero_density_points_share_one_vertex() {
    // x + y = 8 passes through lattice points in every boundary layer
    let field = tilted_plane(Vec3::splat(4.0), Vec3::new(1.0, 1.0, 0.0));
    check_topology(&field, 8, "diagonal plane");

    for bits in LOD_CODES {
        let chunk = ChunkConfig::new(8, Vec3::ZERO).with_lod(LodCode::new(bits).unwrap());
        let out = polygonize(&field, &chunk, &MarchingCubesConfig::default()).unwrap();
        assert!(out.stats.aliased_triangles > 0);
        for t in out.mesh.triangles() {
            assert!(face_normal(&out.mesh, t).length() > 1e-6, "lod {:#04x}: zero-area triangle {:?}", bits, t);
        }
        let mut seen = BTreeSet::new();
        for v in &out.mesh.vertices {
            let key = v.position.to_array().map(f32::to_bits);
            assert!(seen.insert(key), "lod {:#04x}: duplicate vertex at {:?}", bits, v.position);
        }
    }
}
