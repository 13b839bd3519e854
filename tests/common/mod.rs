//! Common test helpers for isochunk integration tests

#![allow(dead_code)]

use std::collections::HashMap;

use isochunk::prelude::*;

// ============================================================================
// Standard test fields
// ============================================================================

/// Sphere, negative inside
pub fn sphere(center: Vec3, radius: f32) -> impl Fn(Vec3) -> f32 + Sync {
    move |p: Vec3| (p - center).length() - radius
}

/// Half-space below `y = height`
pub fn plane_y(height: f32) -> impl Fn(Vec3) -> f32 + Sync {
    move |p: Vec3| p.y - height
}

/// Plane through `point` with unit `normal`, negative behind it
pub fn tilted_plane(point: Vec3, normal: Vec3) -> impl Fn(Vec3) -> f32 + Sync {
    let n = normal.normalize();
    move |p: Vec3| (p - point).dot(n)
}

/// Axis-aligned box `[min, max]`, negative inside
pub fn box_field(min: Vec3, max: Vec3) -> impl Fn(Vec3) -> f32 + Sync {
    let center = (min + max) * 0.5;
    let half = (max - min) * 0.5;
    move |p: Vec3| {
        let q = (p - center).abs() - half;
        q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
    }
}

// ============================================================================
// Topology helpers
// ============================================================================

/// Uses of each undirected edge
pub fn edge_counts(mesh: &Mesh) -> HashMap<(u32, u32), usize> {
    let mut counts = HashMap::new();
    for [a, b, c] in mesh.triangles() {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            *counts.entry((u.min(v), u.max(v))).or_insert(0) += 1;
        }
    }
    counts
}

/// Uses of each directed edge
pub fn directed_edge_counts(mesh: &Mesh) -> HashMap<(u32, u32), usize> {
    let mut counts = HashMap::new();
    for [a, b, c] in mesh.triangles() {
        for e in [(a, b), (b, c), (c, a)] {
            *counts.entry(e).or_insert(0) += 1;
        }
    }
    counts
}

/// Edges used by exactly one triangle
pub fn boundary_edges(mesh: &Mesh) -> Vec<(u32, u32)> {
    edge_counts(mesh)
        .into_iter()
        .filter(|&(_, n)| n == 1)
        .map(|(e, _)| e)
        .collect()
}

/// True when both positions lie on the same face of the cube `[0, extent]³`
pub fn on_chunk_face(a: Vec3, b: Vec3, extent: f32) -> bool {
    const EPS: f32 = 1e-4;
    (0..3).any(|k| {
        let (x, y) = (a[k], b[k]);
        (x.abs() < EPS && y.abs() < EPS) || ((x - extent).abs() < EPS && (y - extent).abs() < EPS)
    })
}

/// Geometric normal of a triangle (unnormalised)
pub fn face_normal(mesh: &Mesh, tri: [u32; 3]) -> Vec3 {
    let [a, b, c] = tri.map(|i| mesh.vertices[i as usize].position);
    (b - a).cross(c - a)
}

/// Fraction of triangles whose winding agrees with their vertex normals
pub fn winding_agreement(mesh: &Mesh) -> f32 {
    if mesh.triangle_count() == 0 {
        return 1.0;
    }
    let agree = mesh
        .triangles()
        .filter(|&tri| {
            let n: Vec3 = tri.iter().map(|&i| mesh.vertices[i as usize].normal).sum();
            face_normal(mesh, tri).dot(n) > 0.0
        })
        .count();
    agree as f32 / mesh.triangle_count() as f32
}
