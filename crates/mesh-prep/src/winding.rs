//! Normal consistency and winding order correction.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::Mesh;
use crate::adjacency::{MeshAdjacency, face_edges};
use crate::components::find_connected_components;

/// Fix winding order so all faces in a component have consistent orientation.
///
/// Uses BFS flood fill from the lowest-indexed unvisited face in each
/// connected component; that seed keeps its orientation. For each face,
/// shared edges must be traversed in opposite directions, and neighbors that
/// disagree are flipped.
///
/// Returns the number of faces flipped.
pub fn fix_winding_order(mesh: &mut Mesh) -> usize {
    if mesh.faces.is_empty() {
        return 0;
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let face_count = mesh.faces.len();

    let mut visited = vec![false; face_count];
    let mut flipped = vec![false; face_count];
    let mut component_count = 0;
    let mut queue: VecDeque<usize> = VecDeque::new();

    for seed in 0..face_count {
        if visited[seed] {
            continue;
        }

        component_count += 1;
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(face_idx) = queue.pop_front() {
            // Orientation this face will end up with.
            let mut face = mesh.faces[face_idx];
            if flipped[face_idx] {
                face.swap(1, 2);
            }

            for (v0, v1) in face_edges(&face) {
                for edge_use in adjacency.edge_uses(v0, v1) {
                    let neighbor_idx = edge_use.face;
                    if visited[neighbor_idx] {
                        continue;
                    }
                    visited[neighbor_idx] = true;

                    // The neighbor must walk v1 -> v0; walking v0 -> v1 means flip it.
                    flipped[neighbor_idx] = edge_use.traverses(v0, v1);
                    queue.push_back(neighbor_idx);
                }
            }
        }
    }

    let mut total_flipped = 0;
    for (face, &flip) in mesh.faces.iter_mut().zip(&flipped) {
        if flip {
            face.swap(1, 2);
            total_flipped += 1;
        }
    }

    if total_flipped > 0 {
        info!(
            "Fixed winding order: flipped {} faces across {} component(s)",
            total_flipped, component_count
        );
    } else {
        debug!(
            "Winding order already consistent across {} component(s)",
            component_count
        );
    }

    total_flipped
}

/// Flip closed components whose signed volume is negative so their normals
/// point outward. Open components are left alone since their volume is not
/// meaningful.
///
/// Expects consistent winding within each component (see
/// [`fix_winding_order`]). Returns the number of faces flipped.
pub fn orient_outward(mesh: &mut Mesh) -> usize {
    let analysis = find_connected_components(mesh);
    let mut total_flipped = 0;

    for component in &analysis.components {
        let faces: Vec<[u32; 3]> = component.iter().map(|&f| mesh.faces[f]).collect();
        if !MeshAdjacency::build(&faces).is_watertight() {
            continue;
        }

        if signed_volume_of(mesh, &faces) < 0.0 {
            for &f in component {
                mesh.faces[f].swap(1, 2);
            }
            total_flipped += component.len();
            debug!(
                "Component with {} faces was inside-out, flipped",
                component.len()
            );
        }
    }

    if total_flipped > 0 {
        info!("Oriented normals outward: flipped {} faces", total_flipped);
    }

    total_flipped
}

fn signed_volume_of(mesh: &Mesh, faces: &[[u32; 3]]) -> f64 {
    faces
        .iter()
        .map(|&[i0, i1, i2]| {
            let v0 = &mesh.vertices[i0 as usize].position.coords;
            let v1 = &mesh.vertices[i1 as usize].position.coords;
            let v2 = &mesh.vertices[i2 as usize].position.coords;
            v0.dot(&v1.cross(v2))
        })
        .sum::<f64>()
        / 6.0
}
