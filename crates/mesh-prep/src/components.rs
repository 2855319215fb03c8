//! Connected component analysis and small-component pruning.
//!
//! A connected component is a set of faces reachable from each other
//! through shared edges. Faces touching only at a vertex belong to
//! different components.

use std::cmp::Reverse;

use hashbrown::HashSet;
use tracing::{debug, info};

use crate::adjacency::MeshAdjacency;
use crate::types::Mesh;

/// Result of connected component analysis.
#[derive(Debug, Clone, Default)]
pub struct ComponentAnalysis {
    /// Number of connected components found.
    pub component_count: usize,
    /// Face indices for each component, largest (by vertex count) first.
    pub components: Vec<Vec<usize>>,
    /// Distinct vertices referenced by each component, same order as `components`.
    pub vertex_counts: Vec<usize>,
}

impl ComponentAnalysis {
    /// Check if the mesh is fully connected (single component).
    pub fn is_connected(&self) -> bool {
        self.component_count == 1
    }

    /// Get the face indices of the largest component.
    pub fn largest_component(&self) -> &[usize] {
        self.components.first().map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Sum of per-component vertex counts.
    pub fn total_vertex_count(&self) -> usize {
        self.vertex_counts.iter().sum()
    }
}

impl std::fmt::Display for ComponentAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Component Analysis:")?;
        writeln!(f, "  Connected components: {}", self.component_count)?;
        for (i, (faces, verts)) in self
            .components
            .iter()
            .zip(&self.vertex_counts)
            .enumerate()
        {
            writeln!(
                f,
                "    Component {}: {} vertices, {} faces",
                i + 1,
                verts,
                faces.len()
            )?;
        }
        Ok(())
    }
}

/// Find all connected components in a mesh.
///
/// Uses a flood fill starting from each unvisited face. Components are
/// sorted by distinct vertex count, largest first; ties keep discovery order.
///
/// ```
/// use mesh_prep::{Mesh, Vertex};
/// use mesh_prep::components::find_connected_components;
///
/// let mut mesh = Mesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(10.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(11.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(10.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
/// mesh.faces.push([3, 4, 5]);
///
/// let analysis = find_connected_components(&mesh);
/// assert_eq!(analysis.component_count, 2);
/// ```
pub fn find_connected_components(mesh: &Mesh) -> ComponentAnalysis {
    if mesh.faces.is_empty() {
        return ComponentAnalysis::default();
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let face_count = mesh.faces.len();

    let mut visited = vec![false; face_count];
    let mut components: Vec<(Vec<usize>, usize)> = Vec::new();

    for start_face in 0..face_count {
        if visited[start_face] {
            continue;
        }

        let mut component = Vec::new();
        let mut vertices: HashSet<u32> = HashSet::new();
        let mut stack = vec![start_face];
        visited[start_face] = true;

        while let Some(face_idx) = stack.pop() {
            let face = &mesh.faces[face_idx];
            component.push(face_idx);
            vertices.extend(face.iter().copied());

            for neighbor in adjacency.face_neighbors(face_idx, face) {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    stack.push(neighbor);
                }
            }
        }

        component.sort_unstable();
        components.push((component, vertices.len()));
    }

    components.sort_by_key(|(faces, verts)| Reverse((*verts, faces.len())));

    let component_count = components.len();
    if component_count > 1 {
        debug!(
            "Found {} components, vertex counts: {:?}",
            component_count,
            components.iter().map(|(_, v)| *v).collect::<Vec<_>>()
        );
    }

    let (components, vertex_counts) = components.into_iter().unzip();
    ComponentAnalysis {
        component_count,
        components,
        vertex_counts,
    }
}

/// Remove components whose vertex count is below `fraction` of the total.
///
/// The total is the sum of every component's distinct vertex count. If no
/// component reaches the threshold, the largest one is kept. Vertices that
/// are no longer referenced are compacted away.
///
/// Returns the number of components removed.
pub fn prune_small_components(mesh: &mut Mesh, fraction: f64) -> usize {
    let analysis = find_connected_components(mesh);
    if analysis.component_count <= 1 {
        return 0;
    }

    let total = analysis.total_vertex_count();
    let min_vertices = fraction * total as f64;

    let mut keep: Vec<usize> = analysis
        .vertex_counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count as f64 >= min_vertices)
        .map(|(i, _)| i)
        .collect();

    if keep.is_empty() {
        debug!("No component reaches {:.1} vertices, keeping the largest", min_vertices);
        keep.push(0);
    }

    let removed = analysis.component_count - keep.len();
    if removed == 0 {
        return 0;
    }

    info!(
        "Removing {} of {} component(s) below {:.1} vertices ({:.1}% of {})",
        removed,
        analysis.component_count,
        min_vertices,
        fraction * 100.0,
        total
    );

    let mut kept_faces: Vec<usize> = keep
        .iter()
        .flat_map(|&i| analysis.components[i].iter().copied())
        .collect();
    kept_faces.sort_unstable();

    retain_faces(mesh, &kept_faces);
    removed
}

/// Keep only the given faces (in index order) and drop unreferenced vertices.
///
/// Surviving vertices keep their relative order.
pub fn retain_faces(mesh: &mut Mesh, kept_faces: &[usize]) {
    let faces: Vec<[u32; 3]> = kept_faces.iter().map(|&f| mesh.faces[f]).collect();
    mesh.faces = faces;
    remove_unreferenced_vertices(mesh);
}

/// Drop vertices not referenced by any face, remapping face indices.
///
/// Returns the number of vertices removed.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let mut used = vec![false; mesh.vertices.len()];
    for face in &mesh.faces {
        for &v in face {
            used[v as usize] = true;
        }
    }

    let mut remap = vec![u32::MAX; mesh.vertices.len()];
    let mut next = 0u32;
    for (old, &is_used) in used.iter().enumerate() {
        if is_used {
            remap[old] = next;
            next += 1;
        }
    }

    let removed = mesh.vertices.len() - next as usize;
    if removed == 0 {
        return 0;
    }

    let mut idx = 0;
    mesh.vertices.retain(|_| {
        let keep = used[idx];
        idx += 1;
        keep
    });
    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = remap[*v as usize];
        }
    }

    debug!("Removed {} unreferenced vertices", removed);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;

    /// Closed tetrahedron with its first vertex at `origin`.
    fn push_tetrahedron(mesh: &mut Mesh, origin: (f64, f64, f64), size: f64) {
        let base = mesh.vertices.len() as u32;
        let (x, y, z) = origin;
        mesh.vertices.push(Vertex::from_coords(x, y, z));
        mesh.vertices.push(Vertex::from_coords(x + size, y, z));
        mesh.vertices.push(Vertex::from_coords(x, y + size, z));
        mesh.vertices.push(Vertex::from_coords(x, y, z + size));
        for f in [[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]] {
            mesh.faces.push([base + f[0], base + f[1], base + f[2]]);
        }
    }

    /// Triangulated n x n grid patch; (n + 1)^2 vertices.
    fn push_grid(mesh: &mut Mesh, n: u32, offset: f64) {
        let base = mesh.vertices.len() as u32;
        for y in 0..=n {
            for x in 0..=n {
                mesh.vertices
                    .push(Vertex::from_coords(x as f64 + offset, y as f64, 0.0));
            }
        }
        let idx = |x: u32, y: u32| base + y * (n + 1) + x;
        for y in 0..n {
            for x in 0..n {
                mesh.faces.push([idx(x, y), idx(x + 1, y), idx(x + 1, y + 1)]);
                mesh.faces.push([idx(x, y), idx(x + 1, y + 1), idx(x, y + 1)]);
            }
        }
    }

    #[test]
    fn test_single_component() {
        let mut mesh = Mesh::new();
        push_tetrahedron(&mut mesh, (0.0, 0.0, 0.0), 1.0);
        let analysis = find_connected_components(&mesh);
        assert!(analysis.is_connected());
        assert_eq!(analysis.vertex_counts, vec![4]);
        assert_eq!(analysis.largest_component().len(), 4);
    }

    #[test]
    fn test_components_sorted_by_vertex_count() {
        let mut mesh = Mesh::new();
        push_tetrahedron(&mut mesh, (0.0, 0.0, 0.0), 1.0);
        push_grid(&mut mesh, 3, 10.0);
        let analysis = find_connected_components(&mesh);
        assert_eq!(analysis.component_count, 2);
        assert_eq!(analysis.vertex_counts, vec![16, 4]);
        assert_eq!(analysis.components[0].len(), 18);
    }

    #[test]
    fn test_vertex_touching_faces_are_separate() {
        let mut mesh = Mesh::new();
        for &(x, y) in &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)] {
            mesh.vertices.push(Vertex::from_coords(x, y, 0.0));
        }
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([0, 3, 4]);
        assert_eq!(find_connected_components(&mesh).component_count, 2);
    }

    #[test]
    fn test_prune_removes_fragment() {
        let mut mesh = Mesh::new();
        push_grid(&mut mesh, 9, 0.0); // 100 vertices
        push_tetrahedron(&mut mesh, (50.0, 0.0, 0.0), 1.0); // 4 vertices

        let removed = prune_small_components(&mut mesh, 0.05);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 100);
        assert_eq!(mesh.face_count(), 162);
        assert_eq!(mesh.component_count(), 1);
    }

    #[test]
    fn test_prune_keeps_components_above_threshold() {
        let mut mesh = Mesh::new();
        push_tetrahedron(&mut mesh, (0.0, 0.0, 0.0), 1.0);
        push_tetrahedron(&mut mesh, (5.0, 0.0, 0.0), 1.0);
        assert_eq!(prune_small_components(&mut mesh, 0.05), 0);
        assert_eq!(mesh.component_count(), 2);
    }

    #[test]
    fn test_prune_keeps_largest_when_none_qualify() {
        let mut mesh = Mesh::new();
        push_tetrahedron(&mut mesh, (0.0, 0.0, 0.0), 1.0);
        push_grid(&mut mesh, 1, 10.0);
        // Threshold above every component.
        let removed = prune_small_components(&mut mesh, 0.9);
        assert_eq!(removed, 1);
        assert_eq!(mesh.component_count(), 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 4);
    }

    #[test]
    fn test_remove_unreferenced_vertices_preserves_order() {
        let mut mesh = Mesh::new();
        for i in 0..5 {
            mesh.vertices.push(Vertex::from_coords(i as f64, 0.0, 0.0));
        }
        mesh.vertices[4].position.y = 1.0;
        mesh.faces.push([1, 3, 4]);

        assert_eq!(remove_unreferenced_vertices(&mut mesh), 2);
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
        assert_eq!(mesh.vertices[0].position.x, 1.0);
        assert_eq!(mesh.vertices[1].position.x, 3.0);
    }
}
