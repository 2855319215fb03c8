//! Best-effort topology repair: hole filling, winding, component pruning.

use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::components::{prune_small_components, remove_unreferenced_vertices};
use crate::config::PipelineConfig;
use crate::holes::fill_holes;
use crate::tracing_ext::OperationTimer;
use crate::winding::{fix_winding_order, orient_outward};

/// Configuration parameters for mesh repair.
///
/// ```
/// use mesh_prep::RepairParams;
///
/// let params = RepairParams {
///     small_component_fraction: 0.1,
///     ..Default::default()
/// };
/// assert!(params.fill_holes);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairParams {
    /// Distance below which vertices are merged before topology analysis.
    ///
    /// Default: `1e-6` (mm). Set to `0.0` to disable welding.
    pub weld_epsilon: f64,

    /// Close boundary loops. Default: `true`.
    pub fill_holes: bool,

    /// Largest convex loop (in vertices) triangulated by ear clipping; larger
    /// or concave loops are closed with a centroid fan. Default: `8`.
    pub max_ear_clip_vertices: usize,

    /// Make winding consistent and point closed components outward.
    /// Default: `true`.
    pub fix_winding: bool,

    /// Drop small disconnected fragments. Default: `true`.
    pub remove_small_components: bool,

    /// Components with fewer than this fraction of the total vertex count are
    /// dropped. Default: `0.05`.
    pub small_component_fraction: f64,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            weld_epsilon: 1e-6,
            fill_holes: true,
            max_ear_clip_vertices: 8,
            fix_winding: true,
            remove_small_components: true,
            small_component_fraction: 0.05,
        }
    }
}

impl From<&PipelineConfig> for RepairParams {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_ear_clip_vertices: config.max_ear_clip_vertices,
            small_component_fraction: config.small_component_fraction,
            ..Default::default()
        }
    }
}

/// What a repair pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    /// Input was already watertight and returned untouched.
    pub was_watertight: bool,
    /// Faces dropped for bad indices, repeated vertices, or duplication.
    pub faces_removed: usize,
    pub vertices_welded: usize,
    pub holes_found: usize,
    pub holes_filled: usize,
    pub faces_added: usize,
    /// Faces flipped to agree with their neighbors.
    pub faces_flipped: usize,
    /// Faces flipped to turn inside-out components outward.
    pub faces_reoriented: usize,
    pub components_removed: usize,
    /// Result is watertight. False means repair was incomplete.
    pub is_watertight: bool,
}

impl std::fmt::Display for RepairSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Repair Summary:")?;
        if self.was_watertight {
            return writeln!(f, "  Input already watertight, unchanged");
        }
        writeln!(f, "  Faces removed: {}", self.faces_removed)?;
        writeln!(f, "  Vertices welded: {}", self.vertices_welded)?;
        writeln!(
            f,
            "  Holes filled: {}/{} ({} faces added)",
            self.holes_filled, self.holes_found, self.faces_added
        )?;
        writeln!(
            f,
            "  Faces flipped: {} (+{} reoriented outward)",
            self.faces_flipped, self.faces_reoriented
        )?;
        writeln!(f, "  Components removed: {}", self.components_removed)?;
        writeln!(
            f,
            "  Result: {}",
            if self.is_watertight {
                "watertight"
            } else {
                "NOT watertight (repair incomplete)"
            }
        )
    }
}

/// Repairs meshes toward a watertight, consistently wound single body.
///
/// Repair never fails: inputs it cannot fully fix come back with
/// `RepairSummary::is_watertight == false` and are caught by validation.
#[derive(Debug, Clone, Default)]
pub struct MeshRepairer {
    params: RepairParams,
}

impl MeshRepairer {
    pub fn new(params: RepairParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RepairParams {
        &self.params
    }

    /// Repair `mesh`, discarding the summary.
    pub fn repair(&self, mesh: Mesh) -> Mesh {
        self.repair_with_summary(mesh).0
    }

    /// Repair `mesh` and report what was done.
    ///
    /// Order: sanitize (drop broken faces, weld), fill holes, fix winding,
    /// orient outward, prune small components. A mesh that is already
    /// watertight is returned unchanged.
    pub fn repair_with_summary(&self, mut mesh: Mesh) -> (Mesh, RepairSummary) {
        let _timer = OperationTimer::new("repair");
        let mut summary = RepairSummary::default();

        if mesh.check_indices().is_ok() && mesh.is_watertight() {
            debug!("Mesh is already watertight, skipping repair");
            summary.was_watertight = true;
            summary.is_watertight = true;
            return (mesh, summary);
        }

        let initial_verts = mesh.vertex_count();
        let initial_faces = mesh.face_count();
        info!(
            "Starting mesh repair ({} vertices, {} faces)",
            initial_verts, initial_faces
        );

        summary.faces_removed += remove_invalid_faces(&mut mesh);
        if self.params.weld_epsilon > 0.0 {
            summary.vertices_welded = weld_vertices(&mut mesh, self.params.weld_epsilon);
        }
        summary.faces_removed += remove_collapsed_faces(&mut mesh);
        summary.faces_removed += remove_duplicate_faces(&mut mesh);

        if mesh.faces.is_empty() {
            warn!("Mesh has no usable faces, nothing to repair");
            remove_unreferenced_vertices(&mut mesh);
            return (mesh, summary);
        }

        if self.params.fill_holes {
            let report = fill_holes(&mut mesh, self.params.max_ear_clip_vertices);
            summary.holes_found = report.holes_found;
            summary.holes_filled = report.holes_filled;
            summary.faces_added = report.faces_added;
        }

        if self.params.fix_winding {
            summary.faces_flipped = fix_winding_order(&mut mesh);
            summary.faces_reoriented = orient_outward(&mut mesh);
        }

        if self.params.remove_small_components {
            summary.components_removed =
                prune_small_components(&mut mesh, self.params.small_component_fraction);
        }
        remove_unreferenced_vertices(&mut mesh);

        summary.is_watertight = mesh.is_watertight();
        if !summary.is_watertight {
            warn!("Repair incomplete: mesh is still not watertight");
        }

        info!(
            "Repair complete: {} verts → {}, {} faces → {}",
            initial_verts,
            mesh.vertex_count(),
            initial_faces,
            mesh.face_count()
        );

        (mesh, summary)
    }
}

/// Repair with the given parameters.
pub fn repair_mesh(mesh: Mesh, params: &RepairParams) -> (Mesh, RepairSummary) {
    MeshRepairer::new(params.clone()).repair_with_summary(mesh)
}

/// Drop faces referencing vertices that do not exist.
fn remove_invalid_faces(mesh: &mut Mesh) -> usize {
    let vertex_count = mesh.vertices.len();
    let original = mesh.faces.len();
    mesh.faces
        .retain(|face| face.iter().all(|&v| (v as usize) < vertex_count));
    let removed = original - mesh.faces.len();
    if removed > 0 {
        warn!("Removed {} faces with out-of-range vertex indices", removed);
    }
    removed
}

/// Drop faces that reference the same vertex twice.
fn remove_collapsed_faces(mesh: &mut Mesh) -> usize {
    let original = mesh.faces.len();
    mesh.faces
        .retain(|&[i0, i1, i2]| i0 != i1 && i1 != i2 && i0 != i2);
    let removed = original - mesh.faces.len();
    if removed > 0 {
        info!("Removed {} collapsed faces", removed);
    }
    removed
}

/// Drop faces over the same three vertices as an earlier face, in any order.
fn remove_duplicate_faces(mesh: &mut Mesh) -> usize {
    let original = mesh.faces.len();
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(original);
    mesh.faces.retain(|face| {
        let mut key = *face;
        key.sort_unstable();
        seen.insert(key)
    });
    let removed = original - mesh.faces.len();
    if removed > 0 {
        info!("Removed {} duplicate faces", removed);
    }
    removed
}

/// Weld vertices that are within epsilon distance of each other.
///
/// Uses spatial hashing; each vertex merges into the lowest-indexed vertex
/// of its cluster. Returns the number of vertices merged. Merged vertices
/// stay in the array until compaction.
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f64) -> usize {
    if mesh.vertices.is_empty() {
        return 0;
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let cell = pos_to_cell(&vertex.position, cell_size);
        spatial_hash.entry(cell).or_default().push(idx as u32);
    }

    let mut vertex_remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut merged_count = 0;

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if vertex_remap[idx as usize] != idx {
            continue;
        }

        let cell = pos_to_cell(&vertex.position, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor_cell = (cell.0 + dx, cell.1 + dy, cell.2 + dz);
                    let Some(candidates) = spatial_hash.get(&neighbor_cell) else {
                        continue;
                    };
                    for &other_idx in candidates {
                        if other_idx <= idx || vertex_remap[other_idx as usize] != other_idx {
                            continue;
                        }
                        let other_pos = &mesh.vertices[other_idx as usize].position;
                        if (vertex.position - other_pos).norm() < epsilon {
                            vertex_remap[other_idx as usize] = idx;
                            merged_count += 1;
                        }
                    }
                }
            }
        }
    }

    if merged_count == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for v in face.iter_mut() {
            *v = vertex_remap[*v as usize];
        }
    }

    info!("Welded {} vertices (epsilon = {:.1e})", merged_count, epsilon);
    merged_count
}

fn pos_to_cell(p: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (p.x / cell_size).floor() as i64,
        (p.y / cell_size).floor() as i64,
        (p.z / cell_size).floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;

    fn create_test_cube(size: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for &(x, y, z) in &[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, 1.0),
            (0.0, 1.0, 1.0),
        ] {
            mesh.vertices
                .push(Vertex::from_coords(x * size, y * size, z * size));
        }
        mesh.faces = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        mesh
    }

    /// Every face gets its own three vertices, as a naive exporter writes them.
    fn into_soup(mesh: &Mesh) -> Mesh {
        let mut soup = Mesh::new();
        for tri in mesh.triangles() {
            let base = soup.vertices.len() as u32;
            soup.vertices.push(Vertex::new(tri.v0));
            soup.vertices.push(Vertex::new(tri.v1));
            soup.vertices.push(Vertex::new(tri.v2));
            soup.faces.push([base, base + 1, base + 2]);
        }
        soup
    }

    #[test]
    fn test_watertight_input_unchanged() {
        let cube = create_test_cube(10.0);
        let (repaired, summary) = MeshRepairer::default().repair_with_summary(cube.clone());
        assert!(summary.was_watertight);
        assert_eq!(repaired.faces, cube.faces);
        assert_eq!(repaired.vertices, cube.vertices);
    }

    #[test]
    fn test_missing_triangle_is_filled() {
        let mut mesh = create_test_cube(10.0);
        mesh.faces.remove(3);
        let (repaired, summary) = MeshRepairer::default().repair_with_summary(mesh);

        assert!(!summary.was_watertight);
        assert_eq!(summary.holes_filled, 1);
        assert!(summary.is_watertight);
        assert!(repaired.is_watertight());
        assert!((repaired.signed_volume() - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_inverted_open_mesh_is_turned_outward() {
        let mut mesh = create_test_cube(1.0);
        mesh.flip_all_faces();
        mesh.faces.pop();
        let (repaired, summary) = MeshRepairer::default().repair_with_summary(mesh);

        assert!(summary.is_watertight);
        assert_eq!(summary.faces_reoriented, 12);
        assert!(repaired.signed_volume() > 0.0);
    }

    #[test]
    fn test_triangle_soup_is_welded() {
        let soup = into_soup(&create_test_cube(1.0));
        assert_eq!(soup.vertex_count(), 36);
        assert!(!soup.is_watertight());

        let (repaired, summary) = MeshRepairer::default().repair_with_summary(soup);
        assert_eq!(summary.vertices_welded, 28);
        assert_eq!(repaired.vertex_count(), 8);
        assert!(repaired.is_watertight());
    }

    #[test]
    fn test_broken_faces_are_dropped() {
        let mut mesh = create_test_cube(1.0);
        mesh.faces.push([0, 0, 1]);
        mesh.faces.push([0, 1, 99]);
        mesh.faces.push([2, 1, 0]);

        let (repaired, summary) = MeshRepairer::default().repair_with_summary(mesh);
        assert_eq!(summary.faces_removed, 3);
        assert_eq!(repaired.face_count(), 12);
        assert!(repaired.is_watertight());
    }

    #[test]
    fn test_disabled_steps_are_skipped() {
        let mut mesh = create_test_cube(1.0);
        mesh.faces.pop();
        let params = RepairParams {
            fill_holes: false,
            fix_winding: false,
            remove_small_components: false,
            ..Default::default()
        };
        let (repaired, summary) = MeshRepairer::new(params).repair_with_summary(mesh);
        assert_eq!(summary.holes_found, 0);
        assert!(!summary.is_watertight);
        assert_eq!(repaired.face_count(), 11);
    }

    #[test]
    fn test_empty_mesh_is_returned() {
        let (repaired, summary) = MeshRepairer::default().repair_with_summary(Mesh::new());
        assert!(repaired.is_empty());
        assert!(!summary.is_watertight);
    }

    #[test]
    fn test_params_from_config() {
        let config = PipelineConfig {
            small_component_fraction: 0.2,
            max_ear_clip_vertices: 4,
            ..Default::default()
        };
        let params = RepairParams::from(&config);
        assert_eq!(params.small_component_fraction, 0.2);
        assert_eq!(params.max_ear_clip_vertices, 4);
    }

    #[test]
    fn test_weld_vertices() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0 + 1e-9, 0.0, 0.0));
        mesh.faces.push([0, 3, 2]);

        assert_eq!(weld_vertices(&mut mesh, 1e-6), 1);
        assert_eq!(mesh.faces[0], [0, 1, 2]);
    }
}
