//! Self-intersection detection.
//!
//! Pairs of triangles that do not share a vertex but overlap in space make a
//! solid ambiguous for slicers. Detection is advisory: validation reports it
//! as a warning and never fails a mesh for it.
//!
//! Candidate pairs come from a uniform grid, so the scan stays near linear in
//! the face count for meshes with evenly sized faces.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::types::{Mesh, Triangle};

/// Result of self-intersection detection.
#[derive(Debug, Clone, Default)]
pub struct SelfIntersectionResult {
    /// Number of intersecting triangle pairs found.
    pub intersection_count: usize,
    /// Intersecting pairs as (face_idx_a, face_idx_b), at most `max_reported`.
    pub intersecting_pairs: Vec<(u32, u32)>,
    /// Total faces checked.
    pub faces_checked: usize,
    /// The search stopped early after reaching `max_reported`.
    pub truncated: bool,
}

impl SelfIntersectionResult {
    /// Check if the mesh is free of self-intersections.
    pub fn is_clean(&self) -> bool {
        self.intersection_count == 0
    }
}

impl std::fmt::Display for SelfIntersectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_clean() {
            write!(f, "No self-intersections detected")
        } else {
            write!(
                f,
                "Self-intersections found: {} pair(s){}",
                self.intersection_count,
                if self.truncated { " (truncated)" } else { "" }
            )
        }
    }
}

/// Parameters for self-intersection detection.
#[derive(Debug, Clone)]
pub struct IntersectionParams {
    /// Stop after this many intersecting pairs. `0` means unlimited.
    pub max_reported: usize,
    /// Epsilon for geometric comparisons.
    pub epsilon: f64,
}

impl Default for IntersectionParams {
    fn default() -> Self {
        Self {
            max_reported: 100,
            epsilon: 1e-10,
        }
    }
}

impl IntersectionParams {
    /// Stop at the first intersecting pair; enough for a yes/no answer.
    pub fn first_only() -> Self {
        Self {
            max_reported: 1,
            ..Default::default()
        }
    }
}

/// Axis-aligned bounding box for pair culling.
#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Point3<f64>,
    max: Point3<f64>,
}

impl Aabb {
    fn from_triangle(tri: &Triangle, epsilon: f64) -> Self {
        let pad = Vector3::repeat(epsilon);
        let min = tri.v0.coords.inf(&tri.v1.coords).inf(&tri.v2.coords) - pad;
        let max = tri.v0.coords.sup(&tri.v1.coords).sup(&tri.v2.coords) + pad;
        Self {
            min: Point3::from(min),
            max: Point3::from(max),
        }
    }

    fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Faces whose box spans more cells than this on any axis skip the grid and
/// are tested against every other face.
const MAX_CELL_SPAN: i64 = 4;

/// Uniform grid over triangle bounding boxes.
///
/// Cell size is the mean of the largest box extents, so a typical face lands
/// in a handful of cells and only faces sharing a cell become candidates.
struct UniformGrid {
    origin: Point3<f64>,
    cell_size: f64,
    cells: HashMap<[i64; 3], Vec<u32>>,
    oversized: Vec<u32>,
}

impl UniformGrid {
    fn build(aabbs: &[Aabb]) -> Self {
        let mut origin = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut extent_sum = 0.0;
        for aabb in aabbs {
            origin = Point3::from(origin.coords.inf(&aabb.min.coords));
            extent_sum += (aabb.max - aabb.min).max();
        }
        let mean = extent_sum / aabbs.len() as f64;
        let cell_size = if mean.is_finite() && mean > 0.0 { mean } else { 1.0 };
        if !origin.coords.iter().all(|c| c.is_finite()) {
            origin = Point3::origin();
        }

        let mut grid = Self {
            origin,
            cell_size,
            cells: HashMap::new(),
            oversized: Vec::new(),
        };

        for (i, aabb) in aabbs.iter().enumerate() {
            let lo = grid.cell_of(&aabb.min);
            let hi = grid.cell_of(&aabb.max);
            if (0..3).any(|k| hi[k].saturating_sub(lo[k]) >= MAX_CELL_SPAN) {
                grid.oversized.push(i as u32);
                continue;
            }
            for x in lo[0]..=hi[0] {
                for y in lo[1]..=hi[1] {
                    for z in lo[2]..=hi[2] {
                        grid.cells.entry([x, y, z]).or_default().push(i as u32);
                    }
                }
            }
        }

        grid
    }

    fn cell_of(&self, p: &Point3<f64>) -> [i64; 3] {
        let rel = (p - self.origin) / self.cell_size;
        [
            rel.x.floor() as i64,
            rel.y.floor() as i64,
            rel.z.floor() as i64,
        ]
    }
}

/// Detect overlapping triangle pairs that share no vertex.
///
/// A uniform grid limits candidates to faces in the same cell; each
/// overlapping pair is tested once, in the cell holding the low corner of
/// the two boxes' intersection. Candidates get an exact separating-axis
/// test. Cells are scanned in parallel and the scan stops early once
/// `max_reported` pairs are found. Pairs come back sorted.
///
/// ```
/// use mesh_prep::{Mesh, Vertex};
/// use mesh_prep::intersect::{detect_self_intersections, IntersectionParams};
///
/// let mut mesh = Mesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// let result = detect_self_intersections(&mesh, &IntersectionParams::default());
/// assert!(result.is_clean());
/// ```
pub fn detect_self_intersections(
    mesh: &Mesh,
    params: &IntersectionParams,
) -> SelfIntersectionResult {
    let face_count = mesh.faces.len();

    if face_count < 2 {
        return SelfIntersectionResult {
            faces_checked: face_count,
            ..Default::default()
        };
    }

    let triangles: Vec<Triangle> = mesh.triangles().collect();
    let aabbs: Vec<Aabb> = triangles
        .iter()
        .map(|t| Aabb::from_triangle(t, params.epsilon))
        .collect();
    let grid = UniformGrid::build(&aabbs);

    debug!(
        faces = face_count,
        cells = grid.cells.len(),
        oversized = grid.oversized.len(),
        "Checking for self-intersections"
    );

    let max_pairs = if params.max_reported == 0 {
        usize::MAX
    } else {
        params.max_reported
    };

    let intersection_count = AtomicUsize::new(0);
    let should_stop = AtomicBool::new(false);

    // Records a hit; returns true once the limit is reached.
    let record = |i: u32, j: u32, local: &mut Vec<(u32, u32)>| -> bool {
        let count = intersection_count.fetch_add(1, Ordering::Relaxed);
        if count < max_pairs {
            local.push((i.min(j), i.max(j)));
        }
        if count + 1 >= max_pairs {
            should_stop.store(true, Ordering::Relaxed);
            return true;
        }
        false
    };
    let collides = |i: usize, j: usize| -> bool {
        aabbs[i].overlaps(&aabbs[j])
            && !shares_vertex(&mesh.faces[i], &mesh.faces[j])
            && triangles_intersect(&triangles[i], &triangles[j], params.epsilon)
    };

    let buckets: Vec<(&[i64; 3], &Vec<u32>)> = grid.cells.iter().collect();
    let mut is_oversized = vec![false; face_count];
    for &o in &grid.oversized {
        is_oversized[o as usize] = true;
    }

    let in_cells = buckets.par_iter().flat_map_iter(|&(cell, faces)| {
        let mut local_pairs = Vec::new();
        'outer: for (a, &i) in faces.iter().enumerate() {
            for &j in &faces[a + 1..] {
                if should_stop.load(Ordering::Relaxed) {
                    break 'outer;
                }
                let (iu, ju) = (i as usize, j as usize);
                if !aabbs[iu].overlaps(&aabbs[ju]) {
                    continue;
                }
                let low = Point3::from(aabbs[iu].min.coords.sup(&aabbs[ju].min.coords));
                if grid.cell_of(&low) != *cell {
                    continue;
                }
                if collides(iu, ju) && record(i, j, &mut local_pairs) {
                    break 'outer;
                }
            }
        }
        local_pairs
    });

    let against_all = grid.oversized.par_iter().flat_map_iter(|&o| {
        let mut local_pairs = Vec::new();
        for j in 0..face_count {
            if should_stop.load(Ordering::Relaxed) {
                break;
            }
            let ou = o as usize;
            if j == ou || (is_oversized[j] && j < ou) {
                continue;
            }
            if collides(ou, j) && record(o, j as u32, &mut local_pairs) {
                break;
            }
        }
        local_pairs
    });

    let mut intersecting_pairs: Vec<(u32, u32)> = in_cells.chain(against_all).collect();
    intersecting_pairs.sort_unstable();
    intersecting_pairs.truncate(max_pairs);

    let final_count = intersection_count.load(Ordering::Relaxed);
    let truncated = should_stop.load(Ordering::Relaxed);

    if final_count > 0 {
        warn!(
            "Found {} self-intersecting triangle pair(s){}",
            final_count,
            if truncated { " before stopping" } else { "" }
        );
    } else {
        debug!("No self-intersections found");
    }

    SelfIntersectionResult {
        intersection_count: final_count,
        intersecting_pairs,
        faces_checked: face_count,
        truncated,
    }
}

/// True if any non-adjacent triangle pair overlaps.
pub fn has_self_intersections(mesh: &Mesh) -> bool {
    !detect_self_intersections(mesh, &IntersectionParams::first_only()).is_clean()
}

fn shares_vertex(a: &[u32; 3], b: &[u32; 3]) -> bool {
    a.iter().any(|v| b.contains(v))
}

/// Test if two triangles intersect.
///
/// Separating axis test; touching within `epsilon` counts as intersecting.
fn triangles_intersect(t1: &Triangle, t2: &Triangle, epsilon: f64) -> bool {
    let n1 = t1.normal_unnormalized();
    let n2 = t2.normal_unnormalized();

    if n1.norm_squared() < epsilon * epsilon || n2.norm_squared() < epsilon * epsilon {
        return false;
    }

    let edges1 = [t1.v1 - t1.v0, t1.v2 - t1.v1, t1.v0 - t1.v2];
    let edges2 = [t2.v1 - t2.v0, t2.v2 - t2.v1, t2.v0 - t2.v2];

    let cross_normals = n1.cross(&n2);
    let is_coplanar =
        cross_normals.norm_squared() < epsilon * epsilon * n1.norm_squared() * n2.norm_squared();

    if is_coplanar {
        // In-plane axes perpendicular to each edge.
        for edge in &edges1 {
            let axis = n1.cross(edge);
            if axis.norm_squared() > epsilon * epsilon && separated_by_axis(&axis, t1, t2, epsilon)
            {
                return false;
            }
        }

        for edge in &edges2 {
            let axis = n2.cross(edge);
            if axis.norm_squared() > epsilon * epsilon && separated_by_axis(&axis, t1, t2, epsilon)
            {
                return false;
            }
        }

        return true;
    }

    // Face normals, then the nine edge-edge axes.
    if separated_by_axis(&n1, t1, t2, epsilon) {
        return false;
    }
    if separated_by_axis(&n2, t1, t2, epsilon) {
        return false;
    }

    for e1 in &edges1 {
        for e2 in &edges2 {
            let axis = e1.cross(e2);
            if axis.norm_squared() > epsilon * epsilon && separated_by_axis(&axis, t1, t2, epsilon)
            {
                return false;
            }
        }
    }

    true
}

/// Check if two triangles are separated by a given axis.
fn separated_by_axis(axis: &Vector3<f64>, t1: &Triangle, t2: &Triangle, epsilon: f64) -> bool {
    let p1_0 = axis.dot(&t1.v0.coords);
    let p1_1 = axis.dot(&t1.v1.coords);
    let p1_2 = axis.dot(&t1.v2.coords);
    let min1 = p1_0.min(p1_1).min(p1_2);
    let max1 = p1_0.max(p1_1).max(p1_2);

    let p2_0 = axis.dot(&t2.v0.coords);
    let p2_1 = axis.dot(&t2.v1.coords);
    let p2_2 = axis.dot(&t2.v2.coords);
    let min2 = p2_0.min(p2_1).min(p2_2);
    let max2 = p2_0.max(p2_1).max(p2_2);

    max1 + epsilon < min2 || max2 + epsilon < min1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockShape, MockShapeSource, Vertex};

    fn create_xy_triangle(x: f64, y: f64, size: f64) -> Triangle {
        Triangle::new(
            Point3::new(x, y, 0.0),
            Point3::new(x + size, y, 0.0),
            Point3::new(x + size / 2.0, y + size, 0.0),
        )
    }

    /// Triangle in XY plane and a triangle in XZ plane piercing it.
    fn push_crossing_pair(mesh: &mut Mesh, offset: f64) {
        let base = mesh.vertices.len() as u32;
        mesh.vertices
            .push(Vertex::from_coords(-1.0 + offset, -1.0, 0.0));
        mesh.vertices
            .push(Vertex::from_coords(1.0 + offset, -1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(offset, 1.0, 0.0));
        mesh.vertices
            .push(Vertex::from_coords(-1.0 + offset, 0.0, -1.0));
        mesh.vertices
            .push(Vertex::from_coords(1.0 + offset, 0.0, -1.0));
        mesh.vertices.push(Vertex::from_coords(offset, 0.0, 1.0));
        mesh.faces.push([base, base + 1, base + 2]);
        mesh.faces.push([base + 3, base + 4, base + 5]);
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::from_triangle(&create_xy_triangle(0.0, 0.0, 1.0), 0.0);
        let b = Aabb::from_triangle(&create_xy_triangle(0.5, 0.5, 1.0), 0.0);
        let c = Aabb::from_triangle(&create_xy_triangle(5.0, 5.0, 1.0), 0.0);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_coplanar_cases() {
        let t1 = create_xy_triangle(0.0, 0.0, 1.0);
        assert!(!triangles_intersect(&t1, &create_xy_triangle(2.0, 0.0, 1.0), 1e-10));

        let t2 = create_xy_triangle(0.0, 0.0, 2.0);
        assert!(triangles_intersect(&t2, &create_xy_triangle(0.5, 0.5, 2.0), 1e-10));
    }

    #[test]
    fn test_perpendicular_cases() {
        let t1 = Triangle::new(
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        let crossing = Triangle::new(
            Point3::new(-1.0, 0.0, -1.0),
            Point3::new(1.0, 0.0, -1.0),
            Point3::new(0.0, 0.0, 1.0),
        );
        let apart = Triangle::new(
            Point3::new(-1.0, 5.0, -1.0),
            Point3::new(1.0, 5.0, -1.0),
            Point3::new(0.0, 5.0, 1.0),
        );
        assert!(triangles_intersect(&t1, &crossing, 1e-10));
        assert!(!triangles_intersect(&t1, &apart, 1e-10));
    }

    #[test]
    fn test_closed_tetrahedron_is_clean() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.5, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.5, 0.5, 1.0));
        mesh.faces.push([0, 2, 1]);
        mesh.faces.push([0, 1, 3]);
        mesh.faces.push([1, 2, 3]);
        mesh.faces.push([2, 0, 3]);

        let result = detect_self_intersections(&mesh, &IntersectionParams::default());
        assert!(result.is_clean());
        assert_eq!(result.faces_checked, 4);
        assert!(!has_self_intersections(&mesh));
    }

    #[test]
    fn test_detect_crossing_pair() {
        let mut mesh = Mesh::new();
        push_crossing_pair(&mut mesh, 0.0);

        let result = detect_self_intersections(&mesh, &IntersectionParams::default());
        assert_eq!(result.intersection_count, 1);
        assert_eq!(result.intersecting_pairs, vec![(0, 1)]);
        assert!(!result.truncated);
        assert!(has_self_intersections(&mesh));
    }

    #[test]
    fn test_faces_sharing_a_vertex_are_skipped() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.5, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.5, -1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([0, 3, 1]);

        let result = detect_self_intersections(&mesh, &IntersectionParams::default());
        assert!(result.is_clean());
    }

    #[test]
    fn test_empty_and_single_face() {
        let mut mesh = Mesh::new();
        let result = detect_self_intersections(&mesh, &IntersectionParams::default());
        assert!(result.is_clean());
        assert_eq!(result.faces_checked, 0);

        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        let result = detect_self_intersections(&mesh, &IntersectionParams::default());
        assert_eq!(result.faces_checked, 1);
    }

    #[test]
    fn test_max_reported_limit() {
        let mut mesh = Mesh::new();
        for i in 0..5 {
            push_crossing_pair(&mut mesh, i as f64 * 10.0);
        }

        let result = detect_self_intersections(&mesh, &IntersectionParams::first_only());
        assert!(!result.is_clean());
        assert!(result.intersecting_pairs.len() <= 1);

        let all = detect_self_intersections(&mesh, &IntersectionParams::default());
        assert_eq!(all.intersection_count, 5);
    }

    #[test]
    fn test_fine_sphere_is_clean() {
        let sphere = MockShapeSource::new(MockShape::Sphere, 50.0)
            .with_resolution(128)
            .build();
        let result = detect_self_intersections(&sphere, &IntersectionParams::default());
        assert!(result.is_clean(), "{}", result);
        assert_eq!(result.faces_checked, sphere.face_count());
    }

    #[test]
    fn test_large_face_through_fine_mesh() {
        let mut mesh = MockShapeSource::new(MockShape::Sphere, 50.0)
            .with_resolution(32)
            .build();
        let base = mesh.vertices.len() as u32;
        mesh.vertices.push(Vertex::from_coords(-100.0, -100.0, 0.3));
        mesh.vertices.push(Vertex::from_coords(100.0, -100.0, 0.3));
        mesh.vertices.push(Vertex::from_coords(0.0, 100.0, 0.3));
        mesh.faces.push([base, base + 1, base + 2]);
        let plane = (mesh.faces.len() - 1) as u32;

        let params = IntersectionParams {
            max_reported: 0,
            ..Default::default()
        };
        let result = detect_self_intersections(&mesh, &params);

        // The plane cuts the band just above the equator: two faces per segment.
        assert_eq!(result.intersection_count, 64);
        assert!(!result.truncated);
        assert!(result.intersecting_pairs.iter().all(|&(_, b)| b == plane));
        assert!(result.intersecting_pairs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_overlapping_pair_reported_once() {
        // Two crossing pairs sharing grid cells with many small neighbours.
        let mut mesh = MockShapeSource::new(MockShape::Box, 2.0).build();
        push_crossing_pair(&mut mesh, 0.0);
        push_crossing_pair(&mut mesh, 0.5);

        let params = IntersectionParams {
            max_reported: 0,
            ..Default::default()
        };
        let result = detect_self_intersections(&mesh, &params);
        let mut deduped = result.intersecting_pairs.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), result.intersecting_pairs.len());
        assert_eq!(result.intersection_count, result.intersecting_pairs.len());
    }

    #[test]
    fn test_result_display() {
        let result = SelfIntersectionResult {
            intersection_count: 5,
            intersecting_pairs: vec![(0, 1), (2, 3)],
            faces_checked: 100,
            truncated: true,
        };
        let output = format!("{}", result);
        assert!(output.contains("5 pair(s)"));
        assert!(output.contains("truncated"));

        let clean = SelfIntersectionResult::default();
        assert!(clean.to_string().contains("No self-intersections"));
    }
}
