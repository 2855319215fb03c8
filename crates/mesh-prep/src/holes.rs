//! Hole detection and filling.

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::adjacency::MeshAdjacency;
use crate::{Mesh, Triangle, Vertex};

/// A closed boundary loop representing a hole in the mesh.
///
/// Vertices are ordered opposite to the adjacent faces' traversal, so
/// triangles that follow the loop order wind consistently with the
/// surrounding surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
    /// Ordered list of vertex indices forming the loop.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// How a hole gets triangulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStrategy {
    /// Ear clipping over the boundary vertices only.
    EarClip,
    /// New centroid vertex used as the apex of a triangle fan.
    CentroidFan,
}

/// Triangles closing one hole, before they are merged into the mesh.
#[derive(Debug, Clone, Default)]
pub struct HolePatch {
    /// Triangles over existing vertices.
    pub triangles: Vec<[u32; 3]>,
    /// Fan around a new apex vertex, if one is needed.
    pub fan: Option<FanPatch>,
}

/// A ring of boundary vertices fanned around a new apex.
#[derive(Debug, Clone)]
pub struct FanPatch {
    pub apex: Point3<f64>,
    /// Ring in loop order; closing triangle wraps from last to first.
    pub ring: Vec<u32>,
}

/// Outcome of a hole filling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoleFillReport {
    pub holes_found: usize,
    pub holes_filled: usize,
    pub ear_clipped: usize,
    pub fanned: usize,
    pub faces_added: usize,
    pub vertices_added: usize,
}

/// Detect all closed boundary loops (holes) in the mesh.
///
/// Boundary edges are those used by exactly one face. Each is directed
/// against its face and the directed edges are walked until they close.
/// Every edge is used once, so holes that touch at a single vertex come out
/// as separate loops. Chains that never close are logged and skipped.
pub fn detect_holes(adjacency: &MeshAdjacency) -> Vec<BoundaryLoop> {
    let mut hole_edges: Vec<(u32, u32)> = adjacency
        .boundary_edges()
        .map(|(a, b)| match adjacency.edge_uses(a, b).first() {
            Some(edge_use) if edge_use.traverses(a, b) => (b, a),
            _ => (a, b),
        })
        .collect();

    if hole_edges.is_empty() {
        return Vec::new();
    }
    hole_edges.sort_unstable();

    debug!("Found {} boundary edges", hole_edges.len());

    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in &hole_edges {
        outgoing.entry(a).or_default().push(b);
    }

    let mut used: HashSet<(u32, u32)> = HashSet::with_capacity(hole_edges.len());
    let mut loops = Vec::new();
    let mut open_chains = 0usize;

    for &(start, _) in &hole_edges {
        let mut path: Vec<u32> = Vec::new();
        let mut current = start;

        loop {
            if let Some(pos) = path.iter().position(|&v| v == current) {
                loops.push(BoundaryLoop {
                    vertices: path.split_off(pos),
                });
            }

            let next = outgoing.get(&current).and_then(|targets| {
                targets
                    .iter()
                    .copied()
                    .find(|&n| !used.contains(&(current, n)))
            });

            match next {
                Some(n) => {
                    used.insert((current, n));
                    path.push(current);
                    current = n;
                }
                None => {
                    if !path.is_empty() {
                        open_chains += 1;
                        warn!(
                            "Boundary chain ending at vertex {} is not closed ({} vertices), skipping",
                            current,
                            path.len() + 1
                        );
                    }
                    break;
                }
            }
        }
    }

    info!(
        "Detected {} holes (boundary loops), sizes: {:?}, open chains: {}",
        loops.len(),
        loops.iter().map(|l| l.edge_count()).collect::<Vec<_>>(),
        open_chains
    );

    loops
}

/// Pick ear clipping for small convex loops, a centroid fan otherwise.
pub fn choose_strategy(
    positions: &[Point3<f64>],
    max_ear_clip_vertices: usize,
) -> FillStrategy {
    if positions.len() > max_ear_clip_vertices {
        return FillStrategy::CentroidFan;
    }
    match hole_normal(positions) {
        Some(normal) if is_convex(positions, &normal) => FillStrategy::EarClip,
        _ => FillStrategy::CentroidFan,
    }
}

/// Triangulate a single hole without touching the mesh.
pub fn fill_hole(mesh: &Mesh, boundary: &BoundaryLoop, max_ear_clip_vertices: usize) -> HolePatch {
    let n = boundary.vertices.len();
    if n < 3 {
        return HolePatch::default();
    }

    let positions: Vec<Point3<f64>> = boundary
        .vertices
        .iter()
        .map(|&idx| mesh.vertices[idx as usize].position)
        .collect();

    let patch = match choose_strategy(&positions, max_ear_clip_vertices) {
        FillStrategy::EarClip => ear_clip(boundary, &positions),
        FillStrategy::CentroidFan => HolePatch {
            triangles: Vec::new(),
            fan: Some(FanPatch {
                apex: centroid(&positions),
                ring: boundary.vertices.clone(),
            }),
        },
    };

    debug!(
        "Filled hole with {} edges using {} triangles{}",
        n,
        patch.triangles.len() + patch.fan.as_ref().map_or(0, |f| f.ring.len()),
        if patch.fan.is_some() { " (fan)" } else { "" }
    );

    patch
}

fn ear_clip(boundary: &BoundaryLoop, positions: &[Point3<f64>]) -> HolePatch {
    let normal = hole_normal(positions).unwrap_or_else(Vector3::z);
    let mut remaining: Vec<usize> = (0..positions.len()).collect();
    let mut triangles = Vec::new();

    while remaining.len() > 3 {
        let len = remaining.len();
        let ear = (0..len).find(|&i| {
            let prev = remaining[(i + len - 1) % len];
            let next = remaining[(i + 1) % len];
            is_ear(positions, &remaining, prev, remaining[i], next, &normal)
        });

        match ear {
            Some(i) => {
                let prev = remaining[(i + len - 1) % len];
                let next = remaining[(i + 1) % len];
                triangles.push([
                    boundary.vertices[prev],
                    boundary.vertices[remaining[i]],
                    boundary.vertices[next],
                ]);
                remaining.remove(i);
            }
            None => {
                warn!(
                    "Ear clipping stuck with {} vertices remaining, fanning the rest",
                    remaining.len()
                );
                let ring_positions: Vec<Point3<f64>> =
                    remaining.iter().map(|&i| positions[i]).collect();
                return HolePatch {
                    triangles,
                    fan: Some(FanPatch {
                        apex: centroid(&ring_positions),
                        ring: remaining.iter().map(|&i| boundary.vertices[i]).collect(),
                    }),
                };
            }
        }
    }

    if remaining.len() == 3 {
        triangles.push([
            boundary.vertices[remaining[0]],
            boundary.vertices[remaining[1]],
            boundary.vertices[remaining[2]],
        ]);
    }

    HolePatch {
        triangles,
        fan: None,
    }
}

fn centroid(positions: &[Point3<f64>]) -> Point3<f64> {
    let sum = positions
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / positions.len() as f64)
}

/// Newell-style average normal of a loop, None when the loop is degenerate.
fn hole_normal(positions: &[Point3<f64>]) -> Option<Vector3<f64>> {
    let center = centroid(positions);
    let n = positions.len();
    let mut normal = Vector3::zeros();

    for i in 0..n {
        let v0 = positions[i] - center;
        let v1 = positions[(i + 1) % n] - center;
        normal += v0.cross(&v1);
    }

    let len = normal.norm();
    (len > f64::EPSILON).then(|| normal / len)
}

/// Every turn along the loop bends the same way around `normal`.
fn is_convex(positions: &[Point3<f64>], normal: &Vector3<f64>) -> bool {
    let n = positions.len();
    (0..n).all(|i| {
        let e1 = positions[i] - positions[(i + n - 1) % n];
        let e2 = positions[(i + 1) % n] - positions[i];
        let turn = e1.cross(&e2).dot(normal);
        turn >= -1e-9 * e1.norm() * e2.norm()
    })
}

/// Check if vertex at index `curr` forms a valid ear.
fn is_ear(
    positions: &[Point3<f64>],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    hole_normal: &Vector3<f64>,
) -> bool {
    let p_prev = positions[prev];
    let p_curr = positions[curr];
    let p_next = positions[next];

    let tri = Triangle::new(p_prev, p_curr, p_next);
    let Some(tri_normal) = tri.normal() else {
        return false;
    };

    if tri_normal.dot(hole_normal) < 0.0 {
        return false;
    }

    remaining
        .iter()
        .filter(|&&idx| idx != prev && idx != curr && idx != next)
        .all(|&idx| !point_in_triangle_2d(&positions[idx], &p_prev, &p_curr, &p_next, hole_normal))
}

/// Check if point is inside triangle (projected onto plane defined by normal).
fn point_in_triangle_2d(
    p: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    normal: &Vector3<f64>,
) -> bool {
    // Drop the axis most aligned with the normal.
    let abs_normal = normal.abs();

    let (p2, a2, b2, c2) = if abs_normal.z >= abs_normal.x && abs_normal.z >= abs_normal.y {
        ((p.x, p.y), (v0.x, v0.y), (v1.x, v1.y), (v2.x, v2.y))
    } else if abs_normal.y >= abs_normal.x {
        ((p.x, p.z), (v0.x, v0.z), (v1.x, v1.z), (v2.x, v2.z))
    } else {
        ((p.y, p.z), (v0.y, v0.z), (v1.y, v1.z), (v2.y, v2.z))
    };

    let sign = |p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)| -> f64 {
        (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
    };

    let d1 = sign(p2, a2, b2);
    let d2 = sign(p2, b2, c2);
    let d3 = sign(p2, c2, a2);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;

    !(has_neg && has_pos)
}

/// Fill every closed boundary loop in the mesh.
///
/// Holes are triangulated in parallel against the unchanged mesh, then the
/// patches are merged sequentially. Fan apexes become new vertices appended
/// after the existing ones.
pub fn fill_holes(mesh: &mut Mesh, max_ear_clip_vertices: usize) -> HoleFillReport {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let holes = detect_holes(&adjacency);

    let mut report = HoleFillReport {
        holes_found: holes.len(),
        ..Default::default()
    };
    if holes.is_empty() {
        return report;
    }

    let patches: Vec<HolePatch> = holes
        .par_iter()
        .map(|hole| fill_hole(mesh, hole, max_ear_clip_vertices))
        .collect();

    for patch in patches {
        if patch.triangles.is_empty() && patch.fan.is_none() {
            continue;
        }
        report.holes_filled += 1;
        report.faces_added += patch.triangles.len();
        mesh.faces.extend(patch.triangles);

        match patch.fan {
            Some(fan) => {
                report.fanned += 1;
                let apex = mesh.vertices.len() as u32;
                mesh.vertices.push(Vertex::new(fan.apex));
                report.vertices_added += 1;

                let n = fan.ring.len();
                for i in 0..n {
                    mesh.faces.push([fan.ring[i], fan.ring[(i + 1) % n], apex]);
                }
                report.faces_added += n;
            }
            None => report.ear_clipped += 1,
        }
    }

    info!(
        "Filled {} of {} holes ({} ear-clipped, {} fanned), added {} faces",
        report.holes_filled, report.holes_found, report.ear_clipped, report.fanned, report.faces_added
    );

    report
}
