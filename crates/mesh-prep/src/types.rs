//! Core mesh types.

use nalgebra::{Point3, Vector3};

use crate::adjacency::MeshAdjacency;
use crate::components::find_connected_components;
use crate::error::{MeshError, MeshResult};

/// A vertex position in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,
}

impl Vertex {
    /// Create a new vertex at `position`.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self { position }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// A triangle mesh with indexed vertices and faces.
///
/// Every derived quantity (bounds, volume, watertightness, component count)
/// is recomputed on demand, so mutating `vertices` or `faces` directly never
/// leaves a stale cache behind.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    /// Each face is [v0, v1, v2] with counter-clockwise winding seen from outside.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Build a mesh from raw positions and faces, rejecting out-of-range indices.
    pub fn from_parts(positions: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> MeshResult<Self> {
        let mesh = Self {
            vertices: positions.into_iter().map(Vertex::new).collect(),
            faces,
        };
        mesh.check_indices()?;
        Ok(mesh)
    }

    /// Verify that every face references an existing vertex.
    pub fn check_indices(&self) -> MeshResult<()> {
        let vertex_count = self.vertices.len();
        for (face_index, face) in self.faces.iter().enumerate() {
            if let Some(&bad) = face.iter().find(|&&v| v as usize >= vertex_count) {
                return Err(MeshError::invalid_vertex_index(face_index, bad, vertex_count));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// True when the mesh has no faces.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if the mesh has no vertices.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let mut min = first;
        let mut max = first;

        for vertex in &self.vertices[1..] {
            let p = &vertex.position;
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }

    /// Bounding box size along each axis.
    pub fn extents(&self) -> Option<Vector3<f64>> {
        self.bounds().map(|(min, max)| max - min)
    }

    /// Center of the bounding box (not the vertex centroid).
    pub fn bounds_center(&self) -> Option<Point3<f64>> {
        self.bounds().map(|(min, max)| nalgebra::center(&min, &max))
    }

    /// Number of vertices with a NaN or infinite coordinate.
    pub fn non_finite_vertex_count(&self) -> usize {
        self.vertices
            .iter()
            .filter(|v| !v.position.coords.iter().all(|c| c.is_finite()))
            .count()
    }

    /// Iterate over triangles, yielding Triangle structs with actual vertex data.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }

    /// Get a specific triangle by face index.
    pub fn triangle(&self, face_idx: usize) -> Option<Triangle> {
        self.faces.get(face_idx).map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }

    /// Translate mesh by the given vector.
    pub fn translate(&mut self, offset: Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Scale mesh uniformly around the origin.
    pub fn scale(&mut self, factor: f64) {
        for vertex in &mut self.vertices {
            vertex.position.coords *= factor;
        }
    }

    /// Reverse the winding of every face.
    pub fn flip_all_faces(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
    }

    /// Compute the signed volume of the mesh.
    ///
    /// Sum of signed tetrahedra formed by each face and the origin. For a
    /// closed mesh with outward-facing normals this is positive; an
    /// inside-out mesh yields a negative value. The result is not meaningful
    /// for open meshes.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;

        for &[i0, i1, i2] in &self.faces {
            let v0 = &self.vertices[i0 as usize].position.coords;
            let v1 = &self.vertices[i1 as usize].position.coords;
            let v2 = &self.vertices[i2 as usize].position.coords;
            volume += v0.dot(&v1.cross(v2));
        }

        volume / 6.0
    }

    /// Absolute enclosed volume.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Check if the mesh appears to be inside-out (negative signed volume).
    #[inline]
    pub fn is_inside_out(&self) -> bool {
        self.signed_volume() < 0.0
    }

    /// Compute the total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Every undirected edge is shared by exactly two faces traversing it in
    /// opposite directions. A mesh with no faces is never watertight.
    pub fn is_watertight(&self) -> bool {
        !self.faces.is_empty() && MeshAdjacency::build(&self.faces).is_watertight()
    }

    /// Number of edge-connected face groups.
    pub fn component_count(&self) -> usize {
        find_connected_components(self).component_count
    }
}

/// A triangle with concrete vertex positions.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Cross product of the two leading edges; length is twice the area.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit normal, or None for a degenerate triangle.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len = n.norm();
        if len > f64::EPSILON {
            Some(n / len)
        } else {
            None
        }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    #[inline]
    pub fn centroid(&self) -> Point3<f64> {
        Point3::from((self.v0.coords + self.v1.coords + self.v2.coords) / 3.0)
    }

    /// Area below `epsilon`.
    #[inline]
    pub fn is_degenerate(&self, epsilon: f64) -> bool {
        self.area() < epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    fn unit_cube() -> Mesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let faces = vec![
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
        Mesh::from_parts(positions, faces).expect("valid cube")
    }

    #[test]
    fn test_vertex_creation() {
        let v = Vertex::from_coords(1.0, 2.0, 3.0);
        assert!(approx_eq(v.position.x, 1.0));
        assert!(approx_eq(v.position.y, 2.0));
        assert!(approx_eq(v.position.z, 3.0));
    }

    #[test]
    fn test_triangle_normal() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );

        let normal = tri.normal().expect("non-degenerate triangle");
        assert!(approx_eq(normal.x, 0.0));
        assert!(approx_eq(normal.y, 0.0));
        assert!(approx_eq(normal.z, 1.0));
        assert!(approx_eq(tri.area(), 0.5));
    }

    #[test]
    fn test_degenerate_triangle() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(tri.normal().is_none());
        assert!(tri.is_degenerate(1e-10));
    }

    #[test]
    fn test_from_parts_rejects_bad_index() {
        let err = Mesh::from_parts(vec![Point3::origin(); 3], vec![[0, 1, 3]])
            .expect_err("index 3 is out of range");
        match err {
            MeshError::InvalidVertexIndex {
                face_index,
                vertex_index,
                vertex_count,
            } => {
                assert_eq!(face_index, 0);
                assert_eq!(vertex_index, 3);
                assert_eq!(vertex_count, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_mesh_bounds_and_extents() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(10.0, 5.0, 3.0));
        mesh.vertices.push(Vertex::from_coords(-2.0, 8.0, 1.0));

        let (min, max) = mesh.bounds().expect("non-empty mesh");
        assert!(approx_eq(min.x, -2.0));
        assert!(approx_eq(max.y, 8.0));

        let extents = mesh.extents().expect("non-empty mesh");
        assert!(approx_eq(extents.x, 12.0));
        assert!(approx_eq(extents.y, 8.0));
        assert!(approx_eq(extents.z, 3.0));

        let center = mesh.bounds_center().expect("non-empty mesh");
        assert!(approx_eq(center.x, 4.0));
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = Mesh::new();
        assert!(mesh.bounds().is_none());
        assert!(mesh.is_empty());
        assert!(!mesh.is_watertight());
        assert_eq!(mesh.component_count(), 0);
    }

    #[test]
    fn test_cube_derived_queries() {
        let cube = unit_cube();
        assert!(approx_eq(cube.signed_volume(), 1.0));
        assert!(approx_eq(cube.surface_area(), 6.0));
        assert!(cube.is_watertight());
        assert_eq!(cube.component_count(), 1);
        assert!(!cube.is_inside_out());
    }

    #[test]
    fn test_flip_all_faces_inverts_volume() {
        let mut cube = unit_cube();
        cube.flip_all_faces();
        assert!(approx_eq(cube.signed_volume(), -1.0));
        assert!(cube.is_inside_out());
        // Consistently inverted is still closed.
        assert!(cube.is_watertight());
    }

    #[test]
    fn test_translate_and_scale() {
        let mut cube = unit_cube();
        cube.scale(2.0);
        cube.translate(Vector3::new(-1.0, -1.0, -1.0));
        let (min, max) = cube.bounds().expect("cube has vertices");
        assert!(approx_eq(min.x, -1.0));
        assert!(approx_eq(max.z, 1.0));
        assert!(approx_eq(cube.volume(), 8.0));
    }
}
