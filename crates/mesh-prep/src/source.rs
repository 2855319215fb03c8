//! Mesh producers.
//!
//! The pipeline only needs something that turns a prompt into a [`Mesh`].
//! [`MockShapeSource`] builds closed primitives for testing and demos;
//! [`ExternalModelSource`] runs a generator program that writes an STL file.

use std::f64::consts::PI;
use std::process::Command;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Mesh;
use crate::error::{MeshError, MeshResult};
use crate::io::load_stl;

/// Anything that can produce a raw mesh from a text prompt.
pub trait MeshSource {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Produce a mesh. The result may be broken; the pipeline repairs and
    /// validates it.
    fn produce(&self, prompt: &str) -> MeshResult<Mesh>;
}

/// Primitive shapes built by [`MockShapeSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockShape {
    #[default]
    Box,
    Sphere,
    Cylinder,
}

impl MockShape {
    pub fn name(&self) -> &'static str {
        match self {
            MockShape::Box => "box",
            MockShape::Sphere => "sphere",
            MockShape::Cylinder => "cylinder",
        }
    }
}

impl std::str::FromStr for MockShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "box" | "cube" => Ok(MockShape::Box),
            "sphere" => Ok(MockShape::Sphere),
            "cylinder" => Ok(MockShape::Cylinder),
            other => Err(format!(
                "unknown shape '{}', expected box, sphere or cylinder",
                other
            )),
        }
    }
}

/// Builds watertight, outward-wound primitives centered on the origin.
#[derive(Debug, Clone)]
pub struct MockShapeSource {
    pub shape: MockShape,
    /// Edge length of the box, or diameter (and height) of the round shapes.
    pub size_mm: f64,
    /// Segments around round shapes. Clamped to at least 3.
    pub resolution: usize,
}

impl Default for MockShapeSource {
    fn default() -> Self {
        Self {
            shape: MockShape::Box,
            size_mm: 50.0,
            resolution: 32,
        }
    }
}

impl MockShapeSource {
    pub fn new(shape: MockShape, size_mm: f64) -> Self {
        Self {
            shape,
            size_mm,
            ..Default::default()
        }
    }

    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    /// Build the mesh without going through [`MeshSource`].
    pub fn build(&self) -> Mesh {
        let segments = self.resolution.max(3);
        match self.shape {
            MockShape::Box => box_mesh(self.size_mm),
            MockShape::Sphere => uv_sphere(self.size_mm / 2.0, segments),
            MockShape::Cylinder => cylinder(self.size_mm / 2.0, self.size_mm, segments),
        }
    }
}

impl MeshSource for MockShapeSource {
    fn name(&self) -> &str {
        self.shape.name()
    }

    fn produce(&self, prompt: &str) -> MeshResult<Mesh> {
        if !self.size_mm.is_finite() || self.size_mm <= 0.0 {
            return Err(MeshError::source(
                self.shape.name(),
                format!("size must be positive, got {}", self.size_mm),
            ));
        }
        debug!(shape = self.shape.name(), prompt, "Building mock shape");
        Ok(self.build())
    }
}

fn box_mesh(size: f64) -> Mesh {
    let h = size / 2.0;
    let positions = [
        (-h, -h, -h),
        (h, -h, -h),
        (h, h, -h),
        (-h, h, -h),
        (-h, -h, h),
        (h, -h, h),
        (h, h, h),
        (-h, h, h),
    ]
    .map(|(x, y, z)| Point3::new(x, y, z));
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
    from_generated(positions.to_vec(), faces)
}

/// Quads between an upper ring starting at `upper` and a lower ring starting
/// at `lower`, both with `segments` vertices.
fn ring_band(faces: &mut Vec<[u32; 3]>, upper: u32, lower: u32, segments: u32) {
    for j in 0..segments {
        let k = (j + 1) % segments;
        let (a, b) = (upper + j, upper + k);
        let (c, d) = (lower + j, lower + k);
        faces.push([a, c, d]);
        faces.push([a, d, b]);
    }
}

fn uv_sphere(radius: f64, segments: usize) -> Mesh {
    let stacks = (segments / 2).max(2);
    let seg = segments as u32;

    let mut positions = Vec::with_capacity(2 + (stacks - 1) * segments);
    positions.push(Point3::new(0.0, 0.0, radius));
    for i in 1..stacks {
        let phi = PI * i as f64 / stacks as f64;
        let (ring_r, z) = (radius * phi.sin(), radius * phi.cos());
        for j in 0..segments {
            let theta = 2.0 * PI * j as f64 / segments as f64;
            positions.push(Point3::new(ring_r * theta.cos(), ring_r * theta.sin(), z));
        }
    }
    positions.push(Point3::new(0.0, 0.0, -radius));

    let top = 0u32;
    let bottom = (positions.len() - 1) as u32;
    let ring = |i: usize| 1 + (i as u32 - 1) * seg;
    let last = ring(stacks - 1);

    let mut faces = Vec::with_capacity(2 * segments * (stacks - 1));
    for j in 0..seg {
        let k = (j + 1) % seg;
        faces.push([top, 1 + j, 1 + k]);
        faces.push([bottom, last + k, last + j]);
    }
    for i in 1..stacks - 1 {
        ring_band(&mut faces, ring(i), ring(i + 1), seg);
    }
    from_generated(positions, faces)
}

fn cylinder(radius: f64, height: f64, segments: usize) -> Mesh {
    let seg = segments as u32;
    let half = height / 2.0;

    let mut positions = Vec::with_capacity(2 * segments + 2);
    for z in [-half, half] {
        for j in 0..segments {
            let theta = 2.0 * PI * j as f64 / segments as f64;
            positions.push(Point3::new(radius * theta.cos(), radius * theta.sin(), z));
        }
    }
    positions.push(Point3::new(0.0, 0.0, -half));
    positions.push(Point3::new(0.0, 0.0, half));

    let (bottom, top) = (0u32, seg);
    let (bottom_center, top_center) = (2 * seg, 2 * seg + 1);

    let mut faces = Vec::with_capacity(4 * segments);
    ring_band(&mut faces, top, bottom, seg);
    for j in 0..seg {
        let k = (j + 1) % seg;
        faces.push([top_center, top + j, top + k]);
        faces.push([bottom_center, bottom + k, bottom + j]);
    }
    from_generated(positions, faces)
}

fn from_generated(positions: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Mesh {
    let mut mesh = Mesh::with_capacity(positions.len(), faces.len());
    mesh.vertices
        .extend(positions.into_iter().map(crate::Vertex::new));
    mesh.faces = faces;
    mesh
}

/// Runs an external generator. `{prompt}` and `{output}` in `args` are
/// replaced with the prompt and the STL path the program must write.
#[derive(Debug, Clone)]
pub struct ExternalModelSource {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalModelSource {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: vec!["{prompt}".to_string(), "{output}".to_string()],
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl MeshSource for ExternalModelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn produce(&self, prompt: &str) -> MeshResult<Mesh> {
        let workdir = tempfile::TempDir::new()
            .map_err(|e| MeshError::source(&self.name, format!("no scratch directory: {}", e)))?;
        let output = workdir.path().join("model.stl");
        let output_str = output.to_string_lossy();

        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace("{prompt}", prompt).replace("{output}", &output_str))
            .collect();

        info!(source = %self.name, program = %self.program, "Running external generator");
        let status = Command::new(&self.program)
            .args(&args)
            .current_dir(workdir.path())
            .status()
            .map_err(|e| {
                MeshError::source(&self.name, format!("cannot run '{}': {}", self.program, e))
            })?;

        if !status.success() {
            return Err(MeshError::source(
                &self.name,
                format!("'{}' exited with {}", self.program, status),
            ));
        }
        if !output.exists() {
            return Err(MeshError::source(
                &self.name,
                format!("'{}' did not write {}", self.program, output.display()),
            ));
        }

        load_stl(&output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshErrorCode;

    #[test]
    fn test_box_is_closed_and_centered() {
        let mesh = MockShapeSource::new(MockShape::Box, 20.0)
            .produce("a cube")
            .unwrap();
        assert!(mesh.is_watertight());
        assert!((mesh.signed_volume() - 8000.0).abs() < 1e-9);
        assert!(mesh.bounds_center().unwrap().coords.norm() < 1e-12);
    }

    #[test]
    fn test_sphere_is_closed_and_outward() {
        let source = MockShapeSource::new(MockShape::Sphere, 10.0).with_resolution(24);
        let mesh = source.produce("a ball").unwrap();
        assert!(mesh.is_watertight());
        assert_eq!(mesh.vertex_count(), 2 + 11 * 24);
        let exact = 4.0 / 3.0 * PI * 125.0;
        let volume = mesh.signed_volume();
        assert!(volume > 0.0 && volume < exact);
        assert!(volume > 0.9 * exact);
        assert_eq!(mesh.component_count(), 1);
    }

    #[test]
    fn test_cylinder_vertex_count() {
        let mesh = MockShapeSource::new(MockShape::Cylinder, 10.0)
            .with_resolution(499)
            .build();
        assert_eq!(mesh.vertex_count(), 1000);
        assert!(mesh.is_watertight());
        assert!(mesh.signed_volume() > 0.0);
        let dims = mesh.extents().unwrap();
        assert!((dims.z - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_resolution_clamped() {
        let mesh = MockShapeSource::new(MockShape::Sphere, 10.0)
            .with_resolution(0)
            .build();
        assert!(mesh.is_watertight());
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn test_invalid_size() {
        let err = MockShapeSource::new(MockShape::Box, 0.0)
            .produce("nothing")
            .unwrap_err();
        assert_eq!(err.code(), MeshErrorCode::SourceFailed);
    }

    #[test]
    fn test_shape_parse() {
        assert_eq!("Sphere".parse::<MockShape>(), Ok(MockShape::Sphere));
        assert_eq!("cube".parse::<MockShape>(), Ok(MockShape::Box));
        assert!("torus".parse::<MockShape>().is_err());
    }

    #[test]
    fn test_missing_program() {
        let source = ExternalModelSource::new("missing", "/nonexistent/generator-binary");
        let err = source.produce("a chair").unwrap_err();
        assert_eq!(err.code(), MeshErrorCode::SourceFailed);
    }

    #[cfg(unix)]
    #[test]
    fn test_external_program_output_is_loaded() {
        let script = "printf 'solid t\\nfacet normal 0 0 1\\nouter loop\\nvertex 0 0 0\\nvertex 1 0 0\\nvertex 0 1 0\\nendloop\\nendfacet\\nendsolid t\\n' > \"$1\"";
        let source = ExternalModelSource::new("shell", "sh")
            .with_args(["-c", script, "generator", "{output}"]);
        let mesh = source.produce("a triangle").unwrap();
        assert_eq!(mesh.face_count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_external_program_failure() {
        let source = ExternalModelSource::new("fails", "sh").with_args(["-c", "exit 3"]);
        let err = source.produce("anything").unwrap_err();
        assert!(matches!(err, MeshError::Source { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_external_program_without_output() {
        let source = ExternalModelSource::new("silent", "sh").with_args(["-c", "true"]);
        let err = source.produce("anything").unwrap_err();
        assert_eq!(err.code(), MeshErrorCode::SourceFailed);
    }
}
