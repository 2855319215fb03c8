//! STL import and export.
//!
//! Loading accepts any mesh. Saving accepts only a [`ValidatedMesh`], so a
//! mesh that failed validation has no path to disk.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::{MeshError, MeshResult};
use crate::tracing_ext::log_io_operation;
use crate::validate::ValidatedMesh;
use crate::{Mesh, Vertex};

/// STL encoding used when saving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StlFormat {
    #[default]
    Binary,
    Ascii,
}

impl StlFormat {
    pub fn name(&self) -> &'static str {
        match self {
            StlFormat::Binary => "stl-binary",
            StlFormat::Ascii => "stl-ascii",
        }
    }
}

/// Load an STL file (binary or ASCII). Identical corner positions are merged
/// into shared vertices and index-degenerate facets are dropped.
///
/// # Errors
///
/// `IoRead` when the file cannot be opened, `ParseError` when it is not STL,
/// `EmptyMesh` when it contains no usable facets.
pub fn load_stl(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    let path = path.as_ref();
    let result = read_stl_file(path);
    log_io_operation("load", path, "stl", result.is_ok());
    result
}

fn read_stl_file(path: &Path) -> MeshResult<Mesh> {
    let file = File::open(path).map_err(|e| MeshError::io_read(path, e))?;
    let mut reader = BufReader::new(file);

    let stl = stl_io::read_stl(&mut reader)
        .map_err(|e| MeshError::parse_error(path, e.to_string()))?;

    debug!(
        "STL contains {} vertices, {} triangles",
        stl.vertices.len(),
        stl.faces.len()
    );

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    for v in &stl.vertices {
        mesh.vertices.push(Vertex::from_coords(
            v.0[0] as f64,
            v.0[1] as f64,
            v.0[2] as f64,
        ));
    }

    let mut skipped = 0usize;
    for face in &stl.faces {
        let [a, b, c] = face.vertices;
        if a == b || b == c || a == c {
            skipped += 1;
            continue;
        }
        mesh.faces.push([a as u32, b as u32, c as u32]);
    }
    if skipped > 0 {
        warn!("Dropped {} degenerate facets from {:?}", skipped, path);
    }

    if mesh.faces.is_empty() {
        return Err(MeshError::empty_mesh(format!(
            "{} contains no usable facets",
            path.display()
        )));
    }
    mesh.check_indices()?;

    info!(
        "Loaded mesh: {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.face_count()
    );
    Ok(mesh)
}

/// Save a validated mesh as STL with outward unit facet normals.
///
/// Parent directories are created. The file is written to a temporary
/// sibling and renamed into place, so readers never see a partial file.
pub fn save_stl(mesh: &ValidatedMesh, path: impl AsRef<Path>, format: StlFormat) -> MeshResult<()> {
    let path = path.as_ref();
    let result = write_stl_file(mesh.mesh(), path, format);
    log_io_operation("save", path, format.name(), result.is_ok());
    result
}

fn write_stl_file(mesh: &Mesh, path: &Path, format: StlFormat) -> MeshResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| MeshError::io_write(path, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| MeshError::io_write(path, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        match format {
            StlFormat::Binary => {
                let triangles: Vec<stl_io::Triangle> = facets(mesh)
                    .map(|(normal, corners)| stl_io::Triangle {
                        normal: stl_io::Normal::new(normal),
                        vertices: corners.map(stl_io::Vertex::new),
                    })
                    .collect();
                stl_io::write_stl(&mut writer, triangles.iter())
                    .map_err(|e| MeshError::io_write(path, e))?;
            }
            StlFormat::Ascii => {
                write_ascii(&mut writer, mesh).map_err(|e| MeshError::io_write(path, e))?;
            }
        }
        writer.flush().map_err(|e| MeshError::io_write(path, e))?;
    }

    tmp.persist(path)
        .map_err(|e| MeshError::io_write(path, e.error))?;

    info!(
        "Saved {} triangles to {:?} ({})",
        mesh.face_count(),
        path,
        format.name()
    );
    Ok(())
}

/// Per-face unit normal and corner positions in single precision.
fn facets(mesh: &Mesh) -> impl Iterator<Item = ([f32; 3], [[f32; 3]; 3])> + '_ {
    mesh.triangles().map(|tri| {
        let n = tri.normal().map_or([0.0; 3], |n| [n.x as f32, n.y as f32, n.z as f32]);
        let corner = |p: nalgebra::Point3<f64>| [p.x as f32, p.y as f32, p.z as f32];
        (n, [corner(tri.v0), corner(tri.v1), corner(tri.v2)])
    })
}

fn write_ascii<W: Write>(writer: &mut W, mesh: &Mesh) -> std::io::Result<()> {
    writeln!(writer, "solid meshprep")?;
    for (n, corners) in facets(mesh) {
        writeln!(writer, "  facet normal {} {} {}", n[0], n[1], n[2])?;
        writeln!(writer, "    outer loop")?;
        for [x, y, z] in corners {
            writeln!(writer, "      vertex {} {} {}", x, y, z)?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid meshprep")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MeshErrorCode;
    use crate::validate::PrintabilityValidator;
    use nalgebra::Point3;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn create_test_stl() -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".stl").unwrap();

        writeln!(file, "solid test").unwrap();
        writeln!(file, "  facet normal 0 0 1").unwrap();
        writeln!(file, "    outer loop").unwrap();
        writeln!(file, "      vertex 0 0 0").unwrap();
        writeln!(file, "      vertex 100 0 0").unwrap();
        writeln!(file, "      vertex 0 100 0").unwrap();
        writeln!(file, "    endloop").unwrap();
        writeln!(file, "  endfacet").unwrap();
        writeln!(file, "endsolid test").unwrap();

        file
    }

    fn validated_cube(size: f64) -> ValidatedMesh {
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
        PrintabilityValidator::default()
            .certify(mesh)
            .expect("cube is printable")
    }

    #[test]
    fn test_load_ascii_stl() {
        let file = create_test_stl();
        let mesh = load_stl(file.path()).expect("should load");

        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);

        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(100.0, 100.0, 0.0));
    }

    #[test]
    fn test_binary_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube.stl");
        let cube = validated_cube(10.0);

        save_stl(&cube, &path, StlFormat::Binary).expect("should save");
        // 80-byte header, count, 50 bytes per facet.
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 84 + 12 * 50);

        let reloaded = load_stl(&path).expect("should reload");
        assert_eq!(reloaded.vertex_count(), 8);
        assert_eq!(reloaded.face_count(), 12);
        assert!(reloaded.is_watertight());
        assert!((reloaded.signed_volume() - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_ascii_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cube_ascii.stl");
        validated_cube(2.5)
            .save_stl(&path, StlFormat::Ascii)
            .expect("should save");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("solid meshprep"));
        assert_eq!(text.matches("facet normal").count(), 12);
        assert!(text.contains("facet normal 0 0 -1"));

        let reloaded = load_stl(&path).expect("should reload");
        assert_eq!(reloaded.face_count(), 12);
        assert!(reloaded.is_watertight());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("cube.stl");
        save_stl(&validated_cube(1.0), &path, StlFormat::Binary).expect("should save");
        assert!(path.exists());
        // Only the final file remains in the directory.
        let entries = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_stl("/nonexistent/model.stl").expect_err("missing");
        assert_eq!(err.code(), MeshErrorCode::IoRead);
        assert!(err.location().is_some());
    }

    #[test]
    fn test_load_garbage() {
        let mut file = NamedTempFile::with_suffix(".stl").unwrap();
        file.write_all(b"not an stl file").unwrap();
        let err = load_stl(file.path()).expect_err("garbage");
        assert_eq!(err.code(), MeshErrorCode::ParseError);
    }

    #[test]
    fn test_load_only_degenerate_facets() {
        let mut file = NamedTempFile::with_suffix(".stl").unwrap();
        writeln!(file, "solid flat").unwrap();
        writeln!(file, "  facet normal 0 0 0").unwrap();
        writeln!(file, "    outer loop").unwrap();
        writeln!(file, "      vertex 1 1 1").unwrap();
        writeln!(file, "      vertex 1 1 1").unwrap();
        writeln!(file, "      vertex 2 2 2").unwrap();
        writeln!(file, "    endloop").unwrap();
        writeln!(file, "  endfacet").unwrap();
        writeln!(file, "endsolid flat").unwrap();

        let err = load_stl(file.path()).expect_err("nothing usable");
        assert_eq!(err.code(), MeshErrorCode::EmptyMesh);
    }
}
