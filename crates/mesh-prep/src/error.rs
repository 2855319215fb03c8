//! Error types for the mesh preparation pipeline.
//!
//! Only misuse and environmental failures are errors here: bad configuration,
//! empty input, unreadable files, a generator that crashed. Geometric defects
//! found in a mesh (open boundaries, inverted volume, self-intersections) are
//! reported as data through [`crate::ValidationResult`] instead.
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `MESH-XXXX`:
//! - `MESH-1xxx`: I/O errors (file reading, writing, parsing)
//! - `MESH-2xxx`: Input errors (empty meshes, bad indices)
//! - `MESH-3xxx`: Processing errors (scaling, mesh sources)
//! - `MESH-4xxx`: Configuration errors
//!
//! # Example
//!
//! ```
//! use mesh_prep::{MeshError, MeshErrorCode};
//!
//! let err = MeshError::invalid_vertex_index(5, 100, 50);
//! assert_eq!(err.code(), MeshErrorCode::InvalidVertexIndex);
//! assert_eq!(err.code().as_str(), "MESH-2002");
//! ```

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Machine-readable error codes for [`MeshError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshErrorCode {
    // I/O errors (1xxx)
    /// MESH-1001: Failed to read file
    IoRead = 1001,
    /// MESH-1002: Failed to write file
    IoWrite = 1002,
    /// MESH-1003: Failed to parse file format
    ParseError = 1003,

    // Input errors (2xxx)
    /// MESH-2001: Mesh has no vertices or faces
    EmptyMesh = 2001,
    /// MESH-2002: Face references invalid vertex index
    InvalidVertexIndex = 2002,

    // Processing errors (3xxx)
    /// MESH-3001: Scale factor could not be computed
    ScaleFailed = 3001,
    /// MESH-3002: Mesh source failed to produce a mesh
    SourceFailed = 3002,

    // Configuration errors (4xxx)
    /// MESH-4001: Configuration value out of range
    InvalidConfig = 4001,
    /// MESH-4002: Configuration document could not be parsed
    ConfigParse = 4002,
}

impl MeshErrorCode {
    /// Returns the error code as a string in the format `MESH-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeshErrorCode::IoRead => "MESH-1001",
            MeshErrorCode::IoWrite => "MESH-1002",
            MeshErrorCode::ParseError => "MESH-1003",
            MeshErrorCode::EmptyMesh => "MESH-2001",
            MeshErrorCode::InvalidVertexIndex => "MESH-2002",
            MeshErrorCode::ScaleFailed => "MESH-3001",
            MeshErrorCode::SourceFailed => "MESH-3002",
            MeshErrorCode::InvalidConfig => "MESH-4001",
            MeshErrorCode::ConfigParse => "MESH-4002",
        }
    }
}

impl std::fmt::Display for MeshErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for mesh errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Re-export or regenerate the file.
    ReexportFile { format: Option<String> },
    /// Run the repair stage before this operation.
    RunRepair { operations: Vec<String> },
    /// Check the source mesh or environment.
    CheckSourceMesh { checks: Vec<String> },
    /// Adjust configuration values.
    AdjustParameters { parameters: Vec<(String, String)> },
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::ReexportFile { format } => {
                if let Some(fmt) = format {
                    write!(f, "Try re-exporting the mesh as {}", fmt)
                } else {
                    write!(f, "Try re-exporting the mesh from the original software")
                }
            }
            RecoverySuggestion::RunRepair { operations } => {
                write!(f, "Run repair operations: {}", operations.join(", "))
            }
            RecoverySuggestion::CheckSourceMesh { checks } => {
                write!(f, "Check the source for: {}", checks.join(", "))
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
        }
    }
}

/// Errors that can occur while preparing a mesh.
#[derive(Debug, Error, Diagnostic)]
pub enum MeshError {
    /// Error reading from a file.
    #[error("failed to read mesh from {path}")]
    #[diagnostic(
        code(mesh::io::read),
        help("Check that the file exists and is readable. Try: ls -la {}", path.display())
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write mesh to {path}")]
    #[diagnostic(
        code(mesh::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing an STL file.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(mesh::parse::error),
        help("The file may be corrupted or truncated. Try re-exporting it as binary STL.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Empty mesh (no vertices or faces).
    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(mesh::input::empty),
        help("The mesh must have at least one face. Check that the generator produced geometry.")
    )]
    EmptyMesh { details: String },

    /// Invalid vertex index in face data.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(
        code(mesh::input::vertex_index),
        help("Faces must only reference existing vertices. Build meshes with `Mesh::from_parts`.")
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Scale factor could not be computed for the selected axis.
    #[error("cannot scale along {axis}: extent is {extent}")]
    #[diagnostic(
        code(mesh::scale::degenerate),
        help("The mesh is flat or collapsed along this axis. Pick another scale axis.")
    )]
    Scale { axis: &'static str, extent: f64 },

    /// A mesh source failed to produce a mesh.
    #[error("mesh source '{source_name}' failed: {details}")]
    #[diagnostic(
        code(mesh::source::failed),
        help("Check the generator command and its output file.")
    )]
    Source { source_name: String, details: String },

    /// Configuration value out of range.
    #[error("invalid configuration: {field} {details}")]
    #[diagnostic(
        code(mesh::config::invalid),
        help("See `PipelineConfig::default()` for accepted values.")
    )]
    InvalidConfig { field: &'static str, details: String },

    /// Configuration document could not be parsed.
    #[error("failed to parse configuration: {details}")]
    #[diagnostic(code(mesh::config::parse))]
    ConfigParse { details: String },
}

impl MeshError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> MeshErrorCode {
        match self {
            MeshError::IoRead { .. } => MeshErrorCode::IoRead,
            MeshError::IoWrite { .. } => MeshErrorCode::IoWrite,
            MeshError::ParseError { .. } => MeshErrorCode::ParseError,
            MeshError::EmptyMesh { .. } => MeshErrorCode::EmptyMesh,
            MeshError::InvalidVertexIndex { .. } => MeshErrorCode::InvalidVertexIndex,
            MeshError::Scale { .. } => MeshErrorCode::ScaleFailed,
            MeshError::Source { .. } => MeshErrorCode::SourceFailed,
            MeshError::InvalidConfig { .. } => MeshErrorCode::InvalidConfig,
            MeshError::ConfigParse { .. } => MeshErrorCode::ConfigParse,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            MeshError::IoRead { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            MeshError::IoWrite { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            MeshError::ParseError { .. } => RecoverySuggestion::ReexportFile {
                format: Some("binary STL".into()),
            },
            MeshError::EmptyMesh { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["mesh has geometry".into(), "generator output".into()],
            },
            MeshError::InvalidVertexIndex { .. } => RecoverySuggestion::RunRepair {
                operations: vec!["repair".into()],
            },
            MeshError::Scale { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("scale_axis".into(), "longest_dimension".into())],
            },
            MeshError::Source { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["generator command".into(), "generator output".into()],
            },
            MeshError::InvalidConfig { field, .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![((*field).into(), "use the default value".into())],
            },
            MeshError::ConfigParse { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["configuration syntax".into()],
            },
        }
    }

    /// Returns the file involved in this error, if any.
    pub fn location(&self) -> Option<&std::path::Path> {
        match self {
            MeshError::IoRead { path, .. }
            | MeshError::IoWrite { path, .. }
            | MeshError::ParseError { path, .. } => Some(path.as_path()),
            _ => None,
        }
    }

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MeshError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        MeshError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        MeshError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create an InvalidVertexIndex error.
    pub fn invalid_vertex_index(face_index: usize, vertex_index: u32, vertex_count: usize) -> Self {
        MeshError::InvalidVertexIndex {
            face_index,
            vertex_index,
            vertex_count,
        }
    }

    /// Create a Scale error.
    pub fn scale(axis: &'static str, extent: f64) -> Self {
        MeshError::Scale { axis, extent }
    }

    /// Create a Source error.
    pub fn source(source_name: impl Into<String>, details: impl Into<String>) -> Self {
        MeshError::Source {
            source_name: source_name.into(),
            details: details.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(field: &'static str, details: impl Into<String>) -> Self {
        MeshError::InvalidConfig {
            field,
            details: details.into(),
        }
    }

    /// Create a ConfigParse error.
    pub fn config_parse(details: impl Into<String>) -> Self {
        MeshError::ConfigParse {
            details: details.into(),
        }
    }
}
