//! Tracing helpers for pipeline stages.
//!
//! Nothing is printed unless the application installs a subscriber:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//! // RUST_LOG=mesh_prep=debug for stage details,
//! // RUST_LOG=mesh_prep::timing=info for timings only.
//! ```
//!
//! # Log Levels
//!
//! - **WARN**: Recoverable defects (open chains, incomplete repair, rejection)
//! - **INFO**: Stage summaries and timing
//! - **DEBUG**: Intermediate mesh state
//! - **TRACE**: Per-face detail

use std::path::Path;
use std::time::Instant;

use nalgebra::Vector3;
use tracing::{Span, debug, info, warn};

use crate::Mesh;
use crate::validate::ValidationResult;

/// A performance timer that logs duration on drop.
///
/// ```rust,ignore
/// fn expensive_stage() {
///     let _timer = OperationTimer::new("expensive_stage");
///     // ... do work ...
/// } // logs elapsed time here
/// ```
pub struct OperationTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTimer {
    /// Create a new operation timer.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("mesh_operation", operation = name);
        debug!(target: "mesh_prep::timing", operation = name, "Starting operation");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Create a timer that also records the mesh size.
    pub fn with_context(name: &'static str, mesh: &Mesh) -> Self {
        let span = tracing::info_span!(
            "mesh_operation",
            operation = name,
            faces = mesh.face_count(),
            vertices = mesh.vertex_count()
        );
        debug!(
            target: "mesh_prep::timing",
            operation = name,
            faces = mesh.face_count(),
            vertices = mesh.vertex_count(),
            "Starting operation"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Get the elapsed time.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Get the span for this timer.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        info!(
            target: "mesh_prep::timing",
            operation = self.name,
            elapsed_ms = format!("{:.2}", elapsed_ms),
            "Operation completed"
        );
    }
}

/// Log mesh size and bounding box at debug level.
pub fn log_mesh_stats(mesh: &Mesh, context: &str) {
    let dims = mesh.extents().unwrap_or_else(Vector3::zeros);

    debug!(
        target: "mesh_prep::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.2} x {:.2} x {:.2}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

/// Log a validation verdict.
pub fn log_validation_result(result: &ValidationResult) {
    let stats = result.stats();
    if result.is_valid() {
        info!(
            target: "mesh_prep::validation",
            volume = format!("{:.3}", stats.volume),
            faces = stats.face_count,
            warnings = result.warnings().len(),
            "Mesh validation passed"
        );
    } else {
        warn!(
            target: "mesh_prep::validation",
            errors = ?result.errors(),
            warnings = ?result.warnings(),
            is_watertight = stats.is_watertight,
            volume = format!("{:.3}", stats.volume),
            "Mesh validation failed"
        );
    }
}

/// Log a file I/O operation.
pub fn log_io_operation(operation: &str, path: &Path, format: &str, success: bool) {
    if success {
        info!(
            target: "mesh_prep::io",
            operation = operation,
            path = %path.display(),
            format = format,
            "I/O operation completed"
        );
    } else {
        warn!(
            target: "mesh_prep::io",
            operation = operation,
            path = %path.display(),
            format = format,
            "I/O operation failed"
        );
    }
}
