//! Property-based tests for mesh preparation.
//!
//! These tests use proptest to generate random meshes and verify invariants.
//!
//! Run with: cargo test -p mesh-prep -- proptest

use mesh_prep::{
    Mesh, MeshRepairer, PipelineConfig, PrintabilityValidator, ScaleAxis, ScaleNormalizer, Vertex,
    repair::weld_vertices,
};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_position() -> impl Strategy<Value = [f64; 3]> {
    prop::array::uniform3(-100.0..100.0f64)
}

fn arb_vertex() -> impl Strategy<Value = Vertex> {
    arb_position().prop_map(|[x, y, z]| Vertex::from_coords(x, y, z))
}

/// Random triangle soup with in-range indices.
fn arb_mesh(
    min_vertices: usize,
    max_vertices: usize,
    min_faces: usize,
    max_faces: usize,
) -> impl Strategy<Value = Mesh> {
    (min_vertices..=max_vertices).prop_flat_map(move |num_vertices| {
        let vertices = prop::collection::vec(arb_vertex(), num_vertices);

        vertices.prop_flat_map(move |verts| {
            let n = verts.len() as u32;
            let face = prop::array::uniform3(0..n);
            let faces = prop::collection::vec(face, min_faces..=max_faces);

            faces.prop_map(move |f| Mesh {
                vertices: verts.clone(),
                faces: f,
            })
        })
    })
}

/// Box extents away from zero.
fn arb_extents() -> impl Strategy<Value = [f64; 3]> {
    prop::array::uniform3(0.1..500.0f64)
}

fn box_mesh([dx, dy, dz]: [f64; 3], offset: [f64; 3]) -> Mesh {
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
        mesh.vertices.push(Vertex::from_coords(
            x * dx + offset[0],
            y * dy + offset[1],
            z * dz + offset[2],
        ));
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

// =============================================================================
// Repair
// =============================================================================

proptest! {
    /// Repair never panics and never leaves dangling indices.
    #[test]
    fn proptest_repair_keeps_indices_valid(mesh in arb_mesh(3, 40, 1, 30)) {
        let repaired = MeshRepairer::default().repair(mesh);
        prop_assert!(repaired.check_indices().is_ok());
        for face in &repaired.faces {
            prop_assert!(face[0] != face[1] && face[1] != face[2] && face[0] != face[2],
                "Found collapsed face: {:?}", face);
        }
    }

    /// Repair returns a closed box untouched.
    #[test]
    fn proptest_repair_idempotent_on_boxes(
        extents in arb_extents(),
        offset in arb_position(),
    ) {
        let mesh = box_mesh(extents, offset);
        let (repaired, summary) = MeshRepairer::default().repair_with_summary(mesh.clone());
        prop_assert!(summary.was_watertight);
        prop_assert_eq!(repaired.faces, mesh.faces);
        prop_assert_eq!(repaired.vertices, mesh.vertices);
    }

    /// Dropping any single face from a box is repaired back to a closed box.
    #[test]
    fn proptest_single_hole_is_closed(
        extents in arb_extents(),
        removed in 0usize..12,
    ) {
        let mut mesh = box_mesh(extents, [0.0; 3]);
        mesh.faces.remove(removed);
        let (repaired, summary) = MeshRepairer::default().repair_with_summary(mesh);
        prop_assert!(summary.is_watertight);
        prop_assert!(repaired.is_watertight());
        prop_assert!(repaired.signed_volume() > 0.0);
    }

    /// Welding never increases the vertex count.
    #[test]
    fn proptest_weld_does_not_increase_vertices(mesh in arb_mesh(10, 100, 5, 30)) {
        let original_count = mesh.vertex_count();
        let mut m = mesh.clone();
        weld_vertices(&mut m, 1e-6);
        prop_assert!(m.vertex_count() <= original_count);
        prop_assert!(m.check_indices().is_ok());
    }
}

// =============================================================================
// Scaling
// =============================================================================

proptest! {
    /// The selected extent matches the target and the box center lands on
    /// the origin.
    #[test]
    fn proptest_scale_hits_target(
        extents in arb_extents(),
        offset in arb_position(),
        target in 1.0..1000.0f64,
    ) {
        let mesh = box_mesh(extents, offset);
        let scaled = ScaleNormalizer::new(target, ScaleAxis::LongestDimension)
            .normalize(mesh)
            .expect("box has volume");

        let dims = scaled.extents().expect("non-empty");
        prop_assert!((dims.max() - target).abs() < 1e-6 * target);

        let center = scaled.bounds_center().expect("non-empty");
        prop_assert!(center.coords.norm() < 1e-6 * target);
    }

    /// Scaling keeps proportions.
    #[test]
    fn proptest_scale_is_uniform(extents in arb_extents(), target in 1.0..1000.0f64) {
        let mesh = box_mesh(extents, [0.0; 3]);
        let scaled = ScaleNormalizer::new(target, ScaleAxis::X)
            .normalize(mesh)
            .expect("box has volume");
        let dims = scaled.extents().expect("non-empty");
        let factor = target / extents[0];
        prop_assert!((dims.y - extents[1] * factor).abs() < 1e-6 * dims.y.max(1.0));
        prop_assert!((dims.z - extents[2] * factor).abs() < 1e-6 * dims.z.max(1.0));
    }
}

// =============================================================================
// Validation
// =============================================================================

proptest! {
    /// Validation never mutates its input and `is_valid` tracks the errors.
    #[test]
    fn proptest_validation_is_consistent(mesh in arb_mesh(3, 40, 1, 20)) {
        let before = mesh.clone();
        let result = PrintabilityValidator::default().validate(&mesh);
        prop_assert_eq!(result.is_valid(), result.errors().is_empty());
        prop_assert_eq!(result.stats().face_count, mesh.face_count());
        prop_assert_eq!(mesh.faces, before.faces);
    }

    /// A closed box of any size validates, save for the small-volume warning.
    #[test]
    fn proptest_boxes_validate(extents in arb_extents(), offset in arb_position()) {
        let mesh = box_mesh(extents, offset);
        let result = PrintabilityValidator::from_config(&PipelineConfig::default()).validate(&mesh);
        prop_assert!(result.is_valid(), "{}", result);
        prop_assert!(result.stats().volume > 0.0);
    }

    /// Bounding box should contain all vertices.
    #[test]
    fn proptest_bounds_contain_all_vertices(mesh in arb_mesh(3, 100, 1, 50)) {
        if let Some((min, max)) = mesh.bounds() {
            for vertex in &mesh.vertices {
                prop_assert!(vertex.position.x >= min.x && vertex.position.x <= max.x);
                prop_assert!(vertex.position.y >= min.y && vertex.position.y <= max.y);
                prop_assert!(vertex.position.z >= min.z && vertex.position.z <= max.z);
            }
        }
    }

    /// Volume can be negative for inside-out meshes, but must be finite.
    #[test]
    fn proptest_volume_and_area_finite(mesh in arb_mesh(3, 50, 1, 20)) {
        prop_assert!(mesh.signed_volume().is_finite());
        prop_assert!(mesh.surface_area() >= 0.0);
    }
}
