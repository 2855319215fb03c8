//! Edge-to-face adjacency with traversal direction.
//!
//! Each undirected edge remembers which faces use it and in which direction
//! they walk it. That is enough to answer every topology question the
//! pipeline asks: boundary edges, non-manifold edges, and whether the
//! surface is watertight with consistent winding.

use hashbrown::HashMap;

/// One face's use of an undirected edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeUse {
    /// Face index.
    pub face: usize,
    /// True when the face walks the edge from the lower to the higher vertex index.
    pub forward: bool,
}

impl EdgeUse {
    /// Does this face walk the edge from `from` to `to`?
    #[inline]
    pub fn traverses(&self, from: u32, to: u32) -> bool {
        self.forward == (from < to)
    }
}

/// Adjacency information for a face list.
#[derive(Debug, Clone, Default)]
pub struct MeshAdjacency {
    /// Maps edge (v0, v1) with v0 < v1 to the faces using it.
    edge_to_faces: HashMap<(u32, u32), Vec<EdgeUse>>,
}

impl MeshAdjacency {
    /// Build adjacency information from a list of faces.
    ///
    /// ```
    /// use mesh_prep::MeshAdjacency;
    ///
    /// let faces = vec![[0, 1, 2], [1, 3, 2]];
    /// let adj = MeshAdjacency::build(&faces);
    ///
    /// assert_eq!(adj.boundary_edge_count(), 4);
    /// assert!(!adj.is_watertight());
    /// ```
    #[must_use]
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<EdgeUse>> =
            HashMap::with_capacity(faces.len() * 3 / 2);

        for (face_idx, face) in faces.iter().enumerate() {
            for (a, b) in face_edges(face) {
                edge_to_faces
                    .entry(normalize_edge(a, b))
                    .or_default()
                    .push(EdgeUse {
                        face: face_idx,
                        forward: a < b,
                    });
            }
        }

        Self { edge_to_faces }
    }

    /// Faces using an edge, in either direction.
    #[must_use]
    pub fn edge_uses(&self, v0: u32, v1: u32) -> &[EdgeUse] {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map_or(&[], Vec::as_slice)
    }

    /// Faces that share at least one edge with `face`.
    pub fn face_neighbors<'a>(
        &'a self,
        face_idx: usize,
        face: &[u32; 3],
    ) -> impl Iterator<Item = usize> + 'a {
        let edges = face_edges(face);
        edges.into_iter().flat_map(move |(a, b)| {
            self.edge_uses(a, b)
                .iter()
                .map(|u| u.face)
                .filter(move |&f| f != face_idx)
        })
    }

    /// Edges used by exactly one face, as stored (lower index first).
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, uses)| uses.len() == 1)
            .map(|(&edge, _)| edge)
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|u| u.len() == 1).count()
    }

    /// Edges used by more than two faces.
    #[must_use]
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|u| u.len() > 2).count()
    }

    /// Every edge is shared by exactly two faces, regardless of winding.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !self.edge_to_faces.is_empty() && self.edge_to_faces.values().all(|u| u.len() == 2)
    }

    /// Every edge is shared by exactly two faces that walk it in opposite
    /// directions.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        !self.edge_to_faces.is_empty()
            && self
                .edge_to_faces
                .values()
                .all(|u| u.len() == 2 && u[0].forward != u[1].forward)
    }
}

/// The three directed edges of a face in winding order.
#[inline]
pub fn face_edges(face: &[u32; 3]) -> [(u32, u32); 3] {
    [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])]
}

/// Order an edge so the lower vertex index comes first.
#[inline]
pub fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}
