//! Sphere impostor billboards.
//!
//! Every atom of every configuration becomes four vertices and two
//! triangles. The vertex attributes live in four parallel arrays that are
//! always the same length and indexed identically:
//!
//! - `offsets`: quad corner in units of atom radius, already grown by
//!   [`BILLBOARD_MARGIN`] so perspective silhouettes are not clipped
//! - `centers`: world-space atom centre, repeated for the four corners
//! - `mapping`: corner in `[0, 1]` texture space, used by the orthographic
//!   depth shaders to reconstruct the sphere cap
//! - `radii`: atom radius for the current visualization mode

use super::{Element, GeometrySnapshot, Visualization};

/// Vertices emitted per atom.
pub const VERTICES_PER_ATOM: usize = 4;
/// Triangles emitted per atom.
pub const TRIANGLES_PER_ATOM: usize = 2;
/// Indices emitted per atom.
pub const INDICES_PER_ATOM: usize = TRIANGLES_PER_ATOM * 3;
/// Quad half-size relative to the atom radius.
pub const BILLBOARD_MARGIN: f32 = 1.25;

/// Unit quad corners in the order the index pattern expects.
pub const QUAD_CORNERS: [[f32; 2]; VERTICES_PER_ATOM] =
    [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];
/// Two counter-clockwise triangles over [`QUAD_CORNERS`].
pub const QUAD_INDICES: [u32; INDICES_PER_ATOM] = [0, 1, 2, 2, 1, 3];

/// CPU-side sphere billboard arrays for every configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillboardGeometry {
    /// Quad corner offsets in radius units.
    pub offsets: Vec<[f32; 2]>,
    /// World-space atom centre per vertex.
    pub centers: Vec<[f32; 3]>,
    /// Corner mapping in `[0, 1]`.
    pub mapping: Vec<[f32; 2]>,
    /// Atom radius per vertex.
    pub radii: Vec<f32>,
    /// Triangle indices, one contiguous block per configuration.
    pub indices: Vec<u32>,
}

impl BillboardGeometry {
    /// Expand every atom of `snapshot` into a billboard.
    #[must_use]
    pub fn build(
        snapshot: &GeometrySnapshot,
        visualization: Visualization,
    ) -> Self {
        let atoms = snapshot.total_atoms();
        let vertex_count = atoms * VERTICES_PER_ATOM;
        let mut geometry = Self {
            offsets: Vec::with_capacity(vertex_count),
            centers: Vec::with_capacity(vertex_count),
            mapping: Vec::with_capacity(vertex_count),
            radii: vertex_radii(snapshot, visualization),
            indices: Vec::with_capacity(atoms * INDICES_PER_ATOM),
        };

        for (atom, position) in snapshot.positions().iter().enumerate() {
            let base = (atom * VERTICES_PER_ATOM) as u32;
            for corner in QUAD_CORNERS {
                geometry.offsets.push([
                    corner[0] * BILLBOARD_MARGIN,
                    corner[1] * BILLBOARD_MARGIN,
                ]);
                geometry.centers.push(position.to_array());
                geometry.mapping.push([
                    (corner[0] + 1.0) * 0.5,
                    (corner[1] + 1.0) * 0.5,
                ]);
            }
            geometry
                .indices
                .extend(QUAD_INDICES.iter().map(|&i| base + i));
        }
        geometry
    }

    /// Number of vertices in each of the parallel arrays.
    pub fn vertex_count(&self) -> usize {
        self.centers.len()
    }

    /// Whether all four vertex arrays agree on length.
    pub fn is_consistent(&self) -> bool {
        let n = self.centers.len();
        self.offsets.len() == n && self.mapping.len() == n && self.radii.len() == n
    }
}

/// Per-vertex radii for `visualization`. Rebuilt on its own when only the
/// visualization mode changes.
#[must_use]
pub fn vertex_radii(
    snapshot: &GeometrySnapshot,
    visualization: Visualization,
) -> Vec<f32> {
    let table = visualization.radii();
    let per_configuration: Vec<f32> = snapshot
        .elements()
        .iter()
        .map(|&e| table[Element::from_index(e) as usize])
        .collect();
    per_configuration
        .iter()
        .cycle()
        .take(snapshot.total_atoms())
        .flat_map(|&r| [r; VERTICES_PER_ATOM])
        .collect()
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn snapshot(atoms: usize, configurations: usize) -> GeometrySnapshot {
        let positions = (0..atoms * configurations)
            .map(|i| Vec3::splat(i as f32))
            .collect();
        let elements = (0..atoms).map(|i| (i % 7) as u8).collect();
        GeometrySnapshot::new(
            positions,
            elements,
            vec![0; atoms],
            configurations,
            None,
        )
        .unwrap()
    }

    #[test]
    fn parallel_arrays_match() {
        let g = BillboardGeometry::build(
            &snapshot(10, 3),
            Visualization::SolidSpheres,
        );
        assert!(g.is_consistent());
        assert_eq!(g.vertex_count(), 10 * 3 * VERTICES_PER_ATOM);
        assert_eq!(g.indices.len(), 10 * 3 * INDICES_PER_ATOM);
    }

    #[test]
    fn indices_reference_own_atom() {
        let g = BillboardGeometry::build(
            &snapshot(4, 2),
            Visualization::SolidSpheres,
        );
        for (i, chunk) in g.indices.chunks(INDICES_PER_ATOM).enumerate() {
            for &index in chunk {
                assert_eq!(index as usize / VERTICES_PER_ATOM, i);
            }
        }
    }

    #[test]
    fn radii_follow_visualization_and_repeat_per_configuration() {
        let s = snapshot(7, 2);
        let solid = vertex_radii(&s, Visualization::SolidSpheres);
        let ball = vertex_radii(&s, Visualization::BallAndStick);
        assert_eq!(solid[0], 1.70);
        assert_eq!(ball[0], 0.70);
        // element index 6 folds into "other"
        assert_eq!(solid[6 * VERTICES_PER_ATOM], 1.50);
        let second = 7 * VERTICES_PER_ATOM;
        assert_eq!(solid[second..second + 4], solid[..4]);
    }

    #[test]
    fn mapping_spans_unit_square() {
        let g = BillboardGeometry::build(
            &snapshot(1, 1),
            Visualization::SolidSpheres,
        );
        assert_eq!(g.mapping[0], [0.0, 0.0]);
        assert_eq!(g.mapping[3], [1.0, 1.0]);
        assert_eq!(g.offsets[3], [BILLBOARD_MARGIN, BILLBOARD_MARGIN]);
    }
}
