//! Cylinder impostor billboards for ball-and-stick bonds.

use bytemuck::{Pod, Zeroable};

use super::{
    billboard::{INDICES_PER_ATOM, QUAD_INDICES, VERTICES_PER_ATOM},
    GeometrySnapshot,
};

/// Cylinder radius in Ångström.
pub const BOND_RADIUS: f32 = 0.2;
/// Vertices emitted per bond.
pub const VERTICES_PER_BOND: usize = VERTICES_PER_ATOM;
/// Indices emitted per bond.
pub const INDICES_PER_BOND: usize = INDICES_PER_ATOM;

/// One corner of a bond billboard.
///
/// `corner.x` picks the side of the cylinder (`-1` or `1`), `corner.y`
/// picks the end (`0` at atom A, `1` at atom B). Element indices let the
/// shader trim the cylinder back to the atom surfaces.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BondVertex {
    /// World-space centre of atom A.
    pub position_a: [f32; 3],
    /// Element class of atom A.
    pub element_a: u32,
    /// World-space centre of atom B.
    pub position_b: [f32; 3],
    /// Element class of atom B.
    pub element_b: u32,
    /// Billboard corner.
    pub corner: [f32; 2],
}

const BOND_CORNERS: [[f32; 2]; VERTICES_PER_BOND] =
    [[-1.0, 0.0], [1.0, 0.0], [-1.0, 1.0], [1.0, 1.0]];

/// CPU-side bond billboards for every configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BondGeometry {
    /// Four vertices per bond.
    pub vertices: Vec<BondVertex>,
    /// Six indices per bond, one contiguous block per configuration.
    pub indices: Vec<u32>,
}

impl BondGeometry {
    /// Build bond billboards, or `None` if the structure has no bonds.
    #[must_use]
    pub fn build(snapshot: &GeometrySnapshot) -> Option<Self> {
        let topology = snapshot.bonds()?;
        let mut geometry = Self {
            vertices: Vec::with_capacity(topology.pairs.len() * VERTICES_PER_BOND),
            indices: Vec::with_capacity(topology.pairs.len() * INDICES_PER_BOND),
        };
        let starts = topology.array_starts();
        let elements = snapshot.elements();

        for (configuration, (&start, &count)) in starts
            .iter()
            .zip(&topology.per_configuration)
            .enumerate()
        {
            let atoms = snapshot.configuration(configuration);
            let pairs =
                &topology.pairs[start as usize..(start + count) as usize];
            for &[a, b] in pairs {
                let (a, b) = (a as usize, b as usize);
                let base = geometry.vertices.len() as u32;
                for corner in BOND_CORNERS {
                    geometry.vertices.push(BondVertex {
                        position_a: atoms[a].to_array(),
                        element_a: u32::from(elements[a]),
                        position_b: atoms[b].to_array(),
                        element_b: u32::from(elements[b]),
                        corner,
                    });
                }
                geometry
                    .indices
                    .extend(QUAD_INDICES.iter().map(|&i| base + i));
            }
        }
        Some(geometry)
    }

    /// Number of bonds across all configurations.
    pub fn bond_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_BOND
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::geometry::BondTopology;

    #[test]
    fn no_topology_builds_nothing() {
        let snapshot = GeometrySnapshot::new(
            vec![Vec3::ZERO; 2],
            vec![0; 2],
            vec![0; 2],
            1,
            None,
        )
        .unwrap();
        assert!(BondGeometry::build(&snapshot).is_none());
    }

    #[test]
    fn bonds_use_their_own_configuration_positions() {
        let positions = vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(11.0, 0.0, 0.0),
        ];
        let snapshot = GeometrySnapshot::new(
            positions,
            vec![0, 3],
            vec![0; 2],
            2,
            Some(BondTopology::repeated(&[[0, 1]], 2)),
        )
        .unwrap();
        let bonds = BondGeometry::build(&snapshot).unwrap();
        assert_eq!(bonds.bond_count(), 2);
        assert_eq!(bonds.indices.len(), 2 * INDICES_PER_BOND);
        let second = &bonds.vertices[VERTICES_PER_BOND];
        assert_eq!(second.position_a, [10.0, 0.0, 0.0]);
        assert_eq!(second.element_b, 3);
        assert_eq!(bonds.indices[INDICES_PER_BOND], VERTICES_PER_BOND as u32);
    }

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(size_of::<BondVertex>(), 40);
    }
}
