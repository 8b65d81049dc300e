//! CPU-side structure description and impostor geometry generation.
//!
//! A [`GeometrySnapshot`] is the immutable hand-off from whatever loaded the
//! structure. It is validated once on construction; the builders in
//! [`billboard`] and [`bonds`] then expand it into the vertex and index
//! arrays the device buffers are filled from.

pub mod billboard;
pub mod bonds;
pub mod synthetic;

use std::fmt;

use glam::Vec3;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::math::BoundingSphere;

/// Errors from validating a [`GeometrySnapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// `configuration_count` was zero while atoms were supplied.
    NoConfigurations,
    /// Position count is not `atoms_per_configuration * configuration_count`.
    PositionCount {
        /// Expected number of positions.
        expected: usize,
        /// Number of positions supplied.
        actual: usize,
    },
    /// Element or subunit array length differs from the atom count.
    AttributeCount {
        /// Which attribute array was wrong.
        attribute: &'static str,
        /// Expected length (`atoms_per_configuration`).
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
    /// Bond topology does not cover every configuration.
    BondConfigurationCount {
        /// Expected number of per-configuration counts.
        expected: usize,
        /// Supplied number.
        actual: usize,
    },
    /// Sum of per-configuration bond counts differs from the pair count.
    BondPairCount {
        /// Sum of per-configuration counts.
        expected: usize,
        /// Number of bond pairs supplied.
        actual: usize,
    },
    /// A bond references an atom outside its configuration.
    BondIndexOutOfRange {
        /// Index of the offending bond pair.
        bond: usize,
        /// Offending atom index.
        atom: u32,
    },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConfigurations => {
                write!(f, "atoms supplied with zero configurations")
            }
            Self::PositionCount { expected, actual } => write!(
                f,
                "expected {expected} atom positions, got {actual}"
            ),
            Self::AttributeCount {
                attribute,
                expected,
                actual,
            } => write!(
                f,
                "expected {expected} {attribute} entries, got {actual}"
            ),
            Self::BondConfigurationCount { expected, actual } => write!(
                f,
                "expected bond counts for {expected} configurations, got \
                 {actual}"
            ),
            Self::BondPairCount { expected, actual } => write!(
                f,
                "bond counts sum to {expected} but {actual} pairs supplied"
            ),
            Self::BondIndexOutOfRange { bond, atom } => {
                write!(f, "bond {bond} references atom {atom} out of range")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Element classes that have their own radius and default colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Element {
    /// Carbon.
    Carbon = 0,
    /// Hydrogen.
    Hydrogen = 1,
    /// Nitrogen.
    Nitrogen = 2,
    /// Oxygen.
    Oxygen = 3,
    /// Sulfur.
    Sulfur = 4,
    /// Anything else.
    Other = 5,
}

impl Element {
    /// Number of element classes with their own radius.
    pub const COUNT: usize = 6;

    /// Class of an element symbol, case-insensitive.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol.trim().to_ascii_uppercase().as_str() {
            "C" => Self::Carbon,
            "H" => Self::Hydrogen,
            "N" => Self::Nitrogen,
            "O" => Self::Oxygen,
            "S" => Self::Sulfur,
            _ => Self::Other,
        }
    }

    /// Class for a raw element index, folding anything out of range into
    /// [`Element::Other`].
    #[must_use]
    pub fn from_index(index: u8) -> Self {
        match index {
            0 => Self::Carbon,
            1 => Self::Hydrogen,
            2 => Self::Nitrogen,
            3 => Self::Oxygen,
            4 => Self::Sulfur,
            _ => Self::Other,
        }
    }
}

/// How atoms (and bonds) are drawn.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    Default,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Visualization {
    /// Van der Waals spheres, no bonds.
    #[default]
    SolidSpheres,
    /// Small atomic spheres joined by cylinders.
    BallAndStick,
}

impl Visualization {
    /// Radius of each [`Element`] class in Ångström.
    #[must_use]
    pub const fn radii(self) -> [f32; Element::COUNT] {
        match self {
            Self::SolidSpheres => [1.70, 1.10, 1.55, 1.52, 1.80, 1.50],
            Self::BallAndStick => [0.70, 0.25, 0.65, 0.60, 1.00, 0.50],
        }
    }

    /// Whether bonds are drawn in this mode.
    #[must_use]
    pub const fn draws_bonds(self) -> bool {
        matches!(self, Self::BallAndStick)
    }
}

/// Bond pairs for every configuration, concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BondTopology {
    /// Atom index pairs, local to their configuration.
    pub pairs: Vec<[u32; 2]>,
    /// Number of pairs belonging to each configuration, in order.
    pub per_configuration: Vec<u32>,
}

impl BondTopology {
    /// Same bond list repeated for every configuration, the common case
    /// for trajectories where connectivity does not change.
    #[must_use]
    pub fn repeated(pairs: &[[u32; 2]], configuration_count: usize) -> Self {
        Self {
            pairs: pairs
                .iter()
                .copied()
                .cycle()
                .take(pairs.len() * configuration_count)
                .collect(),
            per_configuration: vec![pairs.len() as u32; configuration_count],
        }
    }

    /// Index of the first pair of each configuration.
    #[must_use]
    pub fn array_starts(&self) -> Vec<u32> {
        self.per_configuration
            .iter()
            .scan(0u32, |start, &count| {
                let current = *start;
                *start += count;
                Some(current)
            })
            .collect()
    }
}

/// Immutable description of a structure with one or more configurations.
#[derive(Debug, Clone, Default)]
pub struct GeometrySnapshot {
    positions: Vec<Vec3>,
    elements: Vec<u8>,
    subunits: Vec<u16>,
    bonds: Option<BondTopology>,
    atoms_per_configuration: usize,
    configuration_count: usize,
    bounding_sphere: BoundingSphere,
}

impl GeometrySnapshot {
    /// Validate and build a snapshot.
    ///
    /// `positions` holds `configuration_count` consecutive blocks of
    /// `elements.len()` atoms each; elements and subunits are shared by all
    /// configurations.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the array lengths disagree or a bond
    /// references an atom outside its configuration.
    pub fn new(
        positions: Vec<Vec3>,
        elements: Vec<u8>,
        subunits: Vec<u16>,
        configuration_count: usize,
        bonds: Option<BondTopology>,
    ) -> Result<Self, GeometryError> {
        let atoms_per_configuration = elements.len();
        if configuration_count == 0 && !positions.is_empty() {
            return Err(GeometryError::NoConfigurations);
        }
        let expected = atoms_per_configuration * configuration_count;
        if positions.len() != expected {
            return Err(GeometryError::PositionCount {
                expected,
                actual: positions.len(),
            });
        }
        if subunits.len() != atoms_per_configuration {
            return Err(GeometryError::AttributeCount {
                attribute: "subunit",
                expected: atoms_per_configuration,
                actual: subunits.len(),
            });
        }
        if let Some(topology) = &bonds {
            validate_bonds(
                topology,
                atoms_per_configuration,
                configuration_count,
            )?;
        }

        let first = &positions[..atoms_per_configuration.min(positions.len())];
        let bounding_sphere =
            BoundingSphere::from_points(first, BoundingSphere::DEFAULT_MARGIN);

        Ok(Self {
            positions,
            elements,
            subunits,
            bonds,
            atoms_per_configuration,
            configuration_count,
            bounding_sphere,
        })
    }

    /// Snapshot with no atoms.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// All positions, configuration-major.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Positions of one configuration.
    pub fn configuration(&self, index: usize) -> &[Vec3] {
        let start = index * self.atoms_per_configuration;
        self.positions
            .get(start..start + self.atoms_per_configuration)
            .unwrap_or(&[])
    }

    /// Element index of every atom in a configuration.
    pub fn elements(&self) -> &[u8] {
        &self.elements
    }

    /// Subunit (chain) index of every atom in a configuration.
    pub fn subunits(&self) -> &[u16] {
        &self.subunits
    }

    /// Bond topology, if the structure has any.
    pub fn bonds(&self) -> Option<&BondTopology> {
        self.bonds.as_ref().filter(|b| !b.pairs.is_empty())
    }

    /// Atoms in one configuration.
    pub fn atoms_per_configuration(&self) -> usize {
        self.atoms_per_configuration
    }

    /// Number of configurations.
    pub fn configuration_count(&self) -> usize {
        self.configuration_count
    }

    /// Total atoms across all configurations.
    pub fn total_atoms(&self) -> usize {
        self.positions.len()
    }

    /// Whether the snapshot has nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Bounding sphere of the first configuration, with margin.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounding_sphere
    }
}

fn validate_bonds(
    topology: &BondTopology,
    atoms_per_configuration: usize,
    configuration_count: usize,
) -> Result<(), GeometryError> {
    if topology.per_configuration.len() != configuration_count {
        return Err(GeometryError::BondConfigurationCount {
            expected: configuration_count,
            actual: topology.per_configuration.len(),
        });
    }
    let total: usize =
        topology.per_configuration.iter().map(|&c| c as usize).sum();
    if total != topology.pairs.len() {
        return Err(GeometryError::BondPairCount {
            expected: total,
            actual: topology.pairs.len(),
        });
    }
    for (bond, pair) in topology.pairs.iter().enumerate() {
        if let Some(&atom) =
            pair.iter().find(|&&a| a as usize >= atoms_per_configuration)
        {
            return Err(GeometryError::BondIndexOutOfRange { bond, atom });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> Vec<Vec3> {
        (0..n).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect()
    }

    #[test]
    fn rejects_mismatched_position_count() {
        let err =
            GeometrySnapshot::new(line(5), vec![0; 3], vec![0; 3], 2, None)
                .unwrap_err();
        assert_eq!(
            err,
            GeometryError::PositionCount {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn rejects_bond_outside_configuration() {
        let bonds = BondTopology::repeated(&[[0, 3]], 2);
        let err = GeometrySnapshot::new(
            line(6),
            vec![0; 3],
            vec![0; 3],
            2,
            Some(bonds),
        )
        .unwrap_err();
        assert_eq!(err, GeometryError::BondIndexOutOfRange { bond: 0, atom: 3 });
    }

    #[test]
    fn configuration_slices_are_disjoint() {
        let snapshot =
            GeometrySnapshot::new(line(6), vec![0; 3], vec![0; 3], 2, None)
                .unwrap();
        assert_eq!(snapshot.configuration(1)[0].x, 3.0);
        assert!(snapshot.configuration(2).is_empty());
    }

    #[test]
    fn repeated_bonds_have_prefix_starts() {
        let bonds = BondTopology::repeated(&[[0, 1], [1, 2]], 3);
        assert_eq!(bonds.pairs.len(), 6);
        assert_eq!(bonds.array_starts(), vec![0, 2, 4]);
    }

    #[test]
    fn element_symbols_fold_unknowns() {
        assert_eq!(Element::from_symbol("o"), Element::Oxygen);
        assert_eq!(Element::from_symbol("Fe"), Element::Other);
        assert_eq!(Element::from_index(42), Element::Other);
    }

    #[test]
    fn empty_snapshot_is_empty() {
        let snapshot = GeometrySnapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.configuration_count(), 0);
    }
}
