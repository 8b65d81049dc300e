//! Seeded synthetic structures for the viewer demo, tests and benchmarks.

use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{BondTopology, Element, GeometryError, GeometrySnapshot};

/// Distance between consecutive atoms of the synthetic chain.
const CHAIN_STEP: f32 = 1.5;
/// Per-configuration thermal jitter amplitude.
const JITTER: f32 = 0.35;

/// A random-walk chain of `atoms` atoms, split into subunits of 100 atoms,
/// with `configurations` jittered copies and bonds along the chain.
///
/// # Errors
///
/// Propagates [`GeometryError`] from snapshot validation, which only
/// happens for `configurations == 0` with a non-empty chain.
pub fn random_chain(
    atoms: usize,
    configurations: usize,
    seed: u64,
) -> Result<GeometrySnapshot, GeometryError> {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut base = Vec::with_capacity(atoms);
    let mut cursor = Vec3::ZERO;
    for _ in 0..atoms {
        base.push(cursor);
        let step = Vec3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        )
        .try_normalize()
        .unwrap_or(Vec3::X);
        cursor += step * CHAIN_STEP;
    }

    let mut positions = Vec::with_capacity(atoms * configurations);
    for _ in 0..configurations {
        positions.extend(base.iter().map(|&p| {
            p + Vec3::new(
                rng.random_range(-JITTER..JITTER),
                rng.random_range(-JITTER..JITTER),
                rng.random_range(-JITTER..JITTER),
            )
        }));
    }

    let elements = (0..atoms)
        .map(|_| {
            let element = match rng.random_range(0..10) {
                0..=4 => Element::Carbon,
                5 | 6 => Element::Nitrogen,
                7 | 8 => Element::Oxygen,
                _ => Element::Sulfur,
            };
            element as u8
        })
        .collect();
    let subunits = (0..atoms).map(|i| (i / 100) as u16).collect();
    let pairs: Vec<[u32; 2]> = (1..atoms as u32).map(|i| [i - 1, i]).collect();
    let bonds = BondTopology::repeated(&pairs, configurations);

    GeometrySnapshot::new(positions, elements, subunits, configurations, Some(bonds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_structure() {
        let a = random_chain(50, 2, 7).unwrap();
        let b = random_chain(50, 2, 7).unwrap();
        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.elements(), b.elements());
    }

    #[test]
    fn chain_has_one_bond_less_than_atoms() {
        let s = random_chain(20, 3, 1).unwrap();
        let bonds = s.bonds().unwrap();
        assert_eq!(bonds.per_configuration, vec![19; 3]);
        assert_eq!(s.total_atoms(), 60);
    }
}
