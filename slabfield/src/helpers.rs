//! Helper functions used in testing and in the demonstration driver: seeded particle generators
//! and fields sampled from analytic functions.
use num::Float;
use rand::prelude::*;

use crate::decomposition::DomainDecomposition;
use crate::traits::parallel::Communicator;

/// Particle state fixture, positions uniformly sampled in a box and the remaining components
/// zero.
///
/// # Arguments
/// * `nparticles` - The number of particles.
/// * `ncomponents` - Values per particle, at least 3.
/// * `min` - The minimum coordinate value along each axis, defaults to 0.
/// * `max` - The maximum coordinate value along each axis, defaults to 1.
/// * `seed` - Random seed, defaults to 0.
pub fn particles_fixture<T: Float + rand::distributions::uniform::SampleUniform>(
    nparticles: usize,
    ncomponents: usize,
    min: Option<[T; 3]>,
    max: Option<[T; 3]>,
    seed: Option<u64>,
) -> Vec<T> {
    assert!(ncomponents >= 3, "particle states need at least a position");

    let seed = seed.unwrap_or(0);
    let mut range = StdRng::seed_from_u64(seed);
    let min = min.unwrap_or([T::zero(); 3]);
    let max = max.unwrap_or([T::one(); 3]);

    let between = [0, 1, 2].map(|axis| rand::distributions::Uniform::from(min[axis]..max[axis]));

    let mut state = vec![T::zero(); nparticles * ncomponents];
    for particle in state.chunks_exact_mut(ncomponents) {
        for axis in 0..3 {
            particle[axis] = between[axis].sample(&mut range);
        }
    }
    state
}

/// Sample a function at the grid points of this rank's slab of a field.
///
/// # Arguments
/// * `decomposition` - Layout of the field, `[nz, ny, nx]` or `[nz, ny, nx, ncomponents]`.
/// * `step` - Grid spacing along x, y, z.
/// * `offset` - Coordinates of the grid point at index zero.
/// * `f` - Writes the components of the field at a point.
pub fn sample_field<T, C, F>(
    decomposition: &DomainDecomposition<T, C>,
    step: [T; 3],
    offset: [T; 3],
    f: F,
) -> Vec<T>
where
    T: Float,
    C: Communicator,
    F: Fn([T; 3], &mut [T]),
{
    let sizes = decomposition.sizes();
    let ncomponents = sizes.get(3).cloned().unwrap_or(1);
    let npoints = decomposition.local_size() / ncomponents;

    let mut values = vec![T::zero(); decomposition.local_size()];
    for (point, components) in (0..npoints).zip(values.chunks_exact_mut(ncomponents)) {
        let index = decomposition.global_index(point * ncomponents);
        let coordinate = |axis: usize, i: usize| {
            offset[axis] + step[axis] * T::from(i).unwrap_or_else(T::zero)
        };
        let position = [
            coordinate(0, index[2]),
            coordinate(1, index[1]),
            coordinate(2, index[0]),
        ];
        f(position, components);
    }
    values
}
