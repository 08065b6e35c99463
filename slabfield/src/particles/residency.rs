//! Residency tracking of particles across the slabs of the distributed axis.
use log::debug;
use num::Float;

use crate::decomposition::{DomainDecomposition, IntervalSplitter};
use crate::interpolation::periodic_cell;
use crate::particles::types::{ParticleResidency, ParticleState};
use crate::traits::parallel::{Communicator, Reducible};
use crate::traits::particles::JumpEstimate;
use crate::traits::types::{Result, SlabError, IDX_Z};

const WORD_BITS: usize = u64::BITS as usize;

impl<T> ParticleResidency<T>
where
    T: Float,
{
    /// Residency of `nparticles` particles over `nranks` ranks splitting `nz` z cells. No
    /// particle has an owner until [`ParticleResidency::assign`] or a synchronisation.
    ///
    /// # Arguments
    /// * `nparticles` - Number of particles.
    /// * `nz` - Number of cells along z.
    /// * `nranks` - Number of ranks.
    /// * `box_width` - Extent of the periodic box along z.
    /// * `box_offset` - Lower z bound of the periodic box.
    pub fn new(nparticles: usize, nz: usize, nranks: usize, box_width: T, box_offset: T) -> Result<Self> {
        if nz == 0 || nranks == 0 {
            return Err(SlabError::Configuration(format!(
                "cannot split {} z cells over {} ranks",
                nz, nranks
            )));
        }

        if !(box_width > T::zero()) {
            return Err(SlabError::Configuration(
                "box width along z must be positive".to_string(),
            ));
        }

        let words = nranks.div_ceil(WORD_BITS);
        let step = box_width / T::from(nz).unwrap_or_else(T::one);

        Ok(Self {
            nranks,
            words,
            active: vec![0; nparticles * words],
            owner: vec![-1; nparticles],
            splitter: IntervalSplitter::new(nz, nranks),
            nz,
            box_width,
            box_offset,
            step,
        })
    }

    /// Residency over the slabs of a field decomposition, laid out with z slowest.
    pub fn from_decomposition<U, C: Communicator>(
        nparticles: usize,
        decomposition: &DomainDecomposition<U, C>,
        box_width: T,
        box_offset: T,
    ) -> Result<Self> {
        Self::new(
            nparticles,
            decomposition.sizes()[0],
            decomposition.nprocs() as usize,
            box_width,
            box_offset,
        )
    }

    /// Number of particles tracked.
    pub fn nparticles(&self) -> usize {
        self.owner.len()
    }

    /// Number of ranks.
    pub fn nranks(&self) -> usize {
        self.nranks
    }

    /// Rank holding the authoritative state of a particle, -1 before the first assignment.
    pub fn owner(&self, particle: usize) -> i32 {
        self.owner[particle]
    }

    /// Whether a rank's slab may be reached by a particle before the next synchronisation.
    pub fn is_active(&self, particle: usize, rank: i32) -> bool {
        let rank = rank as usize;
        rank < self.nranks
            && self.active[particle * self.words + rank / WORD_BITS] & (1 << (rank % WORD_BITS)) != 0
    }

    /// Ranks active for a particle, ascending.
    pub fn active_ranks(&self, particle: usize) -> impl Iterator<Item = i32> + '_ {
        (0..self.nranks as i32).filter(move |&rank| self.is_active(particle, rank))
    }

    /// Particles owned by a rank, ascending.
    pub fn owned_by(&self, rank: i32) -> impl Iterator<Item = usize> + '_ {
        self.owner
            .iter()
            .enumerate()
            .filter(move |(_, &owner)| owner == rank)
            .map(|(particle, _)| particle)
    }

    /// Lower z bound of a rank's slab.
    pub fn lbound(&self, rank: i32) -> T {
        let (start, _) = self.splitter.interval(rank as usize);
        self.box_offset + self.step * T::from(start).unwrap_or_else(T::zero)
    }

    /// Upper z bound of a rank's slab, exclusive.
    pub fn ubound(&self, rank: i32) -> T {
        let (start, size) = self.splitter.interval(rank as usize);
        self.box_offset + self.step * T::from(start + size).unwrap_or_else(T::zero)
    }

    fn mark(&mut self, particle: usize, first_cell: usize, last_cell: usize) {
        let first = self.splitter.owner(first_cell);
        let last = self.splitter.owner(last_cell);
        for rank in first..=last {
            self.active[particle * self.words + rank / WORD_BITS] |= 1 << (rank % WORD_BITS);
        }
    }

    /// Recompute owner and band of every particle from positions and jump bounds, without
    /// communicating. Every rank computes the same result from the same inputs.
    ///
    /// A rank is in the band of a particle when its slab intersects the periodic interval
    /// `[z - jump, z + jump]`, evaluated cell by cell.
    ///
    /// # Arguments
    /// * `state` - Particle table.
    /// * `jumps` - Jump bound of every particle.
    pub fn assign(&mut self, state: &ParticleState<T>, jumps: &[T]) {
        assert_eq!(state.nparticles(), self.nparticles(), "particle counts differ");
        assert_eq!(jumps.len(), self.nparticles(), "one jump bound per particle");

        let nz = self.nz as i64;
        self.active.fill(0);

        for particle in 0..self.nparticles() {
            let z = state.position(particle)[IDX_Z];
            let (cell, fraction) =
                periodic_cell(z, self.box_offset, self.box_width, self.step, self.nz);
            self.owner[particle] = self.splitter.owner(cell) as i32;

            let reach = jumps[particle].abs() / self.step;
            let below = (fraction - reach).floor().to_i64();
            let above = (fraction + reach).floor().to_i64();

            let band = match (below, above) {
                (Some(b), Some(a)) => a.checked_sub(b).filter(|&d| d < nz - 1).map(|d| (b, d + 1)),
                _ => None,
            };

            match band {
                Some((below, length)) => {
                    let first = (cell as i64 + below).rem_euclid(nz);
                    let last = first + length - 1;
                    if last < nz {
                        self.mark(particle, first as usize, last as usize);
                    } else {
                        self.mark(particle, first as usize, self.nz - 1);
                        self.mark(particle, 0, (last - nz) as usize);
                    }
                }
                None => self.mark(particle, 0, self.nz - 1),
            }
        }
    }

    /// Make every rank agree on the particle table and recompute residency.
    ///
    /// Collective. Each owner's rows are summed into everyone's copy, the other ranks'
    /// contributions being zero, then jump bounds computed by the owners are shared the same
    /// way and the bands recomputed from them.
    ///
    /// # Arguments
    /// * `comm` - Communicator of the ranks sharing the table.
    /// * `state` - Replicated particle table, authoritative only at the owners.
    /// * `estimator` - Jump bounds until the next synchronisation.
    pub fn synchronize<C, J>(&mut self, comm: &C, state: &mut ParticleState<T>, estimator: &J) -> Result<()>
    where
        T: Reducible,
        C: Communicator,
        J: JumpEstimate<T>,
    {
        if comm.size() as usize != self.nranks || state.nparticles() != self.nparticles() {
            return Err(SlabError::Configuration(format!(
                "residency of {} particles over {} ranks used with {} particles over {} ranks",
                self.nparticles(),
                self.nranks,
                state.nparticles(),
                comm.size()
            )));
        }

        let me = comm.rank();
        let ncomponents = state.ncomponents();
        debug!(
            "rank {} synchronising {} particles, {} owned",
            me,
            self.nparticles(),
            self.owned_by(me).count()
        );

        let mut contribution = vec![T::zero(); state.values.len()];
        for particle in self.owned_by(me) {
            let row = particle * ncomponents..(particle + 1) * ncomponents;
            contribution[row.clone()].copy_from_slice(&state.values[row]);
        }
        comm.all_reduce_sum(&contribution, &mut state.values);

        let mut local_jumps = vec![T::zero(); self.nparticles()];
        for particle in self.owned_by(me) {
            local_jumps[particle] = estimator.jump(particle, state.row(particle));
        }
        let mut jumps = vec![T::zero(); self.nparticles()];
        comm.all_reduce_sum(&local_jumps, &mut jumps);

        self.assign(state, &jumps);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::helpers::particles_fixture;
    use crate::parallel::run_spmd;
    use crate::traits::particles::ZeroJump;
    use approx::assert_relative_eq;

    fn state_at(zs: &[f64]) -> ParticleState<f64> {
        let values = zs.iter().flat_map(|&z| [0.5, 0.5, z, 0.0]).collect();
        ParticleState::from_values(values, 4).unwrap()
    }

    #[test]
    fn test_slab_bounds() {
        let residency = ParticleResidency::<f64>::new(0, 10, 3, 5.0, -1.0).unwrap();
        assert_relative_eq!(residency.lbound(0), -1.0);
        assert_relative_eq!(residency.ubound(0), 0.5);
        assert_relative_eq!(residency.lbound(2), 2.0);
        assert_relative_eq!(residency.ubound(2), 4.0);
        assert!(ParticleResidency::<f64>::new(1, 0, 3, 5.0, 0.0).is_err());
        assert!(ParticleResidency::<f64>::new(1, 4, 3, -5.0, 0.0).is_err());
    }

    #[test]
    fn test_bands() {
        // 8 cells of width 1 over 4 ranks, two cells each
        let mut residency = ParticleResidency::<f64>::new(5, 8, 4, 8.0, 0.0).unwrap();
        let state = state_at(&[2.5, 1.9, 7.5, 0.2, 4.0]);
        residency.assign(&state, &[0.0, 0.2, 1.0, 0.5, 100.0]);

        let bands = (0..5)
            .map(|p| residency.active_ranks(p).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let owners = (0..5).map(|p| residency.owner(p)).collect::<Vec<_>>();

        assert_eq!(owners, vec![1, 0, 3, 0, 2]);
        assert_eq!(bands[0], vec![1]);
        assert_eq!(bands[1], vec![0, 1]);
        // Wraps across the periodic boundary
        assert_eq!(bands[2], vec![0, 3]);
        assert_eq!(bands[3], vec![0, 3]);
        assert_eq!(bands[4], vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_owners_many_periods_away() {
        let width = 2.0 * std::f64::consts::PI;
        let step = width / 16.0;

        let mut zs = Vec::new();
        for k in 1..2000u64 {
            for ulps in 1..=3 {
                zs.push(f64::from_bits((k as f64 * width).to_bits() - ulps));
            }
            zs.push(15.5 * step - k as f64 * width);
        }

        let mut residency = ParticleResidency::<f64>::new(zs.len(), 16, 4, width, 0.0).unwrap();
        let state = state_at(&zs);
        residency.assign(&state, &vec![0.25 * step; zs.len()]);

        for (p, z) in zs.iter().enumerate() {
            let band = residency.active_ranks(p).collect::<Vec<_>>();
            if p % 4 == 3 {
                assert_eq!(residency.owner(p), 3, "z = {}", z);
                assert_eq!(band, vec![3], "z = {}", z);
            } else {
                // A quarter cell either side of the seam
                assert!([0, 3].contains(&residency.owner(p)), "z = {}", z);
                assert_eq!(band, vec![0, 3], "z = {}", z);
            }
        }
    }

    #[test]
    fn test_many_ranks() {
        let mut residency = ParticleResidency::<f64>::new(2, 200, 130, 1.0, 0.0).unwrap();
        let state = state_at(&[0.999, 0.5]);
        residency.assign(&state, &[0.0, 0.0]);
        assert_eq!(residency.active_ranks(0).collect::<Vec<_>>(), vec![129]);
        assert_eq!(residency.owner(1), residency.active_ranks(1).next().unwrap());
        assert!(residency.is_active(0, 129));
        assert!(!residency.is_active(0, 128));
    }

    #[test]
    fn test_synchronize_coverage_and_idempotence() {
        let nparticles = 100;
        let reference = particles_fixture::<f64>(nparticles, 4, Some([0.0; 3]), Some([2.0; 3]), Some(7));

        let results = run_spmd(3, |comm| {
            let mut state = ParticleState::from_values(reference.clone(), 4).unwrap();
            let mut residency = ParticleResidency::new(nparticles, 9, 3, 2.0, 0.0).unwrap();
            residency.assign(&state, &vec![0.0; nparticles]);

            // Only owners hold meaningful values
            for p in 0..nparticles {
                if residency.owner(p) != comm.rank() {
                    state.row_mut(p).iter_mut().for_each(|v| *v = -99.0);
                }
            }

            residency.synchronize(&comm, &mut state, &ZeroJump).unwrap();
            assert_eq!(state.values(), &reference[..]);

            let first = (0..nparticles)
                .map(|p| residency.active_ranks(p).collect::<Vec<_>>())
                .collect::<Vec<_>>();

            residency.synchronize(&comm, &mut state, &ZeroJump).unwrap();
            let second = (0..nparticles)
                .map(|p| residency.active_ranks(p).collect::<Vec<_>>())
                .collect::<Vec<_>>();
            assert_eq!(first, second);

            for (p, band) in first.iter().enumerate() {
                assert!(!band.is_empty());
                assert!(band.contains(&residency.owner(p)));
            }
            first
        });

        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_synchronize_uses_owner_jumps() {
        run_spmd(2, |comm| {
            let mut state = state_at(&[0.5, 3.5]);
            let mut residency = ParticleResidency::new(2, 4, 2, 4.0, 0.0).unwrap();
            residency.assign(&state, &[0.0, 0.0]);
            let owners = [residency.owner(0), residency.owner(1)];
            assert_eq!(owners, [0, 1]);

            // Only the owner's estimate of a particle may count
            let me = comm.rank();
            let estimator = |p: usize, _: &[f64]| {
                if owners[p] != me {
                    50.0
                } else if p == 0 {
                    0.6
                } else {
                    0.4
                }
            };

            residency.synchronize(&comm, &mut state, &estimator).unwrap();
            assert_eq!(residency.active_ranks(0).collect::<Vec<_>>(), vec![0, 1]);
            assert_eq!(residency.active_ranks(1).collect::<Vec<_>>(), vec![1]);
        });
    }
}
