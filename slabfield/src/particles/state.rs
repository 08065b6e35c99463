//! The replicated particle table.
use std::ops::Range;

use log::{debug, info};
use num::Float;
use rayon::prelude::*;

use crate::decomposition::IntervalSplitter;
use crate::parallel::agree;
use crate::particles::types::{ParticleResidency, ParticleState};
use crate::traits::parallel::{Communicator, Element, Reducible};
use crate::traits::particles::{JumpEstimate, ZeroJump};
use crate::traits::storage::ChunkStore;
use crate::traits::types::{Result, SlabError};

fn check_width(ncomponents: usize) -> Result<()> {
    if ncomponents < 3 {
        return Err(SlabError::Configuration(format!(
            "particles need at least 3 components for their position, found {}",
            ncomponents
        )));
    }
    Ok(())
}

/// Chunks handled by `rank`, and the value range of a chunk in the table.
struct ChunkLayout {
    nparticles: usize,
    ncomponents: usize,
    chunk_size: usize,
    splitter: IntervalSplitter,
}

impl ChunkLayout {
    fn new(nparticles: usize, ncomponents: usize, chunk_size: usize, nranks: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SlabError::Configuration(
                "chunks must hold at least one particle".to_string(),
            ));
        }
        let nchunks = nparticles.div_ceil(chunk_size);
        Ok(Self {
            nparticles,
            ncomponents,
            chunk_size,
            splitter: IntervalSplitter::new(nchunks, nranks),
        })
    }

    fn chunks_of(&self, rank: i32) -> Range<usize> {
        let (first, count) = self.splitter.interval(rank as usize);
        first..first + count
    }

    fn values_of(&self, chunk: usize) -> Range<usize> {
        let first = chunk * self.chunk_size;
        let end = (first + self.chunk_size).min(self.nparticles);
        first * self.ncomponents..end * self.ncomponents
    }
}

impl<T> ParticleState<T>
where
    T: Float,
{
    /// A table of `nparticles` zero particles.
    pub fn new(nparticles: usize, ncomponents: usize) -> Result<Self> {
        check_width(ncomponents)?;
        Ok(Self {
            nparticles,
            ncomponents,
            values: vec![T::zero(); nparticles * ncomponents],
        })
    }

    /// A table from its row-major values.
    pub fn from_values(values: Vec<T>, ncomponents: usize) -> Result<Self> {
        check_width(ncomponents)?;
        if values.len() % ncomponents != 0 {
            return Err(SlabError::Configuration(format!(
                "{} values do not form rows of {}",
                values.len(),
                ncomponents
            )));
        }
        Ok(Self {
            nparticles: values.len() / ncomponents,
            ncomponents,
            values,
        })
    }

    /// Number of particles.
    pub fn nparticles(&self) -> usize {
        self.nparticles
    }

    /// Values per particle.
    pub fn ncomponents(&self) -> usize {
        self.ncomponents
    }

    /// The whole table.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// The whole table, mutably.
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// All values of a particle.
    pub fn row(&self, particle: usize) -> &[T] {
        &self.values[particle * self.ncomponents..(particle + 1) * self.ncomponents]
    }

    /// All values of a particle, mutably.
    pub fn row_mut(&mut self, particle: usize) -> &mut [T] {
        &mut self.values[particle * self.ncomponents..(particle + 1) * self.ncomponents]
    }

    /// Position of a particle.
    pub fn position(&self, particle: usize) -> &[T] {
        &self.row(particle)[..3]
    }

    /// Advance the positions of the particles owned by `rank` by one explicit Euler step.
    ///
    /// # Arguments
    /// * `dt` - Time step.
    /// * `rhs` - Velocity of every particle, 3 values each.
    /// * `residency` - Ownership of the particles.
    /// * `rank` - Rank taking the step.
    pub fn euler_step(&mut self, dt: T, rhs: &[T], residency: &ParticleResidency<T>, rank: i32)
    where
        T: Send + Sync,
    {
        assert_eq!(rhs.len(), 3 * self.nparticles, "one velocity per particle");
        assert_eq!(residency.nparticles(), self.nparticles, "particle counts differ");

        self.values
            .par_chunks_exact_mut(self.ncomponents)
            .zip(rhs.par_chunks_exact(3))
            .enumerate()
            .filter(|(particle, _)| residency.owner(*particle) == rank)
            .for_each(|(_, (row, velocity))| {
                for (x, &v) in row.iter_mut().zip(velocity.iter()) {
                    *x = *x + dt * v;
                }
            });
    }
}

impl<T> ParticleState<T>
where
    T: Float + Element,
{
    /// Build the table on rank 0 and broadcast it to every rank.
    ///
    /// Collective. `generate` runs on rank 0 only and must return `nparticles * ncomponents`
    /// values, otherwise every rank fails.
    ///
    /// # Arguments
    /// * `comm` - Communicator of the ranks sharing the table.
    /// * `nparticles` - Number of particles.
    /// * `ncomponents` - Values per particle.
    /// * `generate` - Produces the row-major table.
    pub fn from_root<C, F>(comm: &C, nparticles: usize, ncomponents: usize, generate: F) -> Result<Self>
    where
        C: Communicator,
        F: FnOnce() -> Vec<T>,
    {
        check_width(ncomponents)?;
        let expected = nparticles * ncomponents;

        let mut values = if comm.rank() == 0 {
            generate()
        } else {
            vec![T::zero(); expected]
        };

        let mut valid = [(values.len() == expected) as i32];
        comm.broadcast_into(0, &mut valid);
        if valid[0] == 0 {
            return Err(SlabError::Configuration(format!(
                "rank 0 generated a table of the wrong size, expected {} values",
                expected
            )));
        }

        comm.broadcast_into(0, &mut values);
        Ok(Self {
            nparticles,
            ncomponents,
            values,
        })
    }
}

impl<T> ParticleState<T>
where
    T: Float + Reducible,
{
    /// Read a particle table from chunked storage and set up its residency.
    ///
    /// Collective. Chunks of `chunk_size` particles, the last possibly shorter, are split over
    /// the ranks, each rank reads its own and the pieces are summed into everyone's table.
    /// Owners are then assigned with zero jump bounds and the table synchronised.
    ///
    /// # Arguments
    /// * `comm` - Communicator of the ranks sharing the table.
    /// * `store` - Chunk storage.
    /// * `iteration` - Iteration to read.
    /// * `nparticles` - Number of particles.
    /// * `ncomponents` - Values per particle.
    /// * `chunk_size` - Particles per chunk.
    /// * `residency` - Residency of `nparticles` particles over the ranks of `comm`, overwritten.
    pub fn read<C, S>(
        comm: &C,
        store: &S,
        iteration: usize,
        nparticles: usize,
        ncomponents: usize,
        chunk_size: usize,
        residency: &mut ParticleResidency<T>,
    ) -> Result<Self>
    where
        C: Communicator,
        S: ChunkStore<T>,
    {
        check_width(ncomponents)?;
        if residency.nparticles() != nparticles {
            return Err(SlabError::Configuration(format!(
                "residency of {} particles cannot track {}",
                residency.nparticles(),
                nparticles
            )));
        }
        let layout = ChunkLayout::new(nparticles, ncomponents, chunk_size, comm.size() as usize)?;
        let chunks = layout.chunks_of(comm.rank());
        debug!(
            "rank {} reading particle chunks {:?} of iteration {}",
            comm.rank(),
            chunks,
            iteration
        );

        let mut local = vec![T::zero(); nparticles * ncomponents];
        let outcome = chunks.clone().try_for_each(|chunk| {
            store.read_chunk(iteration, chunk, &mut local[layout.values_of(chunk)])
        });
        agree(comm, outcome, "particle read")?;

        let mut values = vec![T::zero(); local.len()];
        comm.all_reduce_sum(&local, &mut values);

        if comm.rank() == 0 {
            info!("read {} particles of iteration {}", nparticles, iteration);
        }

        let mut state = Self {
            nparticles,
            ncomponents,
            values,
        };
        residency.assign(&state, &vec![T::zero(); nparticles]);
        residency.synchronize(comm, &mut state, &ZeroJump)?;
        Ok(state)
    }

    /// Synchronise the table, then write it to chunked storage.
    ///
    /// Collective. Each rank writes its share of the chunks.
    ///
    /// # Arguments
    /// * `comm` - Communicator of the ranks sharing the table.
    /// * `store` - Chunk storage.
    /// * `iteration` - Iteration to write.
    /// * `chunk_size` - Particles per chunk.
    /// * `residency` - Ownership of the particles, recomputed by the synchronisation.
    /// * `estimator` - Jump bounds used by the synchronisation.
    pub fn write<C, S, J>(
        &mut self,
        comm: &C,
        store: &S,
        iteration: usize,
        chunk_size: usize,
        residency: &mut ParticleResidency<T>,
        estimator: &J,
    ) -> Result<()>
    where
        C: Communicator,
        S: ChunkStore<T>,
        J: JumpEstimate<T>,
    {
        let layout =
            ChunkLayout::new(self.nparticles, self.ncomponents, chunk_size, comm.size() as usize)?;
        residency.synchronize(comm, self, estimator)?;

        let chunks = layout.chunks_of(comm.rank());
        debug!(
            "rank {} writing particle chunks {:?} of iteration {}",
            comm.rank(),
            chunks,
            iteration
        );

        let outcome = chunks.clone().try_for_each(|chunk| {
            store.write_chunk(iteration, chunk, &self.values[layout.values_of(chunk)])
        });
        agree(comm, outcome, "particle write")
    }
}
