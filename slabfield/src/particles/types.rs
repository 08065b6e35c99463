//! Data structures for tracer particles.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use num::Float;

use crate::decomposition::IntervalSplitter;
use crate::field::FieldBuffer;
use crate::interpolation::PeriodicInterpolator;
use crate::traits::field::WeightKernel;
use crate::traits::parallel::{Communicator, Element};

/// The full particle table, held redundantly by every rank.
///
/// Each particle is a row of `ncomponents` values, its position along x, y, z first. Between
/// synchronisations only a particle's owner holds its authoritative value.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleState<T>
where
    T: Float,
{
    /// Number of particles.
    pub(crate) nparticles: usize,

    /// Values per particle, at least 3.
    pub(crate) ncomponents: usize,

    /// Row-major table of `nparticles * ncomponents` values.
    pub(crate) values: Vec<T>,
}

/// For every particle, the owning rank and the band of ranks whose slabs it may reach before the
/// next synchronisation.
///
/// Membership is stored as a bitset of `words` 64 bit words per particle. The owner is the rank
/// whose slab contains the particle's current cell, and is always a member of the band.
#[derive(Clone, Debug)]
pub struct ParticleResidency<T>
where
    T: Float,
{
    /// Number of ranks.
    pub(crate) nranks: usize,

    /// Bitset words per particle.
    pub(crate) words: usize,

    /// Band membership, `words` per particle.
    pub(crate) active: Vec<u64>,

    /// Owning rank of every particle.
    pub(crate) owner: Vec<i32>,

    /// Split of the z cells across ranks, the slabs of the field decomposition.
    pub(crate) splitter: IntervalSplitter,

    /// Number of z cells.
    pub(crate) nz: usize,

    /// Extent of the periodic box along z.
    pub(crate) box_width: T,

    /// Lower z bound of the periodic box.
    pub(crate) box_offset: T,

    /// Width of a z cell.
    pub(crate) step: T,
}

/// Particle chunks kept in memory, shared by every rank of an in-process run.
#[derive(Debug, Default)]
pub struct MemoryChunkStore<T> {
    pub(crate) chunks: Mutex<HashMap<(usize, usize), Vec<T>>>,
}

/// Particle chunks stored as one flat native-endian file per iteration and chunk, named
/// `{name}_state_i{iteration:05x}_c{chunk}` inside a directory.
#[derive(Clone, Debug)]
pub struct RawChunkStore {
    pub(crate) directory: PathBuf,
    pub(crate) name: String,
}

/// Tracer particles advected by a velocity field: the particle table, its residency, the
/// buffered velocity field and the interpolator sampling it.
pub struct Tracers<T, C, K>
where
    T: Float + Element,
    C: Communicator,
    K: WeightKernel<T>,
{
    pub(crate) state: ParticleState<T>,
    pub(crate) residency: ParticleResidency<T>,

    /// Velocity field, 3 components per grid point.
    pub(crate) velocity: FieldBuffer<T, C>,
    pub(crate) interpolator: PeriodicInterpolator<T, K>,

    /// Time step.
    pub(crate) dt: T,

    /// Velocity sampled at each particle owned here during the last step, zero elsewhere.
    pub(crate) rhs: Vec<T>,

    /// Steps taken.
    pub(crate) iteration: usize,
}
