//! Data structures describing how arrays are split across ranks.
use std::marker::PhantomData;

use crate::traits::parallel::Communicator;

/// Splits `nb_items` contiguous items into `nb_intervals` contiguous, near-equal ranges.
///
/// Used for slab indices, particles and chunks alike. The mapping is a pure function of the two
/// counts, so every rank computes the same partition without communicating.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntervalSplitter {
    /// Number of items to distribute.
    pub(crate) nb_items: usize,

    /// Number of workers receiving items.
    pub(crate) nb_intervals: usize,

    /// Real valued number of items per worker, only meaningful when `nb_items > nb_intervals`.
    pub(crate) step: f64,
}

/// Description of an N dimensional row-major array split into contiguous slabs along its
/// slowest axis, one slab per rank of a communicator.
///
/// Immutable after construction. The element type only fixes the byte width used by file I/O
/// and message sizes.
///
/// # Fields
/// - `sizes` - Global extent of every axis.
/// - `subsizes` - Extent of every axis owned by this rank, only axis 0 differs from `sizes`.
/// - `starts` - Global index of the first element owned by this rank along every axis.
/// - `rank` - Owning rank of every global index of axis 0.
/// - `slice_size` - Elements per unit of axis 0.
/// - `local_size` - Elements owned by this rank.
/// - `full_size` - Elements of the global array.
pub struct DomainDecomposition<T, C: Communicator> {
    /// Global extent of every axis.
    pub(crate) sizes: Vec<usize>,

    /// Extent of every axis owned by this rank.
    pub(crate) subsizes: Vec<usize>,

    /// First global index owned by this rank, along every axis.
    pub(crate) starts: Vec<usize>,

    /// Owning rank of every slab index.
    pub(crate) rank: Vec<i32>,

    /// Splitter of axis 0 over the ranks.
    pub(crate) splitter: IntervalSplitter,

    /// Elements per slab index.
    pub(crate) slice_size: usize,

    /// Elements owned by this rank.
    pub(crate) local_size: usize,

    /// Elements of the global array.
    pub(crate) full_size: usize,

    /// Rank of this process in `comm`.
    pub(crate) myrank: i32,

    /// Number of ranks in `comm`.
    pub(crate) nprocs: i32,

    /// Private duplicate of the communicator the decomposition was built over.
    pub(crate) comm: C,

    pub(crate) element: PhantomData<T>,
}
