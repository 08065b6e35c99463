//! Data structures for locally buffered fields.
use crate::decomposition::DomainDecomposition;
use crate::traits::parallel::{Communicator, Element};

/// A rank's slab of a field plus `margin` ghost slices copied from each neighbouring slab,
/// periodic along the distributed axis.
///
/// The decomposition describes the field as `[nz, ny, nx]` or `[nz, ny, nx, ncomponents]`. The
/// buffer holds `margin` lower ghost slices, the owned slices, then `margin` upper ghost slices.
/// Ghosts are only valid after a refresh and until the owned slab next changes.
pub struct FieldBuffer<T, C>
where
    T: Element,
    C: Communicator,
{
    /// Layout of the field without ghosts.
    pub(crate) decomposition: DomainDecomposition<T, C>,

    /// Number of ghost slices on either side.
    pub(crate) margin: usize,

    /// Lower ghosts, owned slab, upper ghosts.
    pub(crate) data: Vec<T>,
}

/// A pending ghost refresh of a [`FieldBuffer`], whose slab is already copied.
///
/// The margins are exchanged, and the buffer's mutable borrow released, through
/// [`HaloExchange::wait`] or when the handle is dropped.
pub struct HaloExchange<'a, T, C>
where
    T: Element,
    C: Communicator,
{
    pub(crate) buffer: &'a mut FieldBuffer<T, C>,
    pub(crate) pending: bool,
}

/// The z layers of a field readable on this rank, borrowed from a slab or from a
/// [`FieldBuffer`].
///
/// Layers are stored `[nz, ny, nx(, ncomponents)]` from unwrapped global layer `lowest` on, and
/// readable over the unwrapped, half-open `interval`.
#[derive(Clone, Copy, Debug)]
pub struct SlabField<'a, T> {
    pub(crate) grid: [usize; 3],
    pub(crate) ncomponents: usize,
    pub(crate) lowest: i64,
    pub(crate) interval: (i64, i64),
    pub(crate) data: &'a [T],
}
