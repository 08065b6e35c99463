//! Communication interface shared by all distributed operations.
//!
//! Every rank must issue the same sequence of collective calls in the same order, divergent
//! control flow around a collective deadlocks the whole run. Nothing here can detect that.
use std::ops::Add;

use bytemuck::Pod;
use num_complex::Complex;

/// Plain data that can be moved between ranks as raw bytes.
pub trait Element: Pod + Default + Send + Sync {}

impl<T: Pod + Default + Send + Sync> Element for T {}

/// Element types that support element-wise summing reductions.
#[cfg(not(feature = "mpi"))]
pub trait Reducible: Element + Add<Output = Self> {}

/// Element types that support element-wise summing reductions.
#[cfg(feature = "mpi")]
pub trait Reducible: Element + Add<Output = Self> + mpi::traits::Equivalence {}

macro_rules! reducible {
    ($($t:ty),*) => {
        $(impl Reducible for $t {})*
    };
}

reducible!(f32, f64, i32, i64, u32, u64);

/// Byte order reversal of a single field element.
pub trait SwapBytes: Copy {
    /// Reverse the byte order of every scalar making up this value.
    fn swap_bytes(self) -> Self;
}

impl SwapBytes for f32 {
    fn swap_bytes(self) -> Self {
        f32::from_bits(self.to_bits().swap_bytes())
    }
}

impl SwapBytes for f64 {
    fn swap_bytes(self) -> Self {
        f64::from_bits(self.to_bits().swap_bytes())
    }
}

impl SwapBytes for i32 {
    fn swap_bytes(self) -> Self {
        i32::swap_bytes(self)
    }
}

impl<T: SwapBytes> SwapBytes for Complex<T> {
    fn swap_bytes(self) -> Self {
        Complex::new(self.re.swap_bytes(), self.im.swap_bytes())
    }
}

/// A send posted as part of an [`Communicator::exchange`].
pub struct Outgoing<'a, T> {
    /// Destination rank.
    pub dest: i32,
    /// Message tag, non-negative.
    pub tag: i32,
    /// Buffer to send.
    pub data: &'a [T],
}

/// A receive posted as part of an [`Communicator::exchange`].
pub struct Incoming<'a, T> {
    /// Source rank.
    pub source: i32,
    /// Message tag, non-negative.
    pub tag: i32,
    /// Buffer to receive into, its length must match the incoming message.
    pub data: &'a mut [T],
}

/// Interface for a group of cooperating ranks.
///
/// Messages from one source carrying one tag are non-overtaking. Negative tags are reserved
/// for implementations of the collectives.
pub trait Communicator: Sized {
    /// Rank of the calling process.
    fn rank(&self) -> i32;

    /// Number of ranks in the group.
    fn size(&self) -> i32;

    /// A new handle to the same group of ranks.
    fn duplicate(&self) -> Self;

    /// Whether `other` describes the same group of ranks, in the same order.
    fn is_congruent(&self, other: &Self) -> bool;

    /// Block until every rank has entered the barrier.
    fn barrier(&self);

    /// Element-wise sum of `send` over all ranks, result stored in `recv` at every rank.
    fn all_reduce_sum<T: Reducible>(&self, send: &[T], recv: &mut [T]);

    /// Overwrite `buf` at every rank with its contents at `root`.
    fn broadcast_into<T: Element>(&self, root: i32, buf: &mut [T]);

    /// Blocking send.
    fn send<T: Element>(&self, dest: i32, tag: i32, buf: &[T]);

    /// Blocking receive of a message whose length must match `buf`.
    fn receive_into<T: Element>(&self, source: i32, tag: i32, buf: &mut [T]);

    /// Post every send and receive without blocking, then wait until all have completed.
    fn exchange<T: Element>(&self, sends: &[Outgoing<'_, T>], receives: &mut [Incoming<'_, T>]);
}
