//! Construction of slab decompositions and their index arithmetic.
use std::marker::PhantomData;

use itertools::Itertools;
use log::debug;
use num::Float;
use num_complex::Complex;

use crate::decomposition::types::{DomainDecomposition, IntervalSplitter};
use crate::traits::parallel::Communicator;
use crate::traits::types::{Result, SlabError};

impl<T, C> DomainDecomposition<T, C>
where
    C: Communicator,
{
    /// Split a global array across the ranks of a communicator along its slowest axis.
    ///
    /// Collective only in the sense that every rank must construct the same decomposition, no
    /// messages are exchanged beyond duplicating the communicator.
    ///
    /// # Arguments
    /// * `sizes` - Global extent of every axis, slowest first.
    /// * `comm` - Communicator whose ranks own the slabs.
    pub fn new(sizes: &[usize], comm: &C) -> Result<Self> {
        if sizes.is_empty() {
            return Err(SlabError::Configuration(
                "a decomposition needs at least one axis".to_string(),
            ));
        }

        if let Some(axis) = sizes.iter().position(|&s| s == 0) {
            return Err(SlabError::Configuration(format!(
                "axis {} of {:?} has zero extent",
                axis, sizes
            )));
        }

        let myrank = comm.rank();
        let nprocs = comm.size();
        let splitter = IntervalSplitter::new(sizes[0], nprocs as usize);

        let rank = (0..sizes[0])
            .map(|slab| splitter.owner(slab) as i32)
            .collect_vec();

        let (start, subsize) = splitter.interval(myrank as usize);
        let mut starts = vec![0; sizes.len()];
        let mut subsizes = sizes.to_vec();
        starts[0] = start;
        subsizes[0] = subsize;

        let slice_size = sizes[1..].iter().product::<usize>();
        let local_size = subsize * slice_size;
        let full_size = sizes[0] * slice_size;

        debug!(
            "rank {} decomposing {:?}: slabs [{}, {}) local size {}",
            myrank,
            sizes,
            start,
            start + subsize,
            local_size
        );

        Ok(Self {
            sizes: sizes.to_vec(),
            subsizes,
            starts,
            rank,
            splitter,
            slice_size,
            local_size,
            full_size,
            myrank,
            nprocs,
            comm: comm.duplicate(),
            element: PhantomData,
        })
    }

    /// The decomposition of the same ranks over the array with every axis reversed.
    pub fn transposed(&self) -> Result<Self> {
        let sizes = self.sizes.iter().rev().cloned().collect_vec();
        Self::new(&sizes, &self.comm)
    }

    /// Number of axes.
    pub fn ndims(&self) -> usize {
        self.sizes.len()
    }

    /// Global extent of every axis.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Extent of every axis owned by this rank.
    pub fn subsizes(&self) -> &[usize] {
        &self.subsizes
    }

    /// First global index owned by this rank along every axis.
    pub fn starts(&self) -> &[usize] {
        &self.starts
    }

    /// Owning rank of every slab index.
    pub fn rank_table(&self) -> &[i32] {
        &self.rank
    }

    /// Elements per slab index.
    pub fn slice_size(&self) -> usize {
        self.slice_size
    }

    /// Elements owned by this rank.
    pub fn local_size(&self) -> usize {
        self.local_size
    }

    /// Elements of the global array.
    pub fn full_size(&self) -> usize {
        self.full_size
    }

    /// Rank of this process.
    pub fn myrank(&self) -> i32 {
        self.myrank
    }

    /// Number of ranks.
    pub fn nprocs(&self) -> i32 {
        self.nprocs
    }

    /// The communicator this decomposition lives on.
    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Splitter used for the slowest axis.
    pub fn splitter(&self) -> &IntervalSplitter {
        &self.splitter
    }

    /// Owning rank of a slab index.
    pub fn owner(&self, slab: usize) -> i32 {
        self.rank[slab]
    }

    /// First slab index and number of slabs owned by `rank`.
    pub fn slab_interval(&self, rank: i32) -> (usize, usize) {
        self.splitter.interval(rank as usize)
    }

    /// Smallest number of slabs owned by any rank.
    pub fn min_subsize(&self) -> usize {
        (0..self.nprocs)
            .map(|r| self.slab_interval(r).1)
            .min()
            .unwrap_or(0)
    }

    /// Whether this rank owns a slab index.
    pub fn is_local(&self, slab: usize) -> bool {
        slab >= self.starts[0] && slab < self.starts[0] + self.subsizes[0]
    }

    /// Offset into the local buffer of a global multi-index, `None` if owned by another rank.
    ///
    /// # Arguments
    /// * `index` - Global index along every axis.
    pub fn local_offset(&self, index: &[usize]) -> Option<usize> {
        debug_assert_eq!(index.len(), self.ndims());
        if !self.is_local(index[0]) {
            return None;
        }

        let mut offset = index[0] - self.starts[0];
        for (&i, &n) in index.iter().zip(self.sizes.iter()).skip(1) {
            offset = offset * n + i;
        }
        Some(offset)
    }

    /// Global multi-index of an offset into the local buffer.
    pub fn global_index(&self, offset: usize) -> Vec<usize> {
        debug_assert!(offset < self.local_size);
        let mut index = vec![0; self.ndims()];
        let mut rest = offset;
        for axis in (1..self.ndims()).rev() {
            index[axis] = rest % self.sizes[axis];
            rest /= self.sizes[axis];
        }
        index[0] = rest + self.starts[0];
        index
    }

    /// Check that two decompositions may exchange data: same number of axes and the same
    /// group of ranks.
    pub(crate) fn check_compatible<U>(&self, other: &DomainDecomposition<U, C>) -> Result<()> {
        if self.ndims() != other.ndims() {
            return Err(SlabError::Configuration(format!(
                "decompositions have {} and {} axes",
                self.ndims(),
                other.ndims()
            )));
        }

        if !self.comm.is_congruent(&other.comm) {
            return Err(SlabError::Configuration(
                "decompositions live on different communicators".to_string(),
            ));
        }
        Ok(())
    }
}

impl<T, C> DomainDecomposition<T, C>
where
    T: Float,
    C: Communicator,
{
    /// The two decompositions used around a real to complex transform of an `[n0, n1, n2]`
    /// real array: the real layout and the `[n0, n1, n2/2 + 1]` complex layout.
    pub fn real_and_spectral(
        n0: usize,
        n1: usize,
        n2: usize,
        comm: &C,
    ) -> Result<(Self, DomainDecomposition<Complex<T>, C>)> {
        let real = Self::new(&[n0, n1, n2], comm)?;
        let spectral = DomainDecomposition::new(&[n0, n1, n2 / 2 + 1], comm)?;
        Ok((real, spectral))
    }
}
