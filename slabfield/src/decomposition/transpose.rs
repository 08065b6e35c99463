//! Redistribution of a global array between two decompositions related by an axis permutation.
//!
//! Data moves one source slab at a time. For every global index of the source's slowest axis
//! the owning rank sends the part of that slab destined for each receiving rank, tagged with the
//! slab index, and only the two ranks involved in a pair take part in it. Every rank walks the
//! same sequence of pairs, so sends and receives match without any size negotiation.
use itertools::Itertools;
use log::{debug, trace};

use crate::decomposition::types::DomainDecomposition;
use crate::traits::parallel::{Communicator, Element};
use crate::traits::types::{Result, SlabError};

/// Source and destination offsets of the elements of one source slab sent to one rank.
struct Route {
    /// Offset within the source slab.
    source: Vec<usize>,
    /// Offset within the receiving rank's local buffer.
    dest: Vec<usize>,
}

fn validate<T, C: Communicator>(
    source: &DomainDecomposition<T, C>,
    dest: &DomainDecomposition<T, C>,
    perm: &[usize],
    input: &[T],
    output: &[T],
) -> Result<()> {
    source.check_compatible(dest)?;

    let ndims = source.ndims();
    if perm.len() != ndims || perm.iter().sorted().cloned().ne(0..ndims) {
        return Err(SlabError::Configuration(format!(
            "{:?} is not a permutation of {} axes",
            perm, ndims
        )));
    }

    if let Some(axis) = (0..ndims).find(|&d| dest.sizes[d] != source.sizes[perm[d]]) {
        return Err(SlabError::Configuration(format!(
            "axis {} of {:?} does not match axis {} of {:?}",
            axis, dest.sizes, perm[axis], source.sizes
        )));
    }

    if input.len() < source.local_size || output.len() < dest.local_size {
        return Err(SlabError::Configuration(format!(
            "buffers of length {} and {} cannot hold {} and {} elements",
            input.len(),
            output.len(),
            source.local_size,
            dest.local_size
        )));
    }
    Ok(())
}

/// Compute where the elements of source slab `slab` owned by destination rank `rank` come from
/// and where they go, in source row-major order.
fn route<T, C: Communicator>(
    source: &DomainDecomposition<T, C>,
    dest: &DomainDecomposition<T, C>,
    perm: &[usize],
    slab: usize,
    rank: i32,
) -> Route {
    let ndims = source.ndims();
    let (dest_start, _) = dest.slab_interval(rank);

    let mut index = vec![0; ndims];
    index[0] = slab;

    let mut route = Route {
        source: Vec::new(),
        dest: Vec::new(),
    };

    for offset in 0..source.slice_size {
        let mut rest = offset;
        for axis in (1..ndims).rev() {
            index[axis] = rest % source.sizes[axis];
            rest /= source.sizes[axis];
        }

        let outer = index[perm[0]];
        if dest.rank[outer] != rank {
            continue;
        }

        let mut dest_offset = outer - dest_start;
        for axis in 1..ndims {
            dest_offset = dest_offset * dest.sizes[axis] + index[perm[axis]];
        }

        route.source.push(offset);
        route.dest.push(dest_offset);
    }
    route
}

/// Redistribute `input`, laid out according to `source`, into `output`, laid out according to
/// `dest`, where axis `d` of the destination is axis `perm[d]` of the source.
///
/// Collective over the decompositions' communicator, ends with a barrier. Fails without
/// communicating if the decompositions have a different number of axes, live on different
/// communicators, are not related by `perm`, or if a buffer is too short.
///
/// # Arguments
/// * `source` - Decomposition of the input.
/// * `dest` - Decomposition of the output.
/// * `perm` - Axis permutation, `dest.sizes[d] == source.sizes[perm[d]]`.
/// * `input` - Local part of the input array.
/// * `output` - Local part of the output array, every element is overwritten.
pub fn transpose_axes<T, C>(
    source: &DomainDecomposition<T, C>,
    dest: &DomainDecomposition<T, C>,
    perm: &[usize],
    input: &[T],
    output: &mut [T],
) -> Result<()>
where
    T: Element,
    C: Communicator,
{
    validate(source, dest, perm, input, output)?;

    let comm = &source.comm;
    let me = source.myrank;
    debug!(
        "rank {} transposing {:?} -> {:?} with {:?}",
        me, source.sizes, dest.sizes, perm
    );

    // Ranks receiving at least one element of a source slab
    let receivers = (0..dest.nprocs)
        .filter(|&r| dest.slab_interval(r).1 > 0)
        .collect_vec();

    let mut staging = Vec::with_capacity(source.slice_size);

    for slab in 0..source.sizes[0] {
        let sender = source.rank[slab];

        let targets = if perm[0] == 0 {
            vec![dest.rank[slab]]
        } else {
            receivers.clone()
        };

        for rank in targets {
            if me != sender && me != rank {
                continue;
            }

            let route = route(source, dest, perm, slab, rank);
            if route.source.is_empty() {
                continue;
            }

            if me == sender && me == rank {
                let base = (slab - source.starts[0]) * source.slice_size;
                for (&s, &d) in route.source.iter().zip(route.dest.iter()) {
                    output[d] = input[base + s];
                }
            } else if me == sender {
                let base = (slab - source.starts[0]) * source.slice_size;
                staging.clear();
                staging.extend(route.source.iter().map(|&s| input[base + s]));
                trace!("rank {} sending slab {} to {}", me, slab, rank);
                comm.send(rank, slab as i32, &staging);
            } else {
                staging.clear();
                staging.resize(route.dest.len(), T::default());
                comm.receive_into(sender, slab as i32, &mut staging);
                trace!("rank {} received slab {} from {}", me, slab, sender);
                for (&d, &value) in route.dest.iter().zip(staging.iter()) {
                    output[d] = value;
                }
            }
        }
    }

    comm.barrier();
    Ok(())
}

/// Redistribute between a decomposition and the one over the same array with every axis
/// reversed, `[n0, .., nk] -> [nk, .., n0]`.
///
/// # Arguments
/// * `source` - Decomposition of the input.
/// * `dest` - Decomposition of the output.
/// * `input` - Local part of the input array.
/// * `output` - Local part of the output array.
pub fn transpose<T, C>(
    source: &DomainDecomposition<T, C>,
    dest: &DomainDecomposition<T, C>,
    input: &[T],
    output: &mut [T],
) -> Result<()>
where
    T: Element,
    C: Communicator,
{
    let perm = (0..source.ndims()).rev().collect_vec();
    transpose_axes(source, dest, &perm, input, output)
}
