//! Fourier space resizing and real space padding removal for slab decomposed fields.
use log::debug;

use crate::decomposition::types::DomainDecomposition;
use crate::traits::parallel::{Communicator, Element};
use crate::traits::types::{Result, SlabError};

/// Index of Fourier mode `ii` of an axis of `ni` modes in an axis of `no` modes, or `None` if the
/// mode does not fit. Non-negative frequencies keep their index, negative ones keep their
/// distance from the end of the axis.
fn mode_index(ii: usize, ni: usize, no: usize) -> Option<usize> {
    if ii <= ni / 2 {
        (ii <= no / 2).then_some(ii)
    } else {
        let oi = ii as i64 + no as i64 - ni as i64;
        if oi < 0 || (no as i64 - oi) >= (no / 2) as i64 {
            None
        } else {
            Some(oi as usize)
        }
    }
}

/// Copy a 3D complex field between two Fourier space layouts of different size, truncating
/// the modes that do not fit and zero filling the ones missing from the input. Along the
/// fastest axis the first `min(ni2, no2)` entries are copied.
///
/// Collective over the decompositions' communicator, ends with a barrier.
///
/// # Arguments
/// * `fi` - Decomposition of the input.
/// * `ai` - Local part of the input.
/// * `fo` - Decomposition of the output.
/// * `ao` - Local part of the output, overwritten.
pub fn resize_spectral<T, C>(
    fi: &DomainDecomposition<T, C>,
    ai: &[T],
    fo: &DomainDecomposition<T, C>,
    ao: &mut [T],
) -> Result<()>
where
    T: Element,
    C: Communicator,
{
    if fi.ndims() != 3 || fo.ndims() != 3 {
        return Err(SlabError::Configuration(format!(
            "spectral resize needs 3D fields, found {} and {} axes",
            fi.ndims(),
            fo.ndims()
        )));
    }
    fi.check_compatible(fo)?;

    if ai.len() < fi.local_size || ao.len() < fo.local_size {
        return Err(SlabError::Configuration(format!(
            "buffers of length {} and {} cannot hold {} and {} elements",
            ai.len(),
            ao.len(),
            fi.local_size,
            fo.local_size
        )));
    }

    let me = fi.myrank;
    debug!(
        "rank {} resizing spectral field {:?} -> {:?}",
        me, fi.sizes, fo.sizes
    );

    let copy_size = fi.sizes[2].min(fo.sizes[2]);
    let mut buffer = vec![T::default(); fi.slice_size];

    ao[..fo.local_size].fill(T::default());

    for ii0 in 0..fi.sizes[0] {
        let Some(oi0) = mode_index(ii0, fi.sizes[0], fo.sizes[0]) else {
            continue;
        };

        let irank = fi.rank[ii0];
        let orank = fo.rank[oi0];

        // A pair whose ranks are both elsewhere involves no work here
        if irank == orank && irank == me {
            let start = (ii0 - fi.starts[0]) * fi.slice_size;
            buffer.copy_from_slice(&ai[start..start + fi.slice_size]);
        } else {
            if me == irank {
                let start = (ii0 - fi.starts[0]) * fi.slice_size;
                fi.comm
                    .send(orank, ii0 as i32, &ai[start..start + fi.slice_size]);
            }
            if me == orank {
                fi.comm.receive_into(irank, ii0 as i32, &mut buffer);
            }
        }

        if me == orank {
            for ii1 in 0..fi.sizes[1] {
                let Some(oi1) = mode_index(ii1, fi.sizes[1], fo.sizes[1]) else {
                    continue;
                };
                let src = ii1 * fi.sizes[2];
                let dst = ((oi0 - fo.starts[0]) * fo.sizes[1] + oi1) * fo.sizes[2];
                ao[dst..dst + copy_size].copy_from_slice(&buffer[src..src + copy_size]);
            }
        }
    }

    fi.comm.barrier();
    Ok(())
}

/// Remove in place the two padding reals per fastest axis row that an in-place real to complex
/// layout carries, for `howmany` interleaved fields.
///
/// # Arguments
/// * `f` - Decomposition of the unpadded real field `[n0, n1, n2]`.
/// * `a` - Local padded buffer, rows of `(n2 + 2) * howmany` values.
/// * `howmany` - Number of interleaved fields.
pub fn clip_zero_padding<T, C>(f: &DomainDecomposition<T, C>, a: &mut [T], howmany: usize) -> Result<()>
where
    T: Copy,
    C: Communicator,
{
    if f.ndims() != 3 {
        return Err(SlabError::Configuration(format!(
            "padding removal needs a 3D field, found {} axes",
            f.ndims()
        )));
    }

    let copy_size = f.sizes[2] * howmany;
    let skip_size = copy_size + 2 * howmany;
    let rows = f.subsizes[0] * f.sizes[1];

    if rows > 0 && a.len() < (rows - 1) * skip_size + copy_size {
        return Err(SlabError::Configuration(format!(
            "buffer of {} elements too short for {} padded rows",
            a.len(),
            rows
        )));
    }

    for row in 0..rows {
        let src = row * skip_size;
        a.copy_within(src..src + copy_size, row * copy_size);
    }
    Ok(())
}
