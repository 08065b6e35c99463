//! Transform Traits
use num_complex::Complex;

use crate::traits::types::Result;

/// A distributed real to complex Fourier transform working in place on slab decomposed buffers.
///
/// The complex side is laid out as `[n0, n1, n2/2 + 1]` and the real side as `[n0, n1, n2 + 2]`
/// with two padding reals per row, both with `howmany` fields interleaved.
pub trait SpectralTransform<T> {
    /// Real to complex transform of the padded local buffer, in place.
    fn forward(&mut self, data: &mut [Complex<T>], howmany: usize) -> Result<()>;

    /// Complex to real transform of the local buffer, in place, unnormalised.
    fn backward(&mut self, data: &mut [Complex<T>], howmany: usize) -> Result<()>;
}
