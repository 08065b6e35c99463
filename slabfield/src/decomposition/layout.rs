//! In-place rearrangements of a rank's local buffer.
use rayon::prelude::*;

use crate::decomposition::types::DomainDecomposition;
use crate::traits::parallel::{Communicator, SwapBytes};
use crate::traits::types::{Result, SlabError};

impl<T, C> DomainDecomposition<T, C>
where
    T: Copy + Send + Sync,
    C: Communicator,
{
    /// Rewrite `dim` consecutive local fields, each laid out by this decomposition, so that the
    /// `dim` values of every grid point become adjacent.
    ///
    /// # Arguments
    /// * `array` - `dim` local buffers back to back, at least `dim * local_size` elements.
    /// * `dim` - Number of fields.
    pub fn interleave(&self, array: &mut [T], dim: usize) -> Result<()> {
        let total = dim * self.local_size;
        if array.len() < total {
            return Err(SlabError::Configuration(format!(
                "cannot interleave {} fields of {} elements in a buffer of {}",
                dim,
                self.local_size,
                array.len()
            )));
        }

        if dim <= 1 || total == 0 {
            return Ok(());
        }

        let fields = array[..total].to_vec();
        let local_size = self.local_size;
        array[..total]
            .par_chunks_exact_mut(dim)
            .enumerate()
            .for_each(|(i, point)| {
                for (k, value) in point.iter_mut().enumerate() {
                    *value = fields[k * local_size + i];
                }
            });
        Ok(())
    }
}

impl<T, C> DomainDecomposition<T, C>
where
    T: SwapBytes + Send + Sync,
    C: Communicator,
{
    /// Reverse the byte order of every element of the local buffer.
    pub fn switch_endianness(&self, array: &mut [T]) -> Result<()> {
        if array.len() < self.local_size {
            return Err(SlabError::Configuration(format!(
                "buffer of {} elements shorter than local size {}",
                array.len(),
                self.local_size
            )));
        }

        array[..self.local_size]
            .par_iter_mut()
            .for_each(|value| *value = value.swap_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parallel::LocalCommunicator;
    use num_complex::Complex32;

    #[test]
    fn test_interleave() {
        let comm = LocalCommunicator::solo();
        let d = DomainDecomposition::<f32, _>::new(&[2, 2, 1], &comm).unwrap();
        let mut array = vec![0., 1., 2., 3., 10., 11., 12., 13., 20., 21., 22., 23.];
        d.interleave(&mut array, 3).unwrap();
        assert_eq!(
            array,
            vec![0., 10., 20., 1., 11., 21., 2., 12., 22., 3., 13., 23.]
        );

        let mut short = vec![0.0; 5];
        assert!(d.interleave(&mut short, 2).is_err());
    }

    #[test]
    fn test_switch_endianness() {
        let comm = LocalCommunicator::solo();
        let d = DomainDecomposition::<Complex32, _>::new(&[1, 2], &comm).unwrap();
        let original = vec![Complex32::new(1.5, -2.0), Complex32::new(3.25, 1e-3)];
        let mut array = original
            .iter()
            .map(|c| {
                Complex32::new(
                    f32::from_be_bytes(c.re.to_le_bytes()),
                    f32::from_be_bytes(c.im.to_le_bytes()),
                )
            })
            .collect::<Vec<_>>();

        d.switch_endianness(&mut array).unwrap();
        assert_eq!(array, original);

        d.switch_endianness(&mut array).unwrap();
        d.switch_endianness(&mut array).unwrap();
        assert_eq!(array, original);
    }
}
