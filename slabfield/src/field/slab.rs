//! Borrowed views of the readable layers of a field.
use num::Float;

use crate::decomposition::DomainDecomposition;
use crate::field::buffer::field_shape;
use crate::field::types::SlabField;
use crate::traits::field::LocalField;
use crate::traits::parallel::{Communicator, Element};
use crate::traits::types::{Result, SlabError};

impl<'a, T> SlabField<'a, T>
where
    T: Element,
{
    /// View `data` as this rank's slab of a field laid out by `decomposition`, without ghosts.
    ///
    /// # Arguments
    /// * `decomposition` - Layout of the field, `[nz, ny, nx]` or `[nz, ny, nx, ncomponents]`.
    /// * `data` - Local slab, at least `local_size` elements.
    pub fn new<C: Communicator>(
        decomposition: &DomainDecomposition<T, C>,
        data: &'a [T],
    ) -> Result<Self> {
        let (grid, ncomponents) = field_shape(decomposition)?;
        if data.len() < decomposition.local_size() {
            return Err(SlabError::Configuration(format!(
                "slab of {} elements shorter than local size {}",
                data.len(),
                decomposition.local_size()
            )));
        }

        let start = decomposition.starts()[0] as i64;
        Ok(Self {
            grid,
            ncomponents,
            lowest: start,
            interval: (start, start + decomposition.subsizes()[0] as i64),
            data,
        })
    }
}

impl<'a, T> LocalField for SlabField<'a, T>
where
    T: Element + Float,
{
    type Scalar = T;

    fn grid(&self) -> [usize; 3] {
        self.grid
    }

    fn ncomponents(&self) -> usize {
        self.ncomponents
    }

    fn z_interval(&self) -> (i64, i64) {
        self.interval
    }

    fn point(&self, x: usize, y: usize, z: i64) -> &[T] {
        let [nx, ny, nz] = self.grid;

        // Unwrapped layers of a view spanning the whole axis may sit one period away
        let row = (z - self.lowest).rem_euclid(nz as i64) as usize;
        let offset = ((row * ny + y) * nx + x) * self.ncomponents;
        &self.data[offset..offset + self.ncomponents]
    }
}
