//! Ghost margin buffers.
use log::debug;

use crate::decomposition::DomainDecomposition;
use crate::field::types::{FieldBuffer, HaloExchange, SlabField};
use crate::traits::parallel::{Communicator, Element};
use crate::traits::types::{Result, SlabError};

/// Tag of ghost slices travelling to the previous rank.
pub(crate) const TAG_DOWN: i32 = 0;
/// Tag of ghost slices travelling to the next rank.
pub(crate) const TAG_UP: i32 = 1;

/// Grid extents `[nx, ny, nz]` and components per point of a field decomposition.
pub(crate) fn field_shape<T, C: Communicator>(
    decomposition: &DomainDecomposition<T, C>,
) -> Result<([usize; 3], usize)> {
    let sizes = decomposition.sizes();
    match sizes.len() {
        3 => Ok(([sizes[2], sizes[1], sizes[0]], 1)),
        4 => Ok(([sizes[2], sizes[1], sizes[0]], sizes[3])),
        n => Err(SlabError::Configuration(format!(
            "a field is laid out as [nz, ny, nx] or [nz, ny, nx, ncomponents], found {} axes",
            n
        ))),
    }
}

impl<T, C> FieldBuffer<T, C>
where
    T: Element,
    C: Communicator,
{
    /// Allocate the buffer of a field with `margin` ghost slices on either side of the slab.
    ///
    /// Fails if any rank owns no slab, or fewer slabs than `margin`, since a neighbour could
    /// then not supply the ghosts.
    ///
    /// # Arguments
    /// * `decomposition` - Layout of the field, `[nz, ny, nx]` or `[nz, ny, nx, ncomponents]`.
    /// * `margin` - Number of ghost slices on either side.
    pub fn new(decomposition: DomainDecomposition<T, C>, margin: usize) -> Result<Self> {
        field_shape(&decomposition)?;

        let thinnest = decomposition.min_subsize();
        if thinnest == 0 {
            return Err(SlabError::Configuration(format!(
                "{} ranks cannot share {} slabs with ghosts",
                decomposition.nprocs(),
                decomposition.sizes()[0]
            )));
        }

        if margin > thinnest {
            return Err(SlabError::Configuration(format!(
                "margin {} larger than the thinnest slab of {}",
                margin, thinnest
            )));
        }

        let length = decomposition.local_size() + 2 * margin * decomposition.slice_size();
        debug!(
            "rank {} field buffer with margin {}, {} elements",
            decomposition.myrank(),
            margin,
            length
        );

        Ok(Self {
            decomposition,
            margin,
            data: vec![T::default(); length],
        })
    }

    /// Layout of the field without ghosts.
    pub fn decomposition(&self) -> &DomainDecomposition<T, C> {
        &self.decomposition
    }

    /// Number of ghost slices on either side.
    pub fn margin(&self) -> usize {
        self.margin
    }

    /// The whole buffer, ghosts included.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// The owned slab.
    pub fn owned(&self) -> &[T] {
        let start = self.margin * self.decomposition.slice_size();
        &self.data[start..start + self.decomposition.local_size()]
    }

    /// Copy `source`, the rank's slab of the field, into the buffer and return the handle of a
    /// pending ghost refresh.
    ///
    /// No transfer happens here. The margins are exchanged with the neighbouring ranks when
    /// the handle is waited on or dropped, which is collective over the decomposition's
    /// communicator. The buffer stays borrowed until then.
    ///
    /// # Arguments
    /// * `source` - Local slab, at least `local_size` elements.
    pub fn begin_refresh(&mut self, source: &[T]) -> Result<HaloExchange<'_, T, C>> {
        let local_size = self.decomposition.local_size();
        if source.len() < local_size {
            return Err(SlabError::Configuration(format!(
                "slab of {} elements shorter than local size {}",
                source.len(),
                local_size
            )));
        }

        let start = self.margin * self.decomposition.slice_size();
        self.data[start..start + local_size].copy_from_slice(&source[..local_size]);

        Ok(HaloExchange {
            buffer: self,
            pending: true,
        })
    }

    /// Copy `source` into the buffer and refresh the ghosts, blocking until done.
    pub fn refresh(&mut self, source: &[T]) -> Result<()> {
        self.begin_refresh(source)?.wait();
        Ok(())
    }

    /// Ranks owning the slabs just below and just above this rank's slab, periodically.
    pub fn neighbours(&self) -> (i32, i32) {
        let d = &self.decomposition;
        let nz = d.sizes()[0];
        let start = d.starts()[0];
        let end = start + d.subsizes()[0];
        (d.owner((start + nz - 1) % nz), d.owner(end % nz))
    }

    /// The layers readable after a refresh, the slab and its ghosts.
    ///
    /// The interval is `[start - margin, end + margin)` in unwrapped layers, or the whole axis
    /// when that covers it.
    pub fn view(&self) -> SlabField<'_, T> {
        let d = &self.decomposition;
        let nz = d.sizes()[0] as i64;
        let lowest = d.starts()[0] as i64 - self.margin as i64;
        let highest = lowest + (d.subsizes()[0] + 2 * self.margin) as i64;
        let interval = if highest - lowest >= nz {
            (0, nz)
        } else {
            (lowest, highest)
        };

        let sizes = d.sizes();
        SlabField {
            grid: [sizes[2], sizes[1], sizes[0]],
            ncomponents: sizes.get(3).cloned().unwrap_or(1),
            lowest,
            interval,
            data: &self.data,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parallel::{run_spmd, LocalCommunicator};
    use crate::traits::field::LocalField;

    /// Slab whose values are the global z index of each point.
    fn layer_field<C: Communicator>(d: &DomainDecomposition<f64, C>) -> Vec<f64> {
        (0..d.local_size())
            .map(|offset| d.global_index(offset)[0] as f64)
            .collect()
    }

    #[test]
    fn test_margin_validation() {
        run_spmd(3, |comm| {
            let d = DomainDecomposition::<f64, _>::new(&[7, 2, 2], &comm).unwrap();
            assert!(FieldBuffer::new(d, 3).is_err());

            let d = DomainDecomposition::<f64, _>::new(&[7, 2, 2], &comm).unwrap();
            assert!(FieldBuffer::new(d, 2).is_ok());

            let d = DomainDecomposition::<f64, _>::new(&[2, 2, 2], &comm).unwrap();
            assert!(FieldBuffer::new(d, 0).is_err());
        });

        let comm = LocalCommunicator::solo();
        let d = DomainDecomposition::<f64, _>::new(&[4, 4], &comm).unwrap();
        assert!(FieldBuffer::new(d, 1).is_err());
    }

    #[test]
    fn test_refresh_fills_ghosts() {
        for nprocs in 1..5 {
            run_spmd(nprocs, |comm| {
                let nz = 8;
                let margin = 2;
                let d = DomainDecomposition::<f64, _>::new(&[nz, 3, 2, 2], &comm).unwrap();
                let slab = layer_field(&d);
                let slice = d.slice_size();
                let start = d.starts()[0] as i64;
                let subsize = d.subsizes()[0];

                let mut buffer = FieldBuffer::new(d, margin).unwrap();
                buffer.refresh(&slab).unwrap();
                assert_eq!(buffer.owned(), &slab[..]);

                for (row, values) in buffer.data().chunks(slice).enumerate() {
                    let layer = (start - margin as i64 + row as i64).rem_euclid(nz as i64);
                    assert!(values.iter().all(|&v| v == layer as f64));
                }
                assert_eq!(buffer.data().len(), (subsize + 2 * margin) * slice);
            });
        }
    }

    #[test]
    fn test_handle_completes_on_drop() {
        run_spmd(2, |comm| {
            let d = DomainDecomposition::<f64, _>::new(&[4, 1, 1], &comm).unwrap();
            let slab = layer_field(&d);
            let mut buffer = FieldBuffer::new(d, 1).unwrap();
            {
                let _exchange = buffer.begin_refresh(&slab).unwrap();
            }
            let expected = if comm.rank() == 0 {
                vec![3., 0., 1., 2.]
            } else {
                vec![1., 2., 3., 0.]
            };
            assert_eq!(buffer.data(), &expected[..]);
        });
    }

    #[test]
    fn test_wait_replaces_stale_ghosts() {
        run_spmd(3, |comm| {
            let d = DomainDecomposition::<f64, _>::new(&[6, 1, 1], &comm).unwrap();
            let slab = layer_field(&d);
            let mut buffer = FieldBuffer::new(d, 1).unwrap();
            buffer.refresh(&vec![-1.0; slab.len()]).unwrap();

            let exchange = buffer.begin_refresh(&slab).unwrap();
            exchange.wait();

            let start = 2 * comm.rank() as i64;
            let expected = (start - 1..start + 3)
                .map(|layer| layer.rem_euclid(6) as f64)
                .collect::<Vec<_>>();
            assert_eq!(buffer.data(), &expected[..]);
        });
    }

    #[test]
    fn test_point_lookup() {
        run_spmd(2, |comm| {
            let d = DomainDecomposition::<f64, _>::new(&[6, 2, 3], &comm).unwrap();
            let slab = layer_field(&d);
            let mut buffer = FieldBuffer::new(d, 1).unwrap();
            buffer.refresh(&slab).unwrap();

            let view = buffer.view();
            let (lo, hi) = view.z_interval();
            if comm.rank() == 0 {
                assert_eq!((lo, hi), (-1, 4));
            } else {
                assert_eq!((lo, hi), (2, 7));
            }
            for z in lo..hi {
                assert_eq!(view.point(2, 1, z), &[z.rem_euclid(6) as f64]);
            }
        });
    }

    #[test]
    fn test_interval_spanning_axis() {
        run_spmd(2, |comm| {
            let d = DomainDecomposition::<f64, _>::new(&[4, 1, 1], &comm).unwrap();
            let slab = layer_field(&d);
            let mut buffer = FieldBuffer::new(d, 2).unwrap();
            buffer.refresh(&slab).unwrap();

            let view = buffer.view();
            assert_eq!(view.z_interval(), (0, 4));
            for z in 0..4 {
                assert_eq!(view.point(0, 0, z), &[z as f64]);
            }
        });
    }
}
