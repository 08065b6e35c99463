//! # Spectral to Real Resampling
//!
//! Turns raw Fourier space dumps produced on one grid into an interleaved real space field on
//! another, possibly finer, grid: read, optional byte swap, transpose, resize, interleave,
//! backward transform and padding removal.
use std::path::Path;

use log::{debug, info};
use num::Float;
use num_complex::Complex;

use crate::decomposition::{clip_zero_padding, resize_spectral, transpose, DomainDecomposition};
use crate::traits::parallel::{Communicator, Element, SwapBytes};
use crate::traits::transform::SpectralTransform;
use crate::traits::types::{Result, SlabError};

/// Resamples `howmany` complex fields of shape `[n0, n1, n2]`, stored with their axes reversed
/// relative to the output, into a real `[N0, N1, N2]` field with the `howmany` values of every
/// grid point adjacent.
pub struct SpectralToReal<T, C>
where
    T: Float + Element,
    C: Communicator,
{
    /// Layout of one dump, `[n0, n1, n2]`.
    input: DomainDecomposition<Complex<T>, C>,

    /// Layout of one dump with its axes reversed, `[n2, n1, n0]`.
    transposed: DomainDecomposition<Complex<T>, C>,

    /// Layout of one field in Fourier space on the output grid, `[N0, N1, N2/2 + 1]`.
    spectral: DomainDecomposition<Complex<T>, C>,

    /// Layout of one field in real space on the output grid, `[N0, N1, N2]`.
    real: DomainDecomposition<T, C>,

    /// Number of fields.
    howmany: usize,

    /// Whether dumps were written with the opposite byte order.
    swap_bytes: bool,
}

impl<T, C> SpectralToReal<T, C>
where
    T: Float + Element + SwapBytes,
    C: Communicator,
{
    /// Set up the layouts of every stage.
    ///
    /// Fails if the output grid cannot hold every mode of the input, or if its fastest axis is
    /// odd.
    ///
    /// # Arguments
    /// * `input` - Shape `[n0, n1, n2]` of the dumps.
    /// * `output` - Shape `[N0, N1, N2]` of the real output.
    /// * `howmany` - Number of fields.
    /// * `swap_bytes` - Whether dumps need their byte order reversed.
    /// * `comm` - Communicator of the participating ranks.
    pub fn new(
        input: [usize; 3],
        output: [usize; 3],
        howmany: usize,
        swap_bytes: bool,
        comm: &C,
    ) -> Result<Self> {
        let [n0, n1, n2] = input;
        let [m0, m1, m2] = output;

        if n0 == 0 || howmany == 0 {
            return Err(SlabError::Configuration(
                "spectral resampling needs at least one field and one mode".to_string(),
            ));
        }

        if m2 % 2 != 0 {
            return Err(SlabError::Configuration(format!(
                "in place real transforms need an even fastest axis, found {}",
                m2
            )));
        }

        if m0 < n2 || m1 < n1 || m2 < 2 * (n0 - 1) {
            return Err(SlabError::Configuration(format!(
                "output dimensions should be larger than input dimensions, {:?} cannot hold {:?}",
                output, input
            )));
        }

        let input = DomainDecomposition::new(&[n0, n1, n2], comm)?;
        let transposed = input.transposed()?;
        let (real, spectral) = DomainDecomposition::real_and_spectral(m0, m1, m2, comm)?;

        Ok(Self {
            input,
            transposed,
            spectral,
            real,
            howmany,
            swap_bytes,
        })
    }

    /// Layout of one output field.
    pub fn real(&self) -> &DomainDecomposition<T, C> {
        &self.real
    }

    /// Layout of one field in Fourier space on the output grid.
    pub fn spectral(&self) -> &DomainDecomposition<Complex<T>, C> {
        &self.spectral
    }

    /// Number of fields.
    pub fn howmany(&self) -> usize {
        self.howmany
    }

    /// Read the dumps and bring them onto the output grid in Fourier space, interleaved.
    ///
    /// Collective. Returns the local part of the interleaved spectral field,
    /// `howmany * spectral.local_size()` values.
    pub fn to_spectral<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Complex<T>>> {
        if paths.len() != self.howmany {
            return Err(SlabError::Configuration(format!(
                "expected {} dumps, found {}",
                self.howmany,
                paths.len()
            )));
        }

        let local = self.spectral.local_size();
        let mut dump = vec![Complex::default(); self.input.local_size()];
        let mut reordered = vec![Complex::default(); self.transposed.local_size()];
        let mut fields = vec![Complex::default(); self.howmany * local];

        for (k, path) in paths.iter().enumerate() {
            debug!(
                "rank {} resampling {}",
                self.input.myrank(),
                path.as_ref().display()
            );

            self.input.read(path, &mut dump)?;
            if self.swap_bytes {
                self.input.switch_endianness(&mut dump)?;
            }
            transpose(&self.input, &self.transposed, &dump, &mut reordered)?;
            resize_spectral(
                &self.transposed,
                &reordered,
                &self.spectral,
                &mut fields[k * local..(k + 1) * local],
            )?;
        }

        self.spectral.interleave(&mut fields, self.howmany)?;
        Ok(fields)
    }

    /// Run the whole pipeline and return the local part of the interleaved real field,
    /// `howmany * real.local_size()` values.
    ///
    /// Collective.
    ///
    /// # Arguments
    /// * `paths` - One dump per field.
    /// * `transform` - Backward transform over the spectral layout.
    pub fn run<P, F>(&self, paths: &[P], transform: &mut F) -> Result<Vec<T>>
    where
        P: AsRef<Path>,
        F: SpectralTransform<T>,
    {
        let mut fields = self.to_spectral(paths)?;
        transform.backward(&mut fields, self.howmany)?;

        let mut values = bytemuck::cast_slice::<Complex<T>, T>(&fields).to_vec();
        clip_zero_padding(&self.real, &mut values, self.howmany)?;
        values.truncate(self.howmany * self.real.local_size());

        if self.real.myrank() == 0 {
            info!(
                "resampled {} fields {:?} -> {:?}",
                self.howmany,
                self.input.sizes(),
                self.real.sizes()
            );
        }
        Ok(values)
    }
}
