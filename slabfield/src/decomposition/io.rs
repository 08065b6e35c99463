//! Raw binary I/O of slab decomposed fields.
//!
//! Files hold the global array as a flat row-major sequence of elements with no header. A slab
//! is a contiguous byte range of the file, so every rank reads or writes its own range directly.
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::mem::size_of;
use std::path::Path;

use log::debug;

use crate::decomposition::types::DomainDecomposition;
use crate::parallel::agree;
use crate::traits::parallel::{Communicator, Element};
use crate::traits::types::{Result, SlabError};

impl<T, C> DomainDecomposition<T, C>
where
    T: Element,
    C: Communicator,
{
    fn byte_range(&self) -> (u64, usize) {
        let offset = (self.starts[0] * self.slice_size * size_of::<T>()) as u64;
        (offset, self.local_size * size_of::<T>())
    }

    fn check_buffer(&self, length: usize) -> Result<()> {
        if length < self.local_size {
            return Err(SlabError::Configuration(format!(
                "buffer of {} elements shorter than local size {}",
                length, self.local_size
            )));
        }
        Ok(())
    }

    fn read_slab(&self, path: &Path, buffer: &mut [T]) -> Result<()> {
        self.check_buffer(buffer.len())?;

        let mut file = File::open(path)?;
        let expected = (self.full_size * size_of::<T>()) as u64;
        let found = file.metadata()?.len();
        if found < expected {
            return Err(SlabError::Configuration(format!(
                "{} holds {} bytes, expected {}",
                path.display(),
                found,
                expected
            )));
        }

        let (offset, _) = self.byte_range();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(bytemuck::cast_slice_mut(&mut buffer[..self.local_size]))?;
        Ok(())
    }

    fn create_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        file.set_len((self.full_size * size_of::<T>()) as u64)?;
        Ok(())
    }

    fn write_slab(&self, path: &Path, buffer: &[T]) -> Result<()> {
        self.check_buffer(buffer.len())?;

        let (offset, length) = self.byte_range();
        if length == 0 {
            return Ok(());
        }
        let mut file = OpenOptions::new().write(true).open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(bytemuck::cast_slice(&buffer[..self.local_size]))?;
        file.flush()?;
        Ok(())
    }

    /// Read this rank's slab of a raw field file.
    ///
    /// Collective, every rank returns an error if any rank failed.
    ///
    /// # Arguments
    /// * `path` - File holding the global array.
    /// * `buffer` - Local buffer, at least `local_size` elements.
    pub fn read<P: AsRef<Path>>(&self, path: P, buffer: &mut [T]) -> Result<()> {
        let path = path.as_ref();
        debug!("rank {} reading {}", self.myrank, path.display());
        let local = self.read_slab(path, buffer);
        agree(&self.comm, local, "read")
    }

    /// Write this rank's slab into a raw field file, created or truncated by rank 0.
    ///
    /// Collective, every rank returns an error if any rank failed.
    ///
    /// # Arguments
    /// * `path` - File to hold the global array.
    /// * `buffer` - Local buffer, at least `local_size` elements.
    pub fn write<P: AsRef<Path>>(&self, path: P, buffer: &[T]) -> Result<()> {
        let path = path.as_ref();
        debug!("rank {} writing {}", self.myrank, path.display());

        let created = if self.myrank == 0 {
            self.create_file(path)
        } else {
            Ok(())
        };
        agree(&self.comm, created, "file creation")?;

        let local = self.write_slab(path, buffer);
        agree(&self.comm, local, "write")
    }
}
