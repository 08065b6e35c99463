//! Chunked particle storage.
use std::collections::HashMap;
use std::fs;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::trace;

use crate::particles::types::{MemoryChunkStore, RawChunkStore};
use crate::traits::parallel::Element;
use crate::traits::storage::ChunkStore;
use crate::traits::types::{Result, SlabError};

/// Offsets of every chunk of an N dimensional chunked dataset, in row-major chunk order.
///
/// Only whole chunks are enumerated, trailing partial chunks along an axis are not.
///
/// # Arguments
/// * `data_dims` - Extent of the dataset along every axis.
/// * `chunk_dims` - Extent of a chunk along every axis, positive.
pub fn get_chunk_offsets(data_dims: &[usize], chunk_dims: &[usize]) -> Result<Vec<Vec<usize>>> {
    if data_dims.len() != chunk_dims.len() || chunk_dims.iter().any(|&c| c == 0) {
        return Err(SlabError::Configuration(format!(
            "invalid chunk shape {:?} for dataset {:?}",
            chunk_dims, data_dims
        )));
    }

    let nchunks = data_dims
        .iter()
        .zip(chunk_dims.iter())
        .map(|(&d, &c)| d / c)
        .collect::<Vec<_>>();
    let total = nchunks.iter().product::<usize>();

    let offsets = (0..total)
        .map(|index| {
            let mut rest = index;
            let mut offset = vec![0; nchunks.len()];
            for axis in (0..nchunks.len()).rev() {
                offset[axis] = (rest % nchunks[axis]) * chunk_dims[axis];
                rest /= nchunks[axis];
            }
            offset
        })
        .collect();
    Ok(offsets)
}

impl<T> MemoryChunkStore<T> {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of chunks stored.
    pub fn len(&self) -> usize {
        self.chunks.lock().map(|chunks| chunks.len()).unwrap_or(0)
    }

    /// Whether nothing was stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> ChunkStore<T> for MemoryChunkStore<T>
where
    T: Copy + Send,
{
    fn read_chunk(&self, iteration: usize, chunk: usize, buffer: &mut [T]) -> Result<()> {
        let chunks = self
            .chunks
            .lock()
            .map_err(|_| SlabError::Storage("chunk store poisoned".to_string()))?;

        let stored = chunks.get(&(iteration, chunk)).ok_or_else(|| {
            SlabError::Storage(format!("no chunk {} for iteration {}", chunk, iteration))
        })?;

        if stored.len() != buffer.len() {
            return Err(SlabError::Storage(format!(
                "chunk {} of iteration {} holds {} values, expected {}",
                chunk,
                iteration,
                stored.len(),
                buffer.len()
            )));
        }
        buffer.copy_from_slice(stored);
        Ok(())
    }

    fn write_chunk(&self, iteration: usize, chunk: usize, data: &[T]) -> Result<()> {
        let mut chunks = self
            .chunks
            .lock()
            .map_err(|_| SlabError::Storage("chunk store poisoned".to_string()))?;
        chunks.insert((iteration, chunk), data.to_vec());
        Ok(())
    }
}

impl RawChunkStore {
    /// Store files named after `name` inside `directory`, which must exist.
    pub fn new<P: AsRef<Path>>(directory: P, name: &str) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            name: name.to_string(),
        }
    }

    /// File holding a chunk.
    pub fn path(&self, iteration: usize, chunk: usize) -> PathBuf {
        self.directory
            .join(format!("{}_state_i{:05x}_c{}", self.name, iteration, chunk))
    }
}

impl<T> ChunkStore<T> for RawChunkStore
where
    T: Element,
{
    fn read_chunk(&self, iteration: usize, chunk: usize, buffer: &mut [T]) -> Result<()> {
        let path = self.path(iteration, chunk);
        trace!("reading {}", path.display());

        let bytes = fs::read(&path)
            .map_err(|e| SlabError::Storage(format!("{}: {}", path.display(), e)))?;

        let expected = buffer.len() * size_of::<T>();
        if bytes.len() != expected {
            return Err(SlabError::Storage(format!(
                "{} holds {} bytes, expected {}",
                path.display(),
                bytes.len(),
                expected
            )));
        }

        // Copy through the buffer's own bytes, the file contents carry no alignment
        bytemuck::cast_slice_mut::<T, u8>(buffer).copy_from_slice(&bytes);
        Ok(())
    }

    fn write_chunk(&self, iteration: usize, chunk: usize, data: &[T]) -> Result<()> {
        let path = self.path(iteration, chunk);
        trace!("writing {}", path.display());
        fs::write(&path, bytemuck::cast_slice::<T, u8>(data))?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_chunk_offsets() {
        let offsets = get_chunk_offsets(&[4, 6], &[2, 3]).unwrap();
        assert_eq!(
            offsets,
            vec![vec![0, 0], vec![0, 3], vec![2, 0], vec![2, 3]]
        );

        let particles = get_chunk_offsets(&[10, 3], &[5, 3]).unwrap();
        assert_eq!(particles, vec![vec![0, 0], vec![5, 0]]);

        assert!(get_chunk_offsets(&[4, 6], &[2]).is_err());
        assert!(get_chunk_offsets(&[4, 6], &[2, 0]).is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryChunkStore::new();
        store.write_chunk(0, 1, &[1.0f32, 2.0]).unwrap();
        assert_eq!(store.len(), 1);

        let mut buffer = [0.0f32; 2];
        store.read_chunk(0, 1, &mut buffer).unwrap();
        assert_eq!(buffer, [1.0, 2.0]);

        let mut wrong = [0.0f32; 3];
        assert!(store.read_chunk(0, 1, &mut wrong).is_err());
        assert!(store.read_chunk(1, 1, &mut buffer).is_err());
    }

    #[test]
    fn test_raw_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RawChunkStore::new(dir.path(), "tracers");
        assert!(store
            .path(26, 3)
            .ends_with("tracers_state_i0001a_c3"));

        let data = [0.5f64, -1.25, 3.0];
        store.write_chunk(26, 3, &data[..]).unwrap();
        assert_eq!(std::fs::metadata(store.path(26, 3)).unwrap().len(), 24);

        let mut back = [0.0f64; 3];
        store.read_chunk(26, 3, &mut back[..]).unwrap();
        assert_eq!(back, data);

        let mut short = [0.0f64; 2];
        assert!(ChunkStore::<f64>::read_chunk(&store, 26, 3, &mut short).is_err());
        assert!(ChunkStore::<f64>::read_chunk(&store, 27, 3, &mut back).is_err());
    }
}
