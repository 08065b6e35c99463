//! Storage Traits
use crate::traits::types::Result;

/// Chunked storage of a particle table keyed by iteration and chunk index.
///
/// Chunks hold whole particles, each `ncomponents` values wide. Implementations must be safe to
/// call from every rank at once, ranks never touch the same chunk in one call.
pub trait ChunkStore<T>: Sync {
    /// Fill `buffer` with the contents of a chunk, its length must match the stored chunk.
    fn read_chunk(&self, iteration: usize, chunk: usize, buffer: &mut [T]) -> Result<()>;

    /// Store the contents of a chunk, replacing any previous value.
    fn write_chunk(&self, iteration: usize, chunk: usize, data: &[T]) -> Result<()>;
}
