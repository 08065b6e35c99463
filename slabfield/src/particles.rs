//! # Tracer Particles
//!
//! The particle table replicated on every rank, the residency tracking deciding which ranks may
//! touch each particle, chunked particle storage, and tracers advected by a buffered velocity field.
mod io;
mod residency;
mod state;
mod tracers;
pub mod types;

pub use io::get_chunk_offsets;
pub use types::{MemoryChunkStore, ParticleResidency, ParticleState, RawChunkStore, Tracers};
