//! # Locally Readable Fields
//!
//! The ghost margin buffer of a slab decomposed field, refreshed by neighbour exchange, and the
//! borrowed views implementing [`crate::traits::field::LocalField`] over it or over a plain slab.
mod buffer;
mod halo;
mod slab;
pub mod types;

pub(crate) use buffer::field_shape;
pub use types::{FieldBuffer, HaloExchange, SlabField};
