//! # Slab Decompositions
//!
//! Description of arrays split along their slowest axis across the ranks of a communicator, and
//! the collective operations moving data between two such descriptions.
mod descriptor;
mod io;
mod layout;
pub mod spectral;
mod splitter;
pub mod transpose;
pub mod types;

pub use spectral::{clip_zero_padding, resize_spectral};
pub use transpose::{transpose, transpose_axes};
pub use types::{DomainDecomposition, IntervalSplitter};
