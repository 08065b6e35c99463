//! # Periodic Interpolation
//!
//! Evaluation of locally readable fields at particle positions in a periodic box, with a
//! pluggable weight kernel. Stencils crossing the boundary of the locally readable z layers are
//! clipped to them, so partial results computed on different ranks can be summed.
mod computer;
mod lagrange;
pub mod types;

pub(crate) use computer::periodic_cell;
pub use computer::{init_result_array, reduce};
pub use types::{LagrangeKernel, PeriodicInterpolator};
