//! # Slab Decomposed Fields and Tracers
//!
//! Distributed 3D fields stored as contiguous slabs along their slowest axis, one slab per rank,
//! and tracer particles advected through them.
//!
//! Notable features of this library are:
//! * Slab decompositions with transposes and Fourier space resizing between them.
//! * Ghost margin buffers refreshed by a scoped neighbour exchange.
//! * Residency tracking deciding which ranks may touch each particle until the next synchronisation.
//! * Periodic interpolation with a pluggable weight kernel, whose partial results sum across ranks.
//! * An in-process thread-backed communicator for tests, and MPI through the `mpi` feature.
#![cfg_attr(feature = "strict", deny(warnings))]
#![warn(missing_docs)]

pub mod config;
pub mod decomposition;
pub mod field;
pub mod helpers;
pub mod interpolation;
pub mod parallel;
pub mod particles;
pub mod pipeline;
pub mod traits;

// Public API
#[doc(inline)]
pub use decomposition::{DomainDecomposition, IntervalSplitter};
#[doc(inline)]
pub use field::FieldBuffer;
#[doc(inline)]
pub use interpolation::PeriodicInterpolator;
#[doc(inline)]
pub use particles::{ParticleResidency, ParticleState};
