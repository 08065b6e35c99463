//! # Trait Definitions
pub mod field;
pub mod parallel;
pub mod particles;
pub mod storage;
pub mod transform;
pub mod types;
