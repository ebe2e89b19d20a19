//! Complex fault tree generation with constrained random growth.
//!
//! A declarative [`factors::Factors`] configuration controls the shape:
//! operator mix, sharing, sizes and probability ranges. Generation is
//! deterministic for a fixed seed and configuration.

pub mod factors;
pub mod generator;
pub mod summary;

pub use factors::{FactorError, Factors};
pub use generator::generate_fault_tree;
