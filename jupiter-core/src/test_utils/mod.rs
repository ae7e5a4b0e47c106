//! Test utilities shared by the unit test modules
//!
//! Fixtures for engines, documents and random edit streams, plus seeded
//! RNG helpers so randomized tests replay the same way every run.

pub mod deterministic_rng;
pub mod fixtures;

pub use deterministic_rng::*;
pub use fixtures::*;
