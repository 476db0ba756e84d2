#![deny(missing_docs)]
//! Error types, uniform random sources and seed derivation shared by the
//! ptmc sampler crates.

pub mod errors;
pub mod rng;

pub use errors::{ErrorInfo, McmcError};
pub use rng::{derive_substream_seed, RngHandle, UniformSource};
