//! Equation-of-state model implementations.
//!
//! Models are implemented as small, pure functions so that fitting and plotting
//! code can stay generic over `EosKind`.

pub mod eos;

pub use eos::*;
