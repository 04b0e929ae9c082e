//! Hashing utilities for Coffer

pub mod hash;

pub use hash::*;
