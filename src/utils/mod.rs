//! Utility modules for the RGB++ core.
//!
//! - Constants
//! - Hex encoding and serde adapters

pub mod constants;
pub mod hex;

pub use constants::*;
