//! CKB side of RGB++.
//!
//! This module provides:
//! - The transaction data model and its molecule encoding
//! - Capacity and fee calculation
//! - Cell collection and the CKB-only transaction builders
//! - Skeleton conversion, signing and submission

pub mod builder;
pub mod capacity;
pub mod collector;
pub mod fee;
pub mod signer;
pub mod skeleton;
pub mod types;

pub use builder::*;
pub use capacity::*;
pub use collector::*;
pub use fee::*;
pub use signer::*;
pub use skeleton::*;
pub use types::*;
