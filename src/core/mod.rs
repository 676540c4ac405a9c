//! Core configuration for the RGB++ client.
//!
//! This module contains:
//! - Chain and network identifiers
//! - Configuration with defaults for every optional knob
//! - The per-network deployed script registry

pub mod config;
pub mod network;
pub mod scripts;

pub use config::*;
pub use network::*;
pub use scripts::*;
