//! Core types, config, and errors shared across the Quorum workspace.

pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
