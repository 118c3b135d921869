//! HTTP server for the Quorum backend.
//!
//! Route handlers stay thin: admission control, identity derivation,
//! and error mapping live here; everything else is delegated to the
//! service crates.

pub mod error;
pub mod identity;
pub mod rate_limit;
pub mod routes;
pub mod server;
pub mod state;

pub use server::serve;
pub use state::AppState;
