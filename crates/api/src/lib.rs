//! # Horizon API
//!
//! HTTP shim over the indexer: HAL page envelopes, problem-detail errors,
//! configuration and the `horizon` binary's building blocks.

pub mod config;
pub mod handlers;
pub mod problem;
pub mod routes;
pub mod state;

pub use config::{ConfigError, HorizonConfig};
pub use problem::{ApiError, Problem};
pub use routes::create_router;
pub use state::AppState;
