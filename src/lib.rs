//! docker-papa library
//!
//! Pushes images held by a Docker engine, or saved with `docker save`,
//! straight to a registry over the Registry HTTP API v2.

pub mod cli;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod image;
pub mod logging;
pub mod pipeline;
pub mod registry;

pub use config::PushConfig;
pub use error::{PusherError, Result};
pub use logging::Logger;
pub use pipeline::{PushDriver, PushResult, PushState};
