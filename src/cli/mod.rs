//! Command line interface module
//!
//! Argument parsing and the runner that assembles configuration, image
//! source and registry connector before handing over to the push pipeline.

pub mod args;
pub mod runner;

pub use args::{Args, Command, PushArgs};
pub use runner::Runner;
