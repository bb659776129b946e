//! Tooling & Integration Layer
//!
//! Command-line driver over a directory, built on the browser engine.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
