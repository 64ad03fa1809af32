//! Tooling
//!
//! Command-line front end over the client library.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
