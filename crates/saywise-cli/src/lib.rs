//! saywise CLI library.
//!
//! The binary in `main.rs` is the composition root; this library holds the
//! argument parser and the command handlers so they can be tested.

#![deny(unused_crate_dependencies)]

// Used only by the binary target
use dotenvy as _;
use tracing_subscriber as _;

#[cfg(test)]
use tokio_test as _;

pub mod commands;
pub mod handlers;
pub mod parser;

pub use commands::Commands;
pub use parser::Cli;
