//! Command-line front-end for the HIL client.
//!
//! `cli` defines the clap command tree and maps each subcommand onto one
//! `Session` call; `transport` supplies the blocking ureq `Transport`.

pub mod cli;
pub mod transport;

pub use cli::{execute, Cli, Command};
pub use transport::UreqTransport;
