//! Command-line interface
//!
//! Argument parsing for the node binary, the thin client commands and the
//! transaction-file load driver.

pub mod commands;
pub mod replay;

pub use commands::{Command, Opt, StartOverrides};
pub use replay::{replay, targets_in_dir, ReplaySummary, ReplayTarget};
