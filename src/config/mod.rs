//! Configuration management
//!
//! Node settings come from defaults, an optional TOML file, environment
//! variables and finally command line flags, in that order.

pub mod settings;

pub use settings::{NodeConfig, RetryPolicy, Settings};
