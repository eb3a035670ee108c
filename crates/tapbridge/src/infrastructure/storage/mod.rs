//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the TOML configuration file, supplies
//! defaults when it does not exist, validates interface names, and can write
//! a configuration back to disk.

pub mod config;
