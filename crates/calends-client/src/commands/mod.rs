//! Subcommand implementations.

pub mod cache;
pub mod config;
