//! CLI, configuration, one-shot and interactive week views
//!
//! This crate provides the `calends` command-line interface.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod interactive;

pub use app::Settings;
pub use cli::Cli;
pub use error::{ClientError, ClientResult};
