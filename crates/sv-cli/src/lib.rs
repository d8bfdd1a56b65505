//! Spike sorting evaluation CLI library.
//!
//! This crate provides the `spikeval` command-line interface on top of
//! `sv-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, InputArgs, ParamOverrides};
pub use config::Config;
