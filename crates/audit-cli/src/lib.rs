//! Audit assistant command-line front end
//!
//! Configuration loading, logging setup and the subcommand implementations
//! behind the `audit-assistant` binary.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod commands;
pub mod config;
pub mod logging;

pub use config::{AssistantConfig, ConfigError};
