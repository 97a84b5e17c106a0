//! The `hermes` command line tool: argument parsing, configuration discovery and the
//! wiring of record files, templates and the SMTP transport into a dispatch run.

pub mod cli;
pub mod config;
pub mod send;

pub use cli::{Cli, Command, SendArgs};
pub use config::Config;
