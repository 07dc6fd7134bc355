//! Command-line front end for callwire: configuration loading and the
//! operations behind each subcommand.

pub mod commands;
pub mod config;
