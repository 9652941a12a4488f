//! Command-line runner for stepwise flows.

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod output;
pub mod signal;
pub mod styles;
