//! CLI module: argument parsing, configuration layering, commands and output

pub mod args;
pub mod commands;
pub mod config_layer;
pub mod output;

pub use args::*;
pub use commands::*;
