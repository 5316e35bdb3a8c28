//! Command implementations for the CLI
//!
//! - start: Start the standalone collector server
//! - config: Configuration display and validation

pub mod config;
pub mod start;
