//! Command handlers for CLI operations
//!
//! This module contains handlers for different CLI commands,
//! separating command execution logic from parsing and validation.

pub mod send;
pub mod serve;
pub mod token;

pub use send::{SendCommandHandler, build_payload};
pub use serve::ServeCommandHandler;
pub use token::TokenCommandHandler;
