//! Shared helpers for request handling.

pub mod validate;
