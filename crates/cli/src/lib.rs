//! s3kv CLI library
//!
//! Exports the CLI components for use in integration tests.

pub mod commands;
pub mod exit_code;
pub mod output;
