//! codesniff: fetch, cache and run PHP CodeSniffer.
//!
//! This library downloads a PHP CodeSniffer release into a local cache
//! on first use, runs it against a source tree as a child process and
//! turns its exit status into a pass/fail verdict.

pub mod acquire;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod runner;

// Re-export commonly used error types
pub use error::{AcquireError, CheckError, ConfigurationError, ExecutionError};
