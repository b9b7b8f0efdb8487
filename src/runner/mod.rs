//! Runner for PHP CodeSniffer.
//!
//! Builds the interpreter command line, runs it as a child process, relays
//! its output line by line and maps the exit code to a verdict.
//!
//! # Example
//!
//! ```ignore
//! use codesniff::runner::{RunConfiguration, Runner, TracingSink};
//!
//! let config = RunConfiguration::new("/opt/phpcs", "/usr/bin/php", "./src")?
//!     .with_ruleset("PSR2");
//!
//! let result = Runner::new().run(&config, &mut TracingSink).await?;
//! println!("{}", result.outcome());
//! ```

pub mod config;
pub mod executor;
pub mod output;
pub mod process;
pub mod result;

pub use config::{RunConfiguration, DEFAULT_MEMORY_LIMIT, ENTRY_SCRIPT};
pub use executor::Runner;
pub use output::{BufferSink, OutputSink, OutputStream, TracingSink};
pub use process::{ChildProcess, ProcessLauncher, TokioLauncher};
pub use result::{ExecutionResult, Outcome};
