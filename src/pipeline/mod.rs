//! Acquire-then-run orchestration.
//!
//! # Pipeline Flow
//!
//! 1. **Settings**: CLI flags, environment and settings file are validated
//!    into a [`CheckPlan`](crate::config::CheckPlan)
//! 2. **Acquire**: the tool location is resolved, downloading if requested
//! 3. **Run**: the tool is executed against the source tree
//!
//! The resolved tool path travels in an [`ExecutionContext`] owned by one
//! invocation; nothing is cached in process-wide state.

pub mod orchestrator;

pub use orchestrator::{CheckPipeline, ExecutionContext, ToolSource};
