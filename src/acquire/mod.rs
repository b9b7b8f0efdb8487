//! Tool acquisition: download, unpack and cache PHP CodeSniffer releases.
//!
//! # Cache layout
//!
//! ```text
//! <download_root>/PHPCodeSniffer/<version>   empty marker, proof of install
//! <download_root>/PHPCodeSniffer/...         installed tool tree
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use codesniff::acquire::{Acquirer, HttpFetcher};
//!
//! let fetcher = HttpFetcher::new(Duration::from_secs(300))?;
//! let acquirer = Acquirer::new(Arc::new(fetcher));
//! let tool_dir = acquirer.ensure_installed("2.4.0", Path::new("./.cache")).await?;
//! ```

pub mod copy;
pub mod fetcher;
pub mod installer;

pub use copy::copy_tree;
pub use fetcher::{download_url, ArchiveFetcher, HttpFetcher, DEFAULT_BASE_URL};
pub use installer::{Acquirer, ToolInstallation, ARCHIVE_PREFIX, TOOL_DIR_NAME};
