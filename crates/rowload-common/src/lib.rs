//! Rowload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging setup for the rowload workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`RowloadError`] and the [`Result`] alias used by
//!   configuration loading
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`], the
//!   single place where a `tracing` subscriber is installed
//!
//! # Example
//!
//! ```no_run
//! use rowload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, RowloadError};
