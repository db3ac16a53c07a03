//! # sdcli Common Library
//!
//! Shared code for the sdcli binaries including:
//! - Error types
//! - Layered configuration loading (CLI → ENV → TOML → defaults)
//! - Logging bootstrap
//! - Day-stamp helpers for analytics windows
//! - Batching helper for bulk requests

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use batch::batches;
pub use error::{Error, Result};
