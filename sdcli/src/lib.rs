//! sdcli library interface
//!
//! Backend adapters, the publication and sdTF customization workflows, the
//! sdTF container codec and the command-line surface. Exposed as a library
//! so integration tests can drive the workflows against mock backends.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod models;
pub mod sdtf;
pub mod services;

pub use crate::context::CliContext;
pub use crate::error::{CliError, CliResult};
