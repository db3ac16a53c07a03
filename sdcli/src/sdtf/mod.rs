//! Structured data transfer format (sdTF) containers
//!
//! A container holds named, type-hinted chunks of tree-structured data.
//! `format` handles the binary layout, `builder` writes containers,
//! `reader` resolves them into chunks, and `type_hints` maps chunk type
//! hints onto parameter types.

pub mod builder;
pub mod format;
pub mod reader;
pub mod type_hints;

use thiserror::Error;

pub use builder::{make_example_sdtf, DataItem, ExampleChunk, SdtfBuilder, TreeData};
pub use reader::{Branch, DataChunk, ParsedChunk, SdtfAsset};
pub use type_hints::parameter_type_for_hint;

/// sdTF codec errors
#[derive(Debug, Error)]
pub enum SdtfError {
    #[error("Container too short: {0} bytes")]
    TooShort(usize),

    #[error("Not a structured data container (bad magic)")]
    BadMagic,

    #[error("Unsupported container version {0}")]
    UnsupportedVersion(u32),

    #[error("Unsupported content format {0}")]
    UnsupportedContentFormat(u32),

    #[error("Container truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Container too large: {0} bytes")]
    TooLarge(usize),

    #[error("Invalid container content: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dangling {kind} reference {index}")]
    DanglingReference { kind: &'static str, index: usize },

    #[error("Tree has {branches} branches but {paths} paths")]
    MismatchedTree { branches: usize, paths: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: {0}")]
    Download(String),
}
